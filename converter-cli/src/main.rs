//! Currency Converter CLI
//!
//! Command-line front end for the CurrencyBeacon API: one-shot commands
//! plus an interactive converter form.

use std::io::Write;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use converter_client::{ApiConfig, CurrencyBeaconClient};
use converter_core::{ConverterSession, SessionOptions, ViewState, is_valid_amount};
use converter_types::{
    ConfigError, ConversionProvider, Currency, CurrencyDirectory, InputError, RequestKey,
};

type Session = ConverterSession<CurrencyBeaconClient>;

#[derive(Parser)]
#[command(name = "converter")]
#[command(author, version, about = "Currency converter over the CurrencyBeacon API", long_about = None)]
struct Cli {
    /// Base URL of the CurrencyBeacon API
    #[arg(long, env = "CURRENCY_BEACON_API_URL")]
    api_url: Option<String>,

    /// API key for CurrencyBeacon
    #[arg(long, env = "CURRENCY_BEACON_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Print JSON instead of text (one-shot commands)
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported currencies, sorted by name
    Currencies,
    /// Convert an amount once
    Convert {
        /// Amount to convert
        amount: String,
        #[arg(long, default_value = "GBP")]
        from: String,
        #[arg(long, default_value = "EUR")]
        to: String,
    },
    /// Interactive converter form (default)
    Interactive {
        #[arg(long, default_value = "1")]
        amount: String,
        #[arg(long, default_value = "GBP")]
        from: String,
        #[arg(long, default_value = "EUR")]
        to: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn,converter_core=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = ApiConfig::new(cli.api_key, cli.api_url);
    let command = cli.command.unwrap_or(Commands::Interactive {
        amount: "1".to_string(),
        from: "GBP".to_string(),
        to: "EUR".to_string(),
    });

    match command {
        Commands::Currencies => {
            let client = CurrencyBeaconClient::new(config?);
            let mut currencies = client.fetch_currencies().await?;
            currencies.sort_by(Currency::cmp_by_name);

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&currencies)?);
            } else {
                print_currencies(&currencies);
            }
        }

        Commands::Convert { amount, from, to } => {
            if !is_valid_amount(&amount) {
                anyhow::bail!(InputError::InvalidAmount(amount));
            }
            let client = CurrencyBeaconClient::new(config?);
            let key = RequestKey::new(from.trim().to_uppercase(), to.trim().to_uppercase(), amount);
            let result = client.convert(&key).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{} {} = {:.2} {}", key.amount, key.from, result.value, key.to);
                println!("rate: {}", result.rate);
            }
        }

        Commands::Interactive { amount, from, to } => {
            let options = SessionOptions {
                initial_amount: amount,
                initial_from: from.trim().to_uppercase(),
                initial_to: to.trim().to_uppercase(),
                ..SessionOptions::default()
            };
            run_interactive(config, options).await?;
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Interactive form
// ─────────────────────────────────────────────────────────────────────────────

enum Flow {
    Continue,
    Quit,
}

async fn run_interactive(
    config: Result<ApiConfig, ConfigError>,
    options: SessionOptions,
) -> Result<()> {
    let mut session: Session = ConverterSession::new(config.map(CurrencyBeaconClient::new), options);
    render(&session)?;

    if let ViewState::MissingConfig(err) = session.view().state() {
        anyhow::bail!(err.clone());
    }
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if let Flow::Quit = handle_line(&mut session, line.trim()) {
                    break;
                }
            }
            update = session.next_update() => {
                let Some(update) = update else {
                    break;
                };
                tracing::debug!(?update, "view updated");
                render(&session)?;
            }
        }
    }

    Ok(())
}

fn handle_line(session: &mut Session, line: &str) -> Flow {
    let mut parts = line.split_whitespace();
    let outcome = match (parts.next(), parts.next()) {
        (None, _) => Ok(()),
        (Some("quit" | "exit" | "q"), _) => return Flow::Quit,
        (Some("help" | "?"), _) => {
            print_help();
            Ok(())
        }
        (Some("list"), _) => {
            if let Some(form) = session.view().form() {
                print_currencies(&form.options());
            }
            Ok(())
        }
        (Some("reload"), _) => session.reload_currencies(true),
        (Some("swap"), _) => session.swap(),
        (Some("commit"), _) => {
            session.commit_amount();
            Ok(())
        }
        (Some("clear"), _) => session.edit_amount("").map(|()| session.commit_amount()),
        (Some("from"), Some(code)) => session.select_from(code),
        (Some("to"), Some(code)) => session.select_to(code),
        (Some(_), _) => session.edit_amount(line),
    };

    if let Err(err) = outcome {
        println!("! {err}");
    }
    Flow::Continue
}

fn render(session: &Session) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout)?;
    write!(stdout, "{}", session.view())?;
    stdout.flush()
}

fn print_currencies(currencies: &[Currency]) {
    for currency in currencies {
        println!("{:<5} {:<4} {}", currency.code, currency.symbol, currency.name);
    }
}

fn print_help() {
    println!();
    println!("Type an amount to convert it, or one of:");
    println!("  from <CODE>   select the source currency");
    println!("  to <CODE>     select the target currency");
    println!("  swap          exchange source and target");
    println!("  commit        convert the typed amount now");
    println!("  clear         empty the amount field");
    println!("  list          show available currencies");
    println!("  reload        fetch the currency list again");
    println!("  quit          leave");
}
