//! Converter Session
//!
//! Drives the conversion view: owns the form state, the query caches and
//! the amount debouncer, spawns fetches and applies their results.
//! Contains NO transport logic - the provider is injected.

use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use converter_types::{
    ConfigError, ConversionFetchError, ConversionProvider, ConversionResult, CurrenciesFetchError,
    Currency, CurrencyDirectory, InputError, RequestKey,
};

use crate::debounce::{DEFAULT_DEBOUNCE, Debouncer};
use crate::query_cache::{QueryCache, QueryOptions};
use crate::view::{ConverterView, CurrencyListState};

/// The currency universe changes rarely.
pub const CURRENCIES_STALE_TIME: Duration = Duration::from_secs(24 * 60 * 60);

static AMOUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]*\.?[0-9]*$").expect("amount pattern is valid"));

/// Whether `text` may be typed into the amount field. Empty is allowed.
pub fn is_valid_amount(text: &str) -> bool {
    AMOUNT_PATTERN.is_match(text)
}

/// Selections used when a requested code is not in the loaded list.
pub const DEFAULT_FROM: &str = "GBP";
pub const DEFAULT_TO: &str = "EUR";

/// Cache key of the (single) currency list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurrenciesKey;

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub debounce: Duration,
    pub currencies: QueryOptions,
    pub conversions: QueryOptions,
    pub initial_amount: String,
    pub initial_from: String,
    pub initial_to: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            currencies: QueryOptions::new(CURRENCIES_STALE_TIME, 3),
            // Conversions are interactive: a failed attempt is final.
            conversions: QueryOptions::new(Duration::ZERO, 0),
            initial_amount: "1".to_string(),
            initial_from: DEFAULT_FROM.to_string(),
            initial_to: DEFAULT_TO.to_string(),
        }
    }
}

#[derive(Debug)]
enum SessionEvent {
    AmountCommitted(String),
    CurrenciesSettled(Result<Vec<Currency>, CurrenciesFetchError>),
    ConversionSettled {
        key: RequestKey,
        result: Result<ConversionResult, ConversionFetchError>,
    },
}

/// What a call to [`ConverterSession::next_update`] changed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    AmountCommitted(String),
    CurrenciesLoaded(usize),
    CurrenciesFailed,
    ConversionReady(RequestKey),
    ConversionFailed(RequestKey),
    /// A result arrived for a key the user has since moved away from.
    StaleResultDropped(RequestKey),
}

/// One user's converter screen.
///
/// Generic over `P` - the provider is injected at compile time so tests can
/// run against an in-memory implementation. Must be created and driven
/// inside a tokio runtime.
pub struct ConverterSession<P> {
    provider: Option<Arc<P>>,
    view: ConverterView,
    options: SessionOptions,
    currency_cache: Arc<QueryCache<CurrenciesKey, Vec<Currency>, CurrenciesFetchError>>,
    conversion_cache: Arc<QueryCache<RequestKey, ConversionResult, ConversionFetchError>>,
    amount_debouncer: Debouncer<String>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<P> ConverterSession<P>
where
    P: CurrencyDirectory + ConversionProvider,
{
    /// Starts a session. A configuration error puts the view into its
    /// terminal missing-config state and no request is ever issued.
    pub fn new(provider: Result<P, ConfigError>, options: SessionOptions) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let amount_debouncer = {
            let tx = events_tx.clone();
            Debouncer::new(options.debounce, move |amount| {
                let _ = tx.send(SessionEvent::AmountCommitted(amount));
            })
        };

        let (provider, view) = match provider {
            Ok(provider) => (
                Some(Arc::new(provider)),
                ConverterView::new(
                    &options.initial_amount,
                    &options.initial_from,
                    &options.initial_to,
                ),
            ),
            Err(err) => {
                warn!(error = %err, "converter is not configured");
                (None, ConverterView::missing_config(err))
            }
        };

        let session = Self {
            provider,
            view,
            options,
            currency_cache: Arc::new(QueryCache::new()),
            conversion_cache: Arc::new(QueryCache::new()),
            amount_debouncer,
            events_tx,
            events_rx,
        };

        if session.provider.is_some() {
            info!("converter session started");
            session.spawn_currency_fetch();
        }
        session
    }

    pub fn view(&self) -> &ConverterView {
        &self.view
    }

    /// Number of conversion results currently cached.
    pub fn cached_conversions(&self) -> usize {
        self.conversion_cache.len()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // User input
    // ─────────────────────────────────────────────────────────────────────────────

    /// Types into the amount field. The value is committed after the
    /// debounce window; invalid text is rejected and changes nothing.
    pub fn edit_amount(&mut self, text: &str) -> Result<(), InputError> {
        let form = self.view.form_mut().ok_or(InputError::Unconfigured)?;
        if !is_valid_amount(text) {
            return Err(InputError::InvalidAmount(text.to_string()));
        }

        form.set_amount_input(text);
        self.amount_debouncer.call(text.to_string());
        Ok(())
    }

    /// Commits a pending amount edit without waiting for the window.
    pub fn commit_amount(&mut self) {
        self.amount_debouncer.flush();
    }

    /// Selects the source currency. Applied immediately.
    pub fn select_from(&mut self, code: &str) -> Result<(), InputError> {
        let code = self.checked_code(code)?;
        if let Some(form) = self.view.form_mut() {
            form.set_from(code);
        }
        self.request_conversion();
        Ok(())
    }

    /// Selects the target currency. Applied immediately.
    pub fn select_to(&mut self, code: &str) -> Result<(), InputError> {
        let code = self.checked_code(code)?;
        if let Some(form) = self.view.form_mut() {
            form.set_to(code);
        }
        self.request_conversion();
        Ok(())
    }

    /// Exchanges source and target currencies in one step.
    pub fn swap(&mut self) -> Result<(), InputError> {
        let form = self.view.form_mut().ok_or(InputError::Unconfigured)?;
        form.swap();
        self.request_conversion();
        Ok(())
    }

    /// Fetches the currency list again. Served from cache while fresh
    /// unless `force` is set.
    pub fn reload_currencies(&mut self, force: bool) -> Result<(), InputError> {
        if self.provider.is_none() {
            return Err(InputError::Unconfigured);
        }
        if force {
            self.currency_cache.invalidate(&CurrenciesKey);
        }
        self.spawn_currency_fetch();
        Ok(())
    }

    fn checked_code(&self, code: &str) -> Result<String, InputError> {
        let form = self.view.form().ok_or(InputError::Unconfigured)?;
        let code = code.trim().to_uppercase();
        if !form.accepts_code(&code) {
            return Err(InputError::UnknownCurrency(code));
        }
        Ok(code)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Event loop
    // ─────────────────────────────────────────────────────────────────────────────

    /// Waits for the next event and applies it to the view.
    ///
    /// Returns `None` for an unconfigured session, which never has events.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        self.provider.as_ref()?;
        let event = self.events_rx.recv().await?;
        Some(self.apply(event))
    }

    fn apply(&mut self, event: SessionEvent) -> SessionUpdate {
        match event {
            SessionEvent::AmountCommitted(amount) => {
                if let Some(form) = self.view.form_mut() {
                    form.commit_amount(amount.clone());
                }
                self.request_conversion();
                SessionUpdate::AmountCommitted(amount)
            }

            SessionEvent::CurrenciesSettled(result) => {
                let Some(form) = self.view.form_mut() else {
                    return SessionUpdate::CurrenciesFailed;
                };
                let update = match result {
                    Ok(list) => {
                        info!(count = list.len(), "currency list loaded");
                        let count = list.len();
                        let requested = (form.from().to_string(), form.to().to_string());
                        form.set_currencies(CurrencyListState::Loaded(list));
                        if form.reconcile_selection(DEFAULT_FROM, DEFAULT_TO) {
                            warn!(
                                from = %requested.0,
                                to = %requested.1,
                                selected_from = %form.from(),
                                selected_to = %form.to(),
                                "selected currency not offered, falling back"
                            );
                        }
                        SessionUpdate::CurrenciesLoaded(count)
                    }
                    Err(err) => {
                        // A failed reload keeps the list already on screen.
                        if !matches!(form.currencies(), CurrencyListState::Loaded(_)) {
                            form.set_currencies(CurrencyListState::Failed(err));
                        }
                        SessionUpdate::CurrenciesFailed
                    }
                };
                self.request_conversion();
                update
            }

            SessionEvent::ConversionSettled { key, result } => {
                let ok = result.is_ok();
                let applied = self
                    .view
                    .form_mut()
                    .is_some_and(|form| form.settle_conversion(key.clone(), result));

                if !applied {
                    debug!(key = %key, "dropping superseded conversion result");
                    SessionUpdate::StaleResultDropped(key)
                } else if ok {
                    SessionUpdate::ConversionReady(key)
                } else {
                    SessionUpdate::ConversionFailed(key)
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Fetching
    // ─────────────────────────────────────────────────────────────────────────────

    fn spawn_currency_fetch(&self) {
        let Some(provider) = self.provider.clone() else {
            return;
        };
        let cache = self.currency_cache.clone();
        let tx = self.events_tx.clone();
        let options = self.options.currencies;

        tokio::spawn(async move {
            let result = cache
                .fetch(CurrenciesKey, options, || {
                    let provider = provider.clone();
                    async move { provider.fetch_currencies().await }
                })
                .await;
            let _ = tx.send(SessionEvent::CurrenciesSettled(result));
        });
    }

    /// Issues a conversion for the current key, if the form allows one.
    ///
    /// Nothing is requested while the currency list is still loading; the
    /// list settling triggers the first request. A key that already has a
    /// request (pending, done or failed) is not requested again.
    fn request_conversion(&mut self) {
        let Some(provider) = self.provider.clone() else {
            return;
        };
        let Some(form) = self.view.form_mut() else {
            return;
        };
        if form.currencies().is_loading() {
            return;
        }

        let key = form.request_key();
        if form.conversion().key() == Some(&key) {
            return;
        }
        self.conversion_cache.retain_settled(|cached| *cached == key);

        if !key.is_complete() {
            form.reset_conversion();
            return;
        }
        form.begin_conversion(key.clone());
        debug!(key = %key, "requesting conversion");

        let cache = self.conversion_cache.clone();
        let tx = self.events_tx.clone();
        let options = self.options.conversions;

        tokio::spawn(async move {
            let result = cache
                .fetch(key.clone(), options, || {
                    let provider = provider.clone();
                    let key = key.clone();
                    async move { provider.convert(&key).await }
                })
                .await;
            let _ = tx.send(SessionEvent::ConversionSettled { key, result });
        });
    }
}

impl<P> Drop for ConverterSession<P> {
    fn drop(&mut self) {
        self.currency_cache.clear();
        self.conversion_cache.clear();
    }
}
