//! Conversion view: form state and its text rendering.
//!
//! The view holds no IO. The session mutates it and decides when fetches
//! happen; the view only records what is on screen.

use std::fmt;

use converter_types::{
    ConfigError, ConversionFetchError, ConversionResult, CurrenciesFetchError, Currency,
    RequestKey, sorted_by_name,
};

pub const TITLE: &str = "Currency Converter";
pub const DESCRIPTION: &str = "Select a currency to convert from and to, and enter an amount to see real-time conversion.";

/// Top-level state of the converter screen.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    /// Provider configuration is absent. Terminal for the session.
    MissingConfig(ConfigError),
    Ready(ConverterForm),
}

/// Loading state of the currency option lists.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrencyListState {
    Loading,
    Loaded(Vec<Currency>),
    Failed(CurrenciesFetchError),
}

impl CurrencyListState {
    pub fn is_loading(&self) -> bool {
        matches!(self, CurrencyListState::Loading)
    }
}

/// Conversion state for the current request key.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionState {
    Idle,
    Loading(RequestKey),
    Ready {
        key: RequestKey,
        result: ConversionResult,
    },
    Failed {
        key: RequestKey,
        error: ConversionFetchError,
    },
}

impl ConversionState {
    /// Key of the request this state belongs to. `None` while idle.
    pub fn key(&self) -> Option<&RequestKey> {
        match self {
            ConversionState::Idle => None,
            ConversionState::Loading(key)
            | ConversionState::Ready { key, .. }
            | ConversionState::Failed { key, .. } => Some(key),
        }
    }
}

/// Transient form state.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterForm {
    amount_input: String,
    amount: String,
    from: String,
    to: String,
    currencies: CurrencyListState,
    conversion: ConversionState,
}

impl ConverterForm {
    fn new(amount: &str, from: &str, to: &str) -> Self {
        Self {
            amount_input: amount.to_string(),
            amount: amount.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            currencies: CurrencyListState::Loading,
            conversion: ConversionState::Idle,
        }
    }

    /// Text currently in the amount field, before debouncing.
    pub fn amount_input(&self) -> &str {
        &self.amount_input
    }

    /// Committed amount that feeds the request key.
    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn currencies(&self) -> &CurrencyListState {
        &self.currencies
    }

    pub fn conversion(&self) -> &ConversionState {
        &self.conversion
    }

    pub fn request_key(&self) -> RequestKey {
        RequestKey::new(&self.from, &self.to, &self.amount)
    }

    /// Option list for both selects, sorted by name. Empty unless loaded.
    pub fn options(&self) -> Vec<Currency> {
        match &self.currencies {
            CurrencyListState::Loaded(list) => sorted_by_name(list),
            _ => Vec::new(),
        }
    }

    pub fn currency(&self, code: &str) -> Option<&Currency> {
        match &self.currencies {
            CurrencyListState::Loaded(list) => list.iter().find(|c| c.code == code),
            _ => None,
        }
    }

    /// Whether `code` may be selected. Anything goes until a list is loaded.
    pub fn accepts_code(&self, code: &str) -> bool {
        match &self.currencies {
            CurrencyListState::Loaded(list) => list.iter().any(|c| c.code == code),
            _ => true,
        }
    }

    pub(crate) fn set_amount_input(&mut self, text: &str) {
        self.amount_input = text.to_string();
    }

    pub(crate) fn commit_amount(&mut self, amount: String) {
        self.amount = amount;
    }

    pub(crate) fn set_from(&mut self, code: String) {
        self.from = code;
    }

    pub(crate) fn set_to(&mut self, code: String) {
        self.to = code;
    }

    pub(crate) fn swap(&mut self) {
        std::mem::swap(&mut self.from, &mut self.to);
    }

    pub(crate) fn set_currencies(&mut self, state: CurrencyListState) {
        self.currencies = state;
    }

    /// Moves `from` and `to` back onto the loaded list.
    ///
    /// A code missing from the list is replaced by its fallback when that is
    /// listed, else by the first option by name, else cleared. Returns whether
    /// anything changed.
    pub(crate) fn reconcile_selection(&mut self, fallback_from: &str, fallback_to: &str) -> bool {
        let CurrencyListState::Loaded(list) = &self.currencies else {
            return false;
        };
        let pick = |current: &str, fallback: &str| -> Option<String> {
            let listed = |code: &str| list.iter().any(|c| c.code == code);
            if listed(current) {
                return None;
            }
            if listed(fallback) {
                return Some(fallback.to_string());
            }
            Some(
                sorted_by_name(list)
                    .first()
                    .map(|c| c.code.clone())
                    .unwrap_or_default(),
            )
        };

        let from = pick(&self.from, fallback_from);
        let to = pick(&self.to, fallback_to);
        let changed = from.is_some() || to.is_some();
        if let Some(code) = from {
            self.from = code;
        }
        if let Some(code) = to {
            self.to = code;
        }
        changed
    }

    pub(crate) fn begin_conversion(&mut self, key: RequestKey) {
        self.conversion = ConversionState::Loading(key);
    }

    pub(crate) fn reset_conversion(&mut self) {
        self.conversion = ConversionState::Idle;
    }

    /// Applies a settled conversion if `key` is still the current key.
    ///
    /// Returns `false` for superseded keys, leaving the state untouched.
    pub(crate) fn settle_conversion(
        &mut self,
        key: RequestKey,
        result: Result<ConversionResult, ConversionFetchError>,
    ) -> bool {
        if key != self.request_key() {
            return false;
        }
        self.conversion = match result {
            Ok(result) => ConversionState::Ready { key, result },
            Err(error) => ConversionState::Failed { key, error },
        };
        true
    }

    fn selection_label(&self, code: &str) -> String {
        match self.currency(code) {
            Some(currency) => currency.to_string(),
            None => code.to_string(),
        }
    }
}

/// The converter screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterView {
    state: ViewState,
}

impl ConverterView {
    pub fn new(amount: &str, from: &str, to: &str) -> Self {
        Self {
            state: ViewState::Ready(ConverterForm::new(amount, from, to)),
        }
    }

    pub fn missing_config(error: ConfigError) -> Self {
        Self {
            state: ViewState::MissingConfig(error),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn is_missing_config(&self) -> bool {
        matches!(self.state, ViewState::MissingConfig(_))
    }

    pub fn form(&self) -> Option<&ConverterForm> {
        match &self.state {
            ViewState::Ready(form) => Some(form),
            ViewState::MissingConfig(_) => None,
        }
    }

    pub(crate) fn form_mut(&mut self) -> Option<&mut ConverterForm> {
        match &mut self.state {
            ViewState::Ready(form) => Some(form),
            ViewState::MissingConfig(_) => None,
        }
    }
}

impl fmt::Display for ConverterView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            ViewState::MissingConfig(error) => render_missing_config(f, error),
            ViewState::Ready(form) if form.currencies.is_loading() => render_skeleton(f),
            ViewState::Ready(form) => render_form(f, form),
        }
    }
}

fn render_missing_config(f: &mut fmt::Formatter<'_>, error: &ConfigError) -> fmt::Result {
    writeln!(f, "! Missing required environment variables")?;
    writeln!(
        f,
        "  Please check your .env file and ensure these are set: {}",
        error.missing().join(", ")
    )
}

// Stands in for the form while the currency list is loading.
fn render_skeleton(f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "{TITLE}")?;
    writeln!(f, "░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░")?;
    writeln!(f)?;
    writeln!(f, "Amount: ░░░░░░░░")?;
    writeln!(f, "From:   ░░░░░░░░░░░░  ⇄  To: ░░░░░░░░░░░░")?;
    writeln!(f, "Loading currencies...")
}

fn render_form(f: &mut fmt::Formatter<'_>, form: &ConverterForm) -> fmt::Result {
    writeln!(f, "{TITLE}")?;
    writeln!(f, "{DESCRIPTION}")?;
    writeln!(f)?;

    if let CurrencyListState::Failed(error) = &form.currencies {
        writeln!(f, "! Error fetching currencies: {error}")?;
        writeln!(f)?;
    }

    writeln!(f, "Amount: {}", form.amount_input)?;
    writeln!(
        f,
        "From:   {}  ⇄  To: {}",
        form.selection_label(&form.from),
        form.selection_label(&form.to)
    )?;

    match &form.conversion {
        ConversionState::Idle => Ok(()),
        ConversionState::Loading(_) => writeln!(f, "Converting..."),
        ConversionState::Failed { error, .. } => {
            writeln!(f, "! Error converting currency: {error}")
        }
        ConversionState::Ready { key, result } => writeln!(
            f,
            "{} {} = {:.2} {}",
            key.amount, key.from, result.value, key.to
        ),
    }
}
