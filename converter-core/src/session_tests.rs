//! ConverterSession unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::{Instant, sleep, timeout};

    use converter_types::{
        ConfigError, ConversionFetchError, ConversionProvider, ConversionResult,
        CurrenciesFetchError, Currency, CurrencyDirectory, InputError, RequestKey,
    };

    use crate::view::{ConversionState, CurrencyListState};
    use crate::{ConverterSession, SessionOptions, SessionUpdate};

    const RATE: f64 = 0.8523;

    /// Shared state behind the in-memory provider, inspectable by tests.
    #[derive(Default)]
    pub struct MockState {
        currencies_fail: bool,
        currency_calls: AtomicUsize,
        conversions: Mutex<Vec<RequestKey>>,
        delays: Mutex<HashMap<String, Duration>>,
        failing: Mutex<HashSet<RequestKey>>,
        delisted: Mutex<HashSet<String>>,
    }

    impl MockState {
        fn conversions(&self) -> Vec<RequestKey> {
            self.conversions.lock().unwrap().clone()
        }

        fn delay_amount(&self, amount: &str, delay: Duration) {
            self.delays
                .lock()
                .unwrap()
                .insert(amount.to_string(), delay);
        }
    }

    /// Simple in-memory provider for testing the session.
    pub struct MockProvider(Arc<MockState>);

    #[async_trait]
    impl CurrencyDirectory for MockProvider {
        async fn fetch_currencies(&self) -> Result<Vec<Currency>, CurrenciesFetchError> {
            self.0.currency_calls.fetch_add(1, Ordering::SeqCst);
            if self.0.currencies_fail {
                return Err(CurrenciesFetchError);
            }
            let delisted = self.0.delisted.lock().unwrap();
            Ok([
                Currency::new("US Dollar", "USD", "$"),
                Currency::new("British Pound", "GBP", "£"),
                Currency::new("Euro", "EUR", "€"),
            ]
            .into_iter()
            .filter(|c| !delisted.contains(&c.code))
            .collect())
        }
    }

    #[async_trait]
    impl ConversionProvider for MockProvider {
        async fn convert(&self, key: &RequestKey) -> Result<ConversionResult, ConversionFetchError> {
            self.0.conversions.lock().unwrap().push(key.clone());

            let delay = self.0.delays.lock().unwrap().get(&key.amount).copied();
            if let Some(delay) = delay {
                sleep(delay).await;
            }

            if self.0.failing.lock().unwrap().contains(key) {
                return Err(ConversionFetchError);
            }
            let amount: f64 = key.amount.parse().map_err(|_| ConversionFetchError)?;
            Ok(ConversionResult {
                value: amount * RATE,
                rate: RATE,
            })
        }
    }

    fn start(state: MockState) -> (Arc<MockState>, ConverterSession<MockProvider>) {
        start_with(state, SessionOptions::default())
    }

    fn start_with(
        state: MockState,
        options: SessionOptions,
    ) -> (Arc<MockState>, ConverterSession<MockProvider>) {
        let state = Arc::new(state);
        let session = ConverterSession::new(Ok(MockProvider(state.clone())), options);
        (state, session)
    }

    async fn next(session: &mut ConverterSession<MockProvider>) -> SessionUpdate {
        timeout(Duration::from_secs(60), session.next_update())
            .await
            .expect("session stalled")
            .expect("session has no events")
    }

    /// Starts a session and waits for the initial GBP -> EUR conversion.
    async fn ready() -> (Arc<MockState>, ConverterSession<MockProvider>) {
        let (state, mut session) = start(MockState::default());
        assert_eq!(next(&mut session).await, SessionUpdate::CurrenciesLoaded(3));
        assert_eq!(
            next(&mut session).await,
            SessionUpdate::ConversionReady(RequestKey::new("GBP", "EUR", "1"))
        );
        (state, session)
    }

    fn rendered(session: &ConverterSession<MockProvider>) -> String {
        session.view().to_string()
    }

    fn conversion(session: &ConverterSession<MockProvider>) -> ConversionState {
        session.view().form().unwrap().conversion().clone()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_missing_config_is_terminal() {
        let mut session = ConverterSession::<MockProvider>::new(
            Err(ConfigError::MissingVariables(vec!["CURRENCY_BEACON_API_KEY"])),
            SessionOptions::default(),
        );

        assert!(session.view().is_missing_config());
        assert!(rendered(&session).contains("Missing required environment variables"));
        assert_eq!(session.edit_amount("5"), Err(InputError::Unconfigured));
        assert_eq!(session.select_from("USD"), Err(InputError::Unconfigured));
        assert_eq!(session.swap(), Err(InputError::Unconfigured));
        assert_eq!(session.reload_currencies(true), Err(InputError::Unconfigured));
        assert_eq!(session.next_update().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_form_suspends_until_currencies_load() {
        let (state, mut session) = start(MockState::default());

        assert!(rendered(&session).contains("Loading currencies..."));
        assert_eq!(conversion(&session), ConversionState::Idle);

        assert_eq!(next(&mut session).await, SessionUpdate::CurrenciesLoaded(3));
        assert_eq!(
            conversion(&session),
            ConversionState::Loading(RequestKey::new("GBP", "EUR", "1"))
        );
        assert!(rendered(&session).contains("Converting..."));
        assert!(rendered(&session).contains("British Pound (GBP)"));

        assert_eq!(
            next(&mut session).await,
            SessionUpdate::ConversionReady(RequestKey::new("GBP", "EUR", "1"))
        );
        assert!(rendered(&session).contains("1 GBP = 0.85 EUR"));
        assert_eq!(state.conversions(), vec![RequestKey::new("GBP", "EUR", "1")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_currency_failure_does_not_block_form() {
        let (state, mut session) = start(MockState {
            currencies_fail: true,
            ..Default::default()
        });

        assert_eq!(next(&mut session).await, SessionUpdate::CurrenciesFailed);
        // First attempt plus three retries.
        assert_eq!(state.currency_calls.load(Ordering::SeqCst), 4);

        let view = rendered(&session);
        assert!(view.contains("! Error fetching currencies: Failed to fetch currencies"));
        assert!(view.contains("Amount: 1"));
        assert!(session.view().form().unwrap().options().is_empty());

        assert_eq!(
            next(&mut session).await,
            SessionUpdate::ConversionReady(RequestKey::new("GBP", "EUR", "1"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_currency_list_is_served_from_cache() {
        let (state, mut session) = ready().await;

        session.reload_currencies(false).unwrap();
        assert_eq!(next(&mut session).await, SessionUpdate::CurrenciesLoaded(3));
        assert_eq!(state.currency_calls.load(Ordering::SeqCst), 1);

        session.reload_currencies(true).unwrap();
        assert_eq!(next(&mut session).await, SessionUpdate::CurrenciesLoaded(3));
        assert_eq!(state.currency_calls.load(Ordering::SeqCst), 2);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Amount edits
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_amount_burst_triggers_one_conversion() {
        let (state, mut session) = ready().await;

        for text in ["1", "10", "100", "1000", "10000"] {
            session.edit_amount(text).unwrap();
            sleep(Duration::from_millis(100)).await;
        }
        let last_edit = Instant::now() - Duration::from_millis(100);

        let form = session.view().form().unwrap();
        assert_eq!(form.amount_input(), "10000");
        assert_eq!(form.amount(), "1");

        assert_eq!(
            next(&mut session).await,
            SessionUpdate::AmountCommitted("10000".into())
        );
        assert!(last_edit.elapsed() >= Duration::from_millis(500));

        let key = RequestKey::new("GBP", "EUR", "10000");
        assert_eq!(next(&mut session).await, SessionUpdate::ConversionReady(key.clone()));
        assert_eq!(
            state.conversions(),
            vec![RequestKey::new("GBP", "EUR", "1"), key]
        );
        assert!(rendered(&session).contains("10000 GBP = 8523.00 EUR"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_amount_is_rejected() {
        let (state, mut session) = ready().await;

        assert_eq!(
            session.edit_amount("12a"),
            Err(InputError::InvalidAmount("12a".into()))
        );
        assert_eq!(
            session.edit_amount("1.2.3"),
            Err(InputError::InvalidAmount("1.2.3".into()))
        );
        assert_eq!(session.view().form().unwrap().amount_input(), "1");

        session.edit_amount(".5").unwrap();
        session.commit_amount();
        assert_eq!(next(&mut session).await, SessionUpdate::AmountCommitted(".5".into()));
        assert_eq!(
            next(&mut session).await,
            SessionUpdate::ConversionReady(RequestKey::new("GBP", "EUR", ".5"))
        );
        assert_eq!(state.conversions().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_amount_returns_to_idle() {
        let (state, mut session) = ready().await;

        session.edit_amount("").unwrap();
        session.commit_amount();
        assert_eq!(next(&mut session).await, SessionUpdate::AmountCommitted(String::new()));

        assert_eq!(conversion(&session), ConversionState::Idle);
        assert!(!rendered(&session).contains(" = "));
        assert_eq!(state.conversions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_session_never_commits_pending_amount() {
        let (state, mut session) = ready().await;

        session.edit_amount("9").unwrap();
        drop(session);
        sleep(Duration::from_secs(2)).await;

        assert!(state.conversions().iter().all(|key| key.amount != "9"));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Selection
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_selection_is_not_debounced() {
        let (_, mut session) = ready().await;

        let selected_at = Instant::now();
        session.select_to("usd").unwrap();
        assert_eq!(
            next(&mut session).await,
            SessionUpdate::ConversionReady(RequestKey::new("GBP", "USD", "1"))
        );
        assert!(selected_at.elapsed() < Duration::from_millis(500));
        assert!(rendered(&session).contains("To: US Dollar (USD)"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_currency_is_rejected() {
        let (state, mut session) = ready().await;

        assert_eq!(
            session.select_from("XYZ"),
            Err(InputError::UnknownCurrency("XYZ".into()))
        );
        assert_eq!(session.view().form().unwrap().from(), "GBP");
        assert_eq!(state.conversions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlisted_initial_codes_fall_back() {
        let (state, mut session) = start_with(
            MockState::default(),
            SessionOptions {
                initial_from: "XYZ".into(),
                initial_to: "ABC".into(),
                ..SessionOptions::default()
            },
        );

        assert_eq!(next(&mut session).await, SessionUpdate::CurrenciesLoaded(3));
        let form = session.view().form().unwrap();
        assert_eq!((form.from(), form.to()), ("GBP", "EUR"));

        let key = RequestKey::new("GBP", "EUR", "1");
        assert_eq!(next(&mut session).await, SessionUpdate::ConversionReady(key.clone()));
        assert_eq!(state.conversions(), vec![key]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_without_selected_code_falls_back() {
        let (state, mut session) = ready().await;
        session.select_to("USD").unwrap();
        assert_eq!(
            next(&mut session).await,
            SessionUpdate::ConversionReady(RequestKey::new("GBP", "USD", "1"))
        );

        state.delisted.lock().unwrap().insert("USD".into());
        session.reload_currencies(true).unwrap();
        assert_eq!(next(&mut session).await, SessionUpdate::CurrenciesLoaded(2));
        assert_eq!(session.view().form().unwrap().to(), "EUR");

        let key = RequestKey::new("GBP", "EUR", "1");
        assert_eq!(next(&mut session).await, SessionUpdate::ConversionReady(key.clone()));
        assert_eq!(state.conversions().last(), Some(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_key_is_not_requested_again() {
        let (state, mut session) = ready().await;

        session.select_from("GBP").unwrap();
        session.select_to("eur").unwrap();
        session.edit_amount("1").unwrap();
        session.commit_amount();
        assert_eq!(next(&mut session).await, SessionUpdate::AmountCommitted("1".into()));

        sleep(Duration::from_secs(1)).await;
        assert_eq!(state.conversions(), vec![RequestKey::new("GBP", "EUR", "1")]);
        assert!(matches!(conversion(&session), ConversionState::Ready { .. }));

        let failing = RequestKey::new("GBP", "USD", "1");
        state.failing.lock().unwrap().insert(failing.clone());
        session.select_to("USD").unwrap();
        assert_eq!(next(&mut session).await, SessionUpdate::ConversionFailed(failing.clone()));

        session.select_to("USD").unwrap();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(state.conversions().len(), 2);
        assert!(matches!(
            conversion(&session),
            ConversionState::Failed { ref key, .. } if *key == failing
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_requests_swapped_key() {
        let (state, mut session) = ready().await;

        session.swap().unwrap();
        let swapped = RequestKey::new("EUR", "GBP", "1");
        assert_eq!(conversion(&session), ConversionState::Loading(swapped.clone()));

        assert_eq!(next(&mut session).await, SessionUpdate::ConversionReady(swapped.clone()));
        assert_eq!(state.conversions().last(), Some(&swapped));
        assert!(rendered(&session).contains("1 EUR = 0.85 GBP"));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Results
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_stale_result_never_overwrites_current() {
        let (state, mut session) = ready().await;
        state.delay_amount("5", Duration::from_millis(300));

        session.edit_amount("5").unwrap();
        session.commit_amount();
        assert_eq!(next(&mut session).await, SessionUpdate::AmountCommitted("5".into()));

        session.edit_amount("7").unwrap();
        session.commit_amount();
        assert_eq!(next(&mut session).await, SessionUpdate::AmountCommitted("7".into()));

        let current = RequestKey::new("GBP", "EUR", "7");
        let stale = RequestKey::new("GBP", "EUR", "5");
        assert_eq!(next(&mut session).await, SessionUpdate::ConversionReady(current.clone()));
        assert_eq!(next(&mut session).await, SessionUpdate::StaleResultDropped(stale));

        assert!(matches!(
            conversion(&session),
            ConversionState::Ready { ref key, .. } if *key == current
        ));
        assert!(rendered(&session).contains("7 GBP = 5.97 EUR"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_conversion_failure_is_final_and_shown() {
        let (state, mut session) = ready().await;
        let failing = RequestKey::new("GBP", "USD", "1");
        state.failing.lock().unwrap().insert(failing.clone());

        session.select_to("USD").unwrap();
        assert_eq!(next(&mut session).await, SessionUpdate::ConversionFailed(failing.clone()));

        let view = rendered(&session);
        assert!(view.contains("! Error converting currency: Failed to convert currency"));
        assert!(!view.contains(" = "));
        assert_eq!(
            state
                .conversions()
                .iter()
                .filter(|key| **key == failing)
                .count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_results_are_evicted() {
        let (_, mut session) = ready().await;
        assert_eq!(session.cached_conversions(), 1);

        session.select_to("USD").unwrap();
        next(&mut session).await;

        assert_eq!(session.cached_conversions(), 1);
        assert!(matches!(
            session.view().form().unwrap().currencies(),
            CurrencyListState::Loaded(_)
        ));
    }
}
