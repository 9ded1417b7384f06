//! The daily step check.
//!
//! One invocation runs a strictly linear pipeline:
//!
//! ```text
//! Start -> FetchingSteps -> BelowThreshold -> Generating -> Notifying -> Done
//!                        \-> AtOrAboveThreshold -> Done
//! ```
//!
//! Any stage may fail into `ErrorTerminal`. Nothing is retried and nothing
//! already done is rolled back: a roast generated before a failed publish is
//! simply lost.

use serde_json::Value;
use steproast_adapters::{DayWindow, Notification, Notifier, StepSource};
use steproast_agent::RoastGenerator;
use steproast_auth::CredentialRefresher;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::error::StepCheckError;
use crate::response::{CheckOutcome, InvocationResponse};

/// Step totals strictly below this value earn a roast.
pub const DEFAULT_STEP_THRESHOLD: u64 = 100;

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Where a step check currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Start,
    FetchingSteps,
    BelowThreshold,
    AtOrAboveThreshold,
    Generating,
    Notifying,
    Done,
    ErrorTerminal,
}

impl CheckState {
    /// Whether the pipeline has stopped.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::ErrorTerminal)
    }
}

/// Records the path one invocation takes through [`CheckState`].
#[derive(Debug)]
struct Progress {
    state: CheckState,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: CheckState::Start,
        }
    }

    fn advance(&mut self, next: CheckState) {
        debug!(from = ?self.state, to = ?next, "step check transition");
        self.state = next;
    }
}

// ---------------------------------------------------------------------------
// StepCheck
// ---------------------------------------------------------------------------

/// The orchestrator. Holds one handle per external service; all of them are
/// injected so tests can substitute fakes.
pub struct StepCheck {
    refresher: Box<dyn CredentialRefresher>,
    steps: Box<dyn StepSource>,
    generator: Box<dyn RoastGenerator>,
    notifier: Box<dyn Notifier>,
    threshold: u64,
}

impl StepCheck {
    pub fn new(
        refresher: Box<dyn CredentialRefresher>,
        steps: Box<dyn StepSource>,
        generator: Box<dyn RoastGenerator>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            refresher,
            steps,
            generator,
            notifier,
            threshold: DEFAULT_STEP_THRESHOLD,
        }
    }

    /// Override the roast threshold.
    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Handle one invocation. The event payload is accepted for interface
    /// compatibility and otherwise ignored.
    ///
    /// Never fails: every error becomes a 500 response.
    pub async fn run(&self, event: Value) -> InvocationResponse {
        let invocation_id = Uuid::now_v7();
        let span = info_span!("step_check", %invocation_id);

        async move {
            debug!(event = %event, "invocation received");
            info!(threshold = self.threshold, "starting daily step check");

            let result = self.execute().await;
            if let Err(ref e) = result {
                error!(stage = e.stage(), error = %e, "step check failed");
            }
            InvocationResponse::from(result)
        }
        .instrument(span)
        .await
    }

    /// Run the pipeline once for today's window and report what happened.
    pub async fn execute(&self) -> Result<CheckOutcome, StepCheckError> {
        let mut progress = Progress::new();
        let result = self.drive(&mut progress).await;
        if result.is_err() {
            progress.advance(CheckState::ErrorTerminal);
        }
        result
    }

    async fn drive(&self, progress: &mut Progress) -> Result<CheckOutcome, StepCheckError> {
        let token = self
            .refresher
            .refresh()
            .await
            .map_err(StepCheckError::Authentication)?;

        progress.advance(CheckState::FetchingSteps);
        let window = DayWindow::today();
        let steps = self
            .steps
            .daily_steps(&token, &window)
            .await
            .map_err(StepCheckError::DataFetch)?;
        info!(steps, "today's step count");

        if steps >= self.threshold {
            progress.advance(CheckState::AtOrAboveThreshold);
            info!(steps, threshold = self.threshold, "no roasting needed today");
            progress.advance(CheckState::Done);
            return Ok(CheckOutcome::NoRoastNeeded { steps });
        }

        progress.advance(CheckState::BelowThreshold);
        info!(steps, threshold = self.threshold, "below threshold, generating roast");

        progress.advance(CheckState::Generating);
        let roast = self
            .generator
            .generate()
            .await
            .map_err(StepCheckError::Generation)?;
        info!(roast = %roast, "roast generated");

        progress.advance(CheckState::Notifying);
        self.notifier
            .publish(&Notification::roast(steps, &roast))
            .await
            .map_err(StepCheckError::Publish)?;

        progress.advance(CheckState::Done);
        info!(steps, "roast sent");
        Ok(CheckOutcome::Roasted { steps, roast })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{FAILURE_MESSAGE, ResponseBody};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use steproast_adapters::AdapterError;
    use steproast_agent::AgentError;
    use steproast_auth::{AccessToken, AuthEngineError};

    #[derive(Default)]
    struct Calls {
        refresh: AtomicUsize,
        fetch: AtomicUsize,
        generate: AtomicUsize,
        publish: AtomicUsize,
        published: Mutex<Vec<Notification>>,
    }

    struct FakeRefresher {
        calls: Arc<Calls>,
        fail: bool,
    }

    #[async_trait]
    impl CredentialRefresher for FakeRefresher {
        async fn refresh(&self) -> steproast_auth::Result<AccessToken> {
            self.calls.refresh.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AuthEngineError::InvalidGrant {
                    reason: "Token has been expired or revoked.".into(),
                });
            }
            Ok(AccessToken::new("access"))
        }
    }

    struct FakeSteps {
        calls: Arc<Calls>,
        steps: Option<u64>,
    }

    #[async_trait]
    impl StepSource for FakeSteps {
        async fn daily_steps(
            &self,
            token: &AccessToken,
            window: &DayWindow,
        ) -> steproast_adapters::Result<u64> {
            self.calls.fetch.fetch_add(1, Ordering::SeqCst);
            assert_eq!(token.secret(), "access");
            assert_eq!(window.end_millis - window.start_millis, 86_400_000);
            self.steps.ok_or(AdapterError::HttpStatus {
                service: "google fit",
                status: 503,
                message: "backend error".into(),
            })
        }
    }

    struct FakeGenerator {
        calls: Arc<Calls>,
        fail: bool,
    }

    #[async_trait]
    impl RoastGenerator for FakeGenerator {
        async fn generate(&self) -> steproast_agent::Result<String> {
            self.calls.generate.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AgentError::LlmHttpStatus {
                    status: 429,
                    message: "throttled".into(),
                });
            }
            Ok("Move it!".into())
        }
    }

    struct FakeNotifier {
        calls: Arc<Calls>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn publish(&self, notification: &Notification) -> steproast_adapters::Result<()> {
            self.calls.publish.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AdapterError::HttpStatus {
                    service: "sns",
                    status: 404,
                    message: "Topic does not exist".into(),
                });
            }
            self.calls
                .published
                .lock()
                .unwrap()
                .push(notification.clone());
            Ok(())
        }
    }

    #[derive(Default, Clone, Copy)]
    struct Faults {
        refresh: bool,
        fetch: bool,
        generate: bool,
        publish: bool,
    }

    fn check(steps: u64, faults: Faults) -> (StepCheck, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let check = StepCheck::new(
            Box::new(FakeRefresher {
                calls: calls.clone(),
                fail: faults.refresh,
            }),
            Box::new(FakeSteps {
                calls: calls.clone(),
                steps: (!faults.fetch).then_some(steps),
            }),
            Box::new(FakeGenerator {
                calls: calls.clone(),
                fail: faults.generate,
            }),
            Box::new(FakeNotifier {
                calls: calls.clone(),
                fail: faults.publish,
            }),
        );
        (check, calls)
    }

    fn counts(calls: &Calls) -> (usize, usize) {
        (
            calls.generate.load(Ordering::SeqCst),
            calls.publish.load(Ordering::SeqCst),
        )
    }

    #[tokio::test]
    async fn below_threshold_generates_and_publishes_once() {
        for steps in 0..100 {
            let (check, calls) = check(steps, Faults::default());
            let outcome = check.execute().await.unwrap();
            assert!(outcome.sent(), "steps={steps}");
            assert_eq!(counts(&calls), (1, 1), "steps={steps}");
        }
    }

    #[tokio::test]
    async fn at_or_above_threshold_skips_generator_and_notifier() {
        for steps in [100, 101, 150, 10_000, u64::MAX] {
            let (check, calls) = check(steps, Faults::default());
            let outcome = check.execute().await.unwrap();
            assert_eq!(outcome, CheckOutcome::NoRoastNeeded { steps });
            assert_eq!(counts(&calls), (0, 0), "steps={steps}");
        }
    }

    #[tokio::test]
    async fn custom_threshold() {
        let (check, calls) = check(250, Faults::default());
        let check = check.with_threshold(1_000);
        assert_eq!(check.threshold(), 1_000);
        assert!(check.execute().await.unwrap().sent());
        assert_eq!(counts(&calls), (1, 1));
    }

    #[tokio::test]
    async fn zero_steps_sends_roast() {
        let (check, calls) = check(0, Faults::default());
        let resp = check.run(serde_json::json!({})).await;

        assert_eq!(resp.status_code, 200);
        assert_eq!(
            resp.parsed_body().unwrap(),
            ResponseBody::Roasted {
                message: "Roast message sent successfully!".into(),
                steps: 0,
                roast: "Move it!".into(),
            }
        );
        let published = calls.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].body, "Steps0\n\nMove it!");
        assert_eq!(published[0].subject, "Your Daily Step Count Roast");
    }

    #[tokio::test]
    async fn active_day_returns_praise() {
        let (check, _calls) = check(150, Faults::default());
        let resp = check.run(serde_json::json!({"source": "aws.events"})).await;
        assert_eq!(resp.status_code, 200);
        assert_eq!(
            resp.parsed_body().unwrap(),
            ResponseBody::NoRoastNeeded {
                message: "Good job! No roasting needed today.".into(),
                steps: 150,
            }
        );
    }

    #[tokio::test]
    async fn invalid_refresh_token_is_500() {
        let (check, calls) = check(
            0,
            Faults {
                refresh: true,
                ..Faults::default()
            },
        );
        let resp = check.run(Value::Null).await;

        assert_eq!(resp.status_code, 500);
        assert_eq!(
            resp.parsed_body().unwrap(),
            ResponseBody::Failed {
                error: FAILURE_MESSAGE.into(),
                details: "Invalid refresh token or expired credentials".into(),
            }
        );
        assert_eq!(calls.fetch.load(Ordering::SeqCst), 0);
        assert_eq!(counts(&calls), (0, 0));
    }

    #[tokio::test]
    async fn fetch_failure_is_data_fetch_error() {
        let (check, calls) = check(
            0,
            Faults {
                fetch: true,
                ..Faults::default()
            },
        );
        let err = check.execute().await.unwrap_err();
        assert!(matches!(err, StepCheckError::DataFetch(_)));
        assert_eq!(counts(&calls), (0, 0));
    }

    #[tokio::test]
    async fn generation_failure_skips_publish() {
        let (check, calls) = check(
            5,
            Faults {
                generate: true,
                ..Faults::default()
            },
        );
        let err = check.execute().await.unwrap_err();
        assert!(matches!(err, StepCheckError::Generation(_)));
        assert_eq!(counts(&calls), (1, 0));
    }

    #[tokio::test]
    async fn publish_failure_after_generation_is_500() {
        let (check, calls) = check(
            42,
            Faults {
                publish: true,
                ..Faults::default()
            },
        );
        let resp = check.run(Value::Null).await;

        assert_eq!(resp.status_code, 500);
        match resp.parsed_body().unwrap() {
            ResponseBody::Failed { error, details } => {
                assert_eq!(error, FAILURE_MESSAGE);
                assert!(details.contains("Topic does not exist"));
            }
            other => panic!("unexpected body: {other:?}"),
        }
        // The roast was generated but nothing was delivered.
        assert_eq!(counts(&calls), (1, 1));
        assert!(calls.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn every_invocation_refreshes() {
        let (check, calls) = check(500, Faults::default());
        check.run(Value::Null).await;
        check.run(Value::Null).await;
        assert_eq!(calls.refresh.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn terminal_states() {
        assert!(CheckState::Done.is_terminal());
        assert!(CheckState::ErrorTerminal.is_terminal());
        assert!(!CheckState::Notifying.is_terminal());
    }

    #[test]
    fn progress_starts_at_start() {
        let mut p = Progress::new();
        assert_eq!(p.state, CheckState::Start);
        p.advance(CheckState::FetchingSteps);
        assert_eq!(p.state, CheckState::FetchingSteps);
    }
}
