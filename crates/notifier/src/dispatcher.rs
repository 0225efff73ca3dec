//! Fire-and-forget email dispatcher.
//!
//! `dispatch` validates synchronously, then hands the attempt sequence to a
//! detached tokio task and returns. The caller never learns whether the
//! message was delivered: failures are logged, counted in [`DispatchStats`]
//! and dropped. Re-dispatching an identical request sends it again.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use uuid::Uuid;

use prescripto_common::types::MessageRequest;

use crate::config::MailerConfig;
use crate::error::{DeliveryError, NotifierError};
use crate::message::OutgoingMessage;
use crate::rate_limit::RateLimiter;
use crate::retry::{AttemptOutcome, DeliveryAttempt, DispatchState, RetryPolicy};
use crate::stats::DispatchStats;
use crate::transport::MailTransport;

/// Maximum number of transport sessions open at once, process-wide.
const MAX_SESSIONS: usize = 1;

/// Terminal result of one attempt sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub dispatch_id: Uuid,
    pub state: DispatchState,
    pub attempts: u32,
}

/// Cheap to clone; all clones share the session gate, limiter and stats.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn MailTransport>,
    config: MailerConfig,
    policy: RetryPolicy,
    sessions: Semaphore,
    limiter: RateLimiter,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(config: MailerConfig, transport: Arc<dyn MailTransport>) -> Self {
        let policy = RetryPolicy::from(&config);
        let limiter = RateLimiter::new(config.rate_limit, config.rate_window);

        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                policy,
                sessions: Semaphore::new(MAX_SESSIONS),
                limiter,
                stats: DispatchStats::new(),
            }),
        }
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.inner.stats
    }

    /// Validate `request` and schedule its delivery in the background.
    ///
    /// Returns as soon as the task is spawned. Only validation errors and a
    /// missing tokio runtime are reported.
    pub fn dispatch(&self, request: MessageRequest) -> Result<(), NotifierError> {
        let message = OutgoingMessage::prepare(&request, &self.inner.config)?;
        let runtime = Handle::try_current()
            .map_err(|e| NotifierError::Runtime(format!("dispatch needs a tokio runtime: {}", e)))?;
        let dispatch_id = Uuid::new_v4();
        self.inner.stats.record_dispatched();

        tracing::info!(
            dispatch_id = %dispatch_id,
            recipient = %message.to,
            "Email queued for background delivery"
        );

        let inner = Arc::clone(&self.inner);
        // Detached: the JoinHandle is dropped and the outcome goes nowhere.
        runtime.spawn(async move {
            inner.run(dispatch_id, message).await;
        });

        Ok(())
    }

    /// Validate `request` and run the full attempt sequence, awaiting it.
    pub async fn deliver(&self, request: MessageRequest) -> Result<DeliveryReport, NotifierError> {
        let message = OutgoingMessage::prepare(&request, &self.inner.config)?;
        self.inner.stats.record_dispatched();
        Ok(self.inner.run(Uuid::new_v4(), message).await)
    }
}

impl Inner {
    async fn run(&self, dispatch_id: Uuid, message: OutgoingMessage) -> DeliveryReport {
        let max_attempts = self.policy.max_attempts();
        let mut state = DispatchState::Pending;
        let mut attempts = 0;

        loop {
            state = state.begin();
            let DispatchState::Attempting { attempt } = state else {
                break;
            };
            attempts += 1;

            tracing::debug!(
                dispatch_id = %dispatch_id,
                attempt = attempt + 1,
                max_attempts,
                "Sending email"
            );

            let result = self.attempt(&message).await;
            match &result {
                Ok(response) => {
                    tracing::info!(
                        dispatch_id = %dispatch_id,
                        attempt = attempt + 1,
                        response = %response,
                        "Email sent"
                    );
                }
                Err(e) => {
                    self.stats.record_failure(e.kind());
                    tracing::warn!(
                        dispatch_id = %dispatch_id,
                        attempt = attempt + 1,
                        failure_kind = %e.kind(),
                        error = %e,
                        hint = e.hint().unwrap_or(""),
                        "Email attempt failed"
                    );
                }
            }

            let outcome = AttemptOutcome::from(&result);
            state = state.advance(
                &DeliveryAttempt {
                    attempt_number: attempt,
                    outcome,
                },
                &self.policy,
            );

            match state {
                DispatchState::RetryScheduled { next_attempt, .. } => {
                    let delay = self.policy.delay_for(next_attempt);
                    self.stats.record_retry();
                    tracing::info!(
                        dispatch_id = %dispatch_id,
                        retry = next_attempt,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying email send"
                    );
                    tokio::time::sleep(delay).await;
                }
                DispatchState::Delivered => {
                    self.stats.record_delivered();
                    break;
                }
                DispatchState::Exhausted => {
                    self.stats.record_exhausted();
                    tracing::error!(
                        target: "dead_letter",
                        dispatch_id = %dispatch_id,
                        recipient = %message.to,
                        subject = %message.subject,
                        attempts,
                        "Email delivery exhausted all attempts"
                    );
                    break;
                }
                DispatchState::Rejected => {
                    self.stats.record_rejected();
                    tracing::error!(
                        target: "dead_letter",
                        dispatch_id = %dispatch_id,
                        recipient = %message.to,
                        subject = %message.subject,
                        "Email could not be built, not retrying"
                    );
                    break;
                }
                DispatchState::Pending | DispatchState::Attempting { .. } => break,
            }
        }

        DeliveryReport {
            dispatch_id,
            state,
            attempts,
        }
    }

    /// One transport session: session permit, rate slot, send.
    async fn attempt(&self, message: &OutgoingMessage) -> Result<String, DeliveryError> {
        let _session = self
            .sessions
            .acquire()
            .await
            .map_err(|_| DeliveryError::Unclassified("Session gate closed".to_string()))?;
        self.limiter.acquire().await;
        self.transport.send(message).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;

    /// Fails the first `failures` sends, then succeeds. Records each send.
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
        sent_at: Mutex<Vec<Instant>>,
        sent: Mutex<Vec<OutgoingMessage>>,
    }

    impl FlakyTransport {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
                sent_at: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn gaps(&self) -> Vec<Duration> {
            let at = self.sent_at.lock().unwrap();
            at.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    #[async_trait]
    impl MailTransport for FlakyTransport {
        async fn send(&self, message: &OutgoingMessage) -> Result<String, DeliveryError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.sent_at.lock().unwrap().push(Instant::now());
            self.sent.lock().unwrap().push(message.clone());
            if n < self.failures {
                Err(DeliveryError::Connection("connection refused".to_string()))
            } else {
                Ok("250 OK".to_string())
            }
        }
    }

    struct BrokenMessageTransport;

    #[async_trait]
    impl MailTransport for BrokenMessageTransport {
        async fn send(&self, _message: &OutgoingMessage) -> Result<String, DeliveryError> {
            Err(DeliveryError::Message("invalid recipient".to_string()))
        }
    }

    fn config() -> MailerConfig {
        MailerConfig::default().with_credentials("clinic@example.com", "app-pass")
    }

    fn request() -> MessageRequest {
        MessageRequest::new("pat@example.com", "Appointment confirmed")
            .html("<p>Dr. Lee, <b>Monday 10:00</b></p>")
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_fourth_attempt_with_linear_delays() {
        let transport = FlakyTransport::new(3);
        let dispatcher = Dispatcher::new(config(), transport.clone());

        let report = dispatcher.deliver(request()).await.unwrap();

        assert_eq!(report.state, DispatchState::Delivered);
        assert_eq!(report.attempts, 4);
        assert_eq!(transport.calls(), 4);
        assert_eq!(
            transport.gaps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3)
            ]
        );

        let snap = dispatcher.stats().snapshot();
        assert_eq!(snap.delivered, 1);
        assert_eq!(snap.retried, 3);
        assert_eq!(snap.failures.connection, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_four_failures() {
        let transport = FlakyTransport::new(u32::MAX);
        let dispatcher = Dispatcher::new(config(), transport.clone());

        let report = dispatcher.deliver(request()).await.unwrap();

        assert_eq!(report.state, DispatchState::Exhausted);
        assert_eq!(report.attempts, 4);
        assert_eq!(transport.calls(), 4);
        assert_eq!(dispatcher.stats().exhausted(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_sends_once() {
        let transport = FlakyTransport::new(0);
        let dispatcher = Dispatcher::new(config(), transport.clone());

        let report = dispatcher.deliver(request()).await.unwrap();

        assert_eq!(report.state, DispatchState::Delivered);
        assert_eq!(report.attempts, 1);
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].text, "Dr. Lee, Monday 10:00");
        assert_eq!(sent[0].from_address, "clinic@example.com");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbuildable_message_is_not_retried() {
        let dispatcher = Dispatcher::new(config(), Arc::new(BrokenMessageTransport));

        let report = dispatcher.deliver(request()).await.unwrap();

        assert_eq!(report.state, DispatchState::Rejected);
        assert_eq!(report.attempts, 1);
    }

    #[tokio::test]
    async fn test_validation_fails_before_any_send() {
        let transport = FlakyTransport::new(0);
        let dispatcher = Dispatcher::new(config(), transport.clone());

        assert!(matches!(
            dispatcher.dispatch(MessageRequest::new("", "Subject")),
            Err(NotifierError::Validation(_))
        ));
        assert!(matches!(
            dispatcher.deliver(MessageRequest::new("pat@example.com", "")).await,
            Err(NotifierError::Validation(_))
        ));
        assert_eq!(transport.calls(), 0);
        assert_eq!(dispatcher.stats().snapshot().dispatched, 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_validation() {
        let transport = FlakyTransport::new(0);
        let dispatcher = Dispatcher::new(MailerConfig::default(), transport.clone());

        assert!(matches!(
            dispatcher.dispatch(request()),
            Err(NotifierError::Validation(_))
        ));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_dispatch_outside_runtime_is_an_error() {
        let transport = FlakyTransport::new(0);
        let dispatcher = Dispatcher::new(config(), transport.clone());

        assert!(matches!(
            dispatcher.dispatch(request()),
            Err(NotifierError::Runtime(_))
        ));
        assert_eq!(transport.calls(), 0);
        assert_eq!(dispatcher.stats().snapshot().dispatched, 0);
    }
}
