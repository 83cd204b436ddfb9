//! The run pipeline: every pre-run gate followed by the dispatch loop.
//!
//! ## Gate order
//!
//! ```text
//! config → body → test send → bounced list → valid list → confirm
//!        → open failure log → dispatch
//! ```
//!
//! A failed gate is a controlled abort reported as [`BlastReport::Aborted`].
//! Nothing is written to disk before the operator confirms.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::body::load_body;
use crate::config::Config;
use crate::dispatch::{
    DispatchLoop, DispatchReport, DispatchSettings, FailureLogError, FailureSink, ProgressTracker,
};
use crate::operator::{Operator, ProgressDisplay, ProgressObserver, Tone};
use crate::recipients::{load_bounced, load_valid, reconcile, InputError, Recipient};
use crate::transport::Transport;

/// Unsubscribe id used for the test message.
const TEST_UNSUBSCRIBE_ID: &str = "test";

/// Fatal run errors.
#[derive(Debug, Error)]
pub enum BlastError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    FailureLog(#[from] FailureLogError),
}

/// Why a run stopped before dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    ConfigInvalid,
    EmptyBody,
    TestSendFailed,
    TestDeclined,
    EmptyBouncedList,
    EmptyValidList,
    UserDeclined,
}

/// How a run ended.
#[derive(Debug)]
pub enum BlastReport {
    Completed(DispatchReport),
    Aborted(AbortReason),
}

/// A configured blast run.
pub struct Blast {
    config: Config,
    transport: Arc<dyn Transport>,
    operator: Arc<dyn Operator>,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl Blast {
    pub fn new(config: Config, transport: Arc<dyn Transport>, operator: Arc<dyn Operator>) -> Self {
        Self {
            config,
            transport,
            operator,
            observer: None,
        }
    }

    /// Show live progress through `observer` while dispatching.
    pub fn with_progress(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub async fn run(&self) -> Result<BlastReport, BlastError> {
        let run_config = self.config.run_configuration();
        if !run_config.valid {
            self.operator
                .announce(Tone::Error, "Missing SENDGRID_API_KEY or FROM_EMAIL. Check your environment.");
            return Ok(self.abort(AbortReason::ConfigInvalid));
        }

        let body = load_body(&self.config.body_path, self.config.subject.as_deref()).await?;
        if body.is_empty() {
            self.operator
                .announce(Tone::Error, "The email subject or body is empty. Nothing to send.");
            return Ok(self.abort(AbortReason::EmptyBody));
        }

        if let Some(address) = &self.config.test_email {
            let test_recipient = Recipient::new(address.as_str(), TEST_UNSUBSCRIBE_ID);
            let sent = tokio::time::timeout(
                self.send_timeout(),
                self.transport.send(&run_config, &test_recipient, &body),
            )
            .await;

            match sent {
                Ok(Ok(())) => info!(to = %address, "test_email_sent"),
                Ok(Err(e)) => {
                    warn!(to = %address, error = %e, "test_email_failed");
                    self.operator
                        .announce(Tone::Error, &format!("Test email to {} failed: {}", address, e));
                    return Ok(self.abort(AbortReason::TestSendFailed));
                }
                Err(_) => {
                    warn!(to = %address, "test_email_timeout");
                    self.operator
                        .announce(Tone::Error, &format!("Test email to {} timed out", address));
                    return Ok(self.abort(AbortReason::TestSendFailed));
                }
            }

            if !self.operator.confirm_test(address).await {
                self.operator.announce(Tone::Error, "Process cancelled. Have a nice day.");
                return Ok(self.abort(AbortReason::TestDeclined));
            }
        }

        let bounced = load_bounced(&self.config.bounced_path).await?;
        if bounced.is_empty() {
            self.operator
                .announce(Tone::Error, "No bounced addresses found. Check your bouncedEmails.csv");
            return Ok(self.abort(AbortReason::EmptyBouncedList));
        }

        let valid = load_valid(&self.config.valid_path).await?;
        if valid.is_empty() {
            self.operator
                .announce(Tone::Error, "No email addresses found. Check your validEmails.csv");
            return Ok(self.abort(AbortReason::EmptyValidList));
        }

        let reconciled = reconcile(&valid, &bounced);
        let email_total = reconciled.len();

        if !self.operator.confirm_dispatch(email_total).await {
            self.operator.announce(Tone::Error, "Process cancelled. Have a nice day.");
            return Ok(self.abort(AbortReason::UserDeclined));
        }

        let failures = FailureSink::create(&self.config.failed_path).await?;
        self.operator.announce(Tone::Info, "Beginning send process...");

        let progress = Arc::new(ProgressTracker::new());
        let display = self.observer.as_ref().map(|observer| {
            ProgressDisplay::spawn(
                Arc::clone(&progress),
                email_total as u64,
                Duration::from_millis(self.config.progress_interval_ms),
                Arc::clone(observer),
            )
        });

        let settings = DispatchSettings {
            concurrency: self.config.send_concurrency,
            send_timeout: self.send_timeout(),
        };
        let dispatch = DispatchLoop::new(
            Arc::clone(&self.transport),
            Arc::clone(&progress),
            failures,
            settings,
        );
        let result = dispatch.run(&reconciled, &run_config, &body).await;

        if let Some(display) = display {
            display.stop().await;
        }
        let report = result?;

        self.operator.announce(
            Tone::Success,
            &format!(
                "Email blast complete! Sent {}, failed {}, skipped {} of {}. Have a nice day! :)",
                report.summary.sent, report.summary.failed, report.summary.skipped, email_total
            ),
        );

        Ok(BlastReport::Completed(report))
    }

    fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.config.send_timeout_ms)
    }

    fn abort(&self, reason: AbortReason) -> BlastReport {
        info!(reason = ?reason, "blast_aborted");
        BlastReport::Aborted(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashSet, VecDeque};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::body::MessageBody;
    use crate::config::{RunConfiguration, DEFAULT_API_URL};
    use crate::dispatch::{DispatchOutcome, RunCounters};
    use crate::transport::SendError;

    #[derive(Default)]
    struct FakeTransport {
        failing: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(
            &self,
            _config: &RunConfiguration,
            recipient: &Recipient,
            _body: &MessageBody,
        ) -> Result<(), SendError> {
            self.calls.lock().unwrap().push(recipient.email.clone());
            if self.failing.contains(&recipient.email) {
                Err(SendError::Rejected {
                    status: 503,
                    body: String::new(),
                })
            } else {
                Ok(())
            }
        }
    }

    /// Answers questions from a script and records everything.
    #[derive(Default)]
    struct ScriptedOperator {
        answers: Mutex<VecDeque<bool>>,
        questions: Mutex<Vec<String>>,
        messages: Mutex<Vec<String>>,
    }

    impl ScriptedOperator {
        fn answering(answers: &[bool]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().copied().collect()),
                ..Default::default()
            }
        }

        fn questions(&self) -> Vec<String> {
            self.questions.lock().unwrap().clone()
        }

        fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Operator for ScriptedOperator {
        async fn confirm(&self, question: &str) -> bool {
            self.questions.lock().unwrap().push(question.to_string());
            self.answers.lock().unwrap().pop_front().unwrap_or(false)
        }

        fn announce(&self, _tone: Tone, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        config: Config,
    }

    impl Fixture {
        fn new(bounced: &str, valid: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let write = |name: &str, content: &str| -> PathBuf {
                let path = dir.path().join(name);
                std::fs::write(&path, content).unwrap();
                path
            };

            let config = Config {
                api_key: Some("SG.test".to_string()),
                from_email: Some("news@example.com".to_string()),
                from_name: None,
                subject: Some("Monthly update".to_string()),
                body_path: write("emailBody.html", "<p>News</p>"),
                bounced_path: write("bouncedEmails.csv", bounced),
                valid_path: write("validEmails.csv", valid),
                failed_path: dir.path().join("failedEmails.csv"),
                test_email: None,
                api_url: DEFAULT_API_URL.to_string(),
                send_timeout_ms: 1000,
                send_concurrency: 1,
                progress_interval_ms: 10,
            };

            Self { dir, config }
        }

        fn failed_log(&self) -> &Path {
            &self.config.failed_path
        }

        fn blast(&self, transport: Arc<FakeTransport>, operator: Arc<ScriptedOperator>) -> Blast {
            Blast::new(self.config.clone(), transport, operator)
        }
    }

    const BOUNCED: &str = "email\nb@x\n";
    const VALID: &str = "email,unsubscribeId\na@x,1\nb@x,2\nc@x,3\n";

    #[tokio::test]
    async fn test_mixed_run_end_to_end() {
        let fixture = Fixture::new(BOUNCED, VALID);
        let transport = Arc::new(FakeTransport {
            failing: ["c@x".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let operator = Arc::new(ScriptedOperator::answering(&[true]));

        let report = fixture
            .blast(Arc::clone(&transport), Arc::clone(&operator))
            .run()
            .await
            .unwrap();

        let report = match report {
            BlastReport::Completed(report) => report,
            other => panic!("Expected Completed, got {:?}", other),
        };
        assert!(report.outcomes[0].is_sent());
        assert!(report.outcomes[1].is_skipped());
        assert!(matches!(report.outcomes[2], DispatchOutcome::Failed { .. }));
        assert_eq!(
            report.summary,
            RunCounters {
                processed: 3,
                sent: 1,
                failed: 1,
                skipped: 1,
            }
        );

        assert_eq!(
            operator.questions(),
            vec!["Proceed with sending to 3 addresses?".to_string()]
        );
        assert_eq!(transport.calls(), vec!["a@x".to_string(), "c@x".to_string()]);
        assert_eq!(
            std::fs::read_to_string(fixture.failed_log()).unwrap(),
            "email,unsubscribeId\nc@x,3\n"
        );
    }

    #[tokio::test]
    async fn test_invalid_config_aborts_before_anything() {
        let mut fixture = Fixture::new(BOUNCED, VALID);
        fixture.config.api_key = None;
        let transport = Arc::new(FakeTransport::default());
        let operator = Arc::new(ScriptedOperator::answering(&[true]));

        let report = fixture
            .blast(Arc::clone(&transport), Arc::clone(&operator))
            .run()
            .await
            .unwrap();

        assert!(matches!(report, BlastReport::Aborted(AbortReason::ConfigInvalid)));
        assert!(operator.questions().is_empty());
        assert!(transport.calls().is_empty());
        assert!(!fixture.failed_log().exists());
    }

    #[tokio::test]
    async fn test_empty_body_aborts() {
        let mut fixture = Fixture::new(BOUNCED, VALID);
        std::fs::write(&fixture.config.body_path, "   ").unwrap();
        fixture.config.test_email = Some("me@x".to_string());
        let transport = Arc::new(FakeTransport::default());

        let report = fixture
            .blast(Arc::clone(&transport), Arc::new(ScriptedOperator::default()))
            .run()
            .await
            .unwrap();

        assert!(matches!(report, BlastReport::Aborted(AbortReason::EmptyBody)));
        assert!(transport.calls().is_empty());
        assert!(!fixture.failed_log().exists());
    }

    #[tokio::test]
    async fn test_missing_body_file_aborts_as_empty_body() {
        let mut fixture = Fixture::new(BOUNCED, VALID);
        fixture.config.body_path = fixture.dir.path().join("absent.html");
        let transport = Arc::new(FakeTransport::default());
        let operator = Arc::new(ScriptedOperator::answering(&[true]));

        let report = fixture
            .blast(Arc::clone(&transport), Arc::clone(&operator))
            .run()
            .await
            .unwrap();

        assert!(matches!(report, BlastReport::Aborted(AbortReason::EmptyBody)));
        assert!(operator.questions().is_empty());
        assert!(transport.calls().is_empty());
        assert!(!fixture.failed_log().exists());
    }

    #[tokio::test]
    async fn test_empty_valid_list_aborts_before_prompt() {
        let fixture = Fixture::new(BOUNCED, "email,unsubscribeId\n");
        let operator = Arc::new(ScriptedOperator::answering(&[true]));

        let report = fixture
            .blast(Arc::new(FakeTransport::default()), Arc::clone(&operator))
            .run()
            .await
            .unwrap();

        assert!(matches!(report, BlastReport::Aborted(AbortReason::EmptyValidList)));
        assert!(operator.questions().is_empty());
        assert!(operator
            .messages()
            .iter()
            .any(|m| m.contains("Check your validEmails.csv")));
        assert!(!fixture.failed_log().exists());
    }

    #[tokio::test]
    async fn test_empty_bounced_list_aborts() {
        let fixture = Fixture::new("email\n", VALID);
        let operator = Arc::new(ScriptedOperator::answering(&[true]));

        let report = fixture
            .blast(Arc::new(FakeTransport::default()), Arc::clone(&operator))
            .run()
            .await
            .unwrap();

        assert!(matches!(report, BlastReport::Aborted(AbortReason::EmptyBouncedList)));
        assert!(operator.questions().is_empty());
        assert!(!fixture.failed_log().exists());
    }

    #[tokio::test]
    async fn test_declined_run_touches_nothing() {
        let fixture = Fixture::new(BOUNCED, VALID);
        let transport = Arc::new(FakeTransport::default());
        let operator = Arc::new(ScriptedOperator::answering(&[false]));

        let report = fixture
            .blast(Arc::clone(&transport), Arc::clone(&operator))
            .run()
            .await
            .unwrap();

        assert!(matches!(report, BlastReport::Aborted(AbortReason::UserDeclined)));
        assert_eq!(operator.questions().len(), 1);
        assert!(transport.calls().is_empty());
        assert!(!fixture.failed_log().exists());
    }

    #[tokio::test]
    async fn test_test_email_sent_before_lists() {
        let mut fixture = Fixture::new(BOUNCED, VALID);
        fixture.config.test_email = Some("me@x".to_string());
        let transport = Arc::new(FakeTransport::default());
        let operator = Arc::new(ScriptedOperator::answering(&[true, true]));

        let report = fixture
            .blast(Arc::clone(&transport), Arc::clone(&operator))
            .run()
            .await
            .unwrap();

        assert!(matches!(report, BlastReport::Completed(_)));
        assert_eq!(transport.calls()[0], "me@x");
        assert_eq!(operator.questions().len(), 2);
        assert!(operator.questions()[0].contains("me@x"));
    }

    #[tokio::test]
    async fn test_failed_test_email_aborts() {
        let mut fixture = Fixture::new(BOUNCED, VALID);
        fixture.config.test_email = Some("me@x".to_string());
        let transport = Arc::new(FakeTransport {
            failing: ["me@x".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let operator = Arc::new(ScriptedOperator::answering(&[true, true]));

        let report = fixture
            .blast(Arc::clone(&transport), Arc::clone(&operator))
            .run()
            .await
            .unwrap();

        assert!(matches!(report, BlastReport::Aborted(AbortReason::TestSendFailed)));
        assert!(operator.questions().is_empty());
        assert_eq!(transport.calls(), vec!["me@x".to_string()]);
    }

    #[tokio::test]
    async fn test_declined_test_email_aborts() {
        let mut fixture = Fixture::new(BOUNCED, VALID);
        fixture.config.test_email = Some("me@x".to_string());
        let transport = Arc::new(FakeTransport::default());
        let operator = Arc::new(ScriptedOperator::answering(&[false]));

        let report = fixture
            .blast(Arc::clone(&transport), Arc::clone(&operator))
            .run()
            .await
            .unwrap();

        assert!(matches!(report, BlastReport::Aborted(AbortReason::TestDeclined)));
        assert_eq!(transport.calls().len(), 1);
        assert!(!fixture.failed_log().exists());
    }

    #[tokio::test]
    async fn test_unwritable_failure_log_sends_nothing() {
        let mut fixture = Fixture::new(BOUNCED, VALID);
        fixture.config.failed_path = fixture.dir.path().join("no-such-dir").join("failed.csv");
        let transport = Arc::new(FakeTransport::default());
        let operator = Arc::new(ScriptedOperator::answering(&[true]));

        let err = fixture
            .blast(Arc::clone(&transport), operator)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, BlastError::FailureLog(FailureLogError::Open { .. })));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_valid_file_is_an_error() {
        let mut fixture = Fixture::new(BOUNCED, VALID);
        fixture.config.valid_path = fixture.dir.path().join("absent.csv");

        let err = fixture
            .blast(
                Arc::new(FakeTransport::default()),
                Arc::new(ScriptedOperator::default()),
            )
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, BlastError::Input(InputError::Read { .. })));
    }
}
