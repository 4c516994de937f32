//! Background tasks for interactive front ends.
//!
//! An operation is spawned with [`dispatch`]; the foreground loop reads
//! [`TaskEvent`]s until `Finished` and may cancel at any point. Cancelling
//! drops the operation future, which kills any child process it was waiting
//! on.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::device::DeviceInfo;
use crate::error::ServiceError;
use crate::runner::CommandResult;
use crate::service::{AppsOutcome, OneClickOutcome};

pub const CANCELLED: &str = "Cancelled";

/// What a finished operation reports to the user.
pub trait Outcome: Send + 'static {
    fn success(&self) -> bool;

    /// Text shown as the operation's output.
    fn output(&self) -> String;

    fn summary(&self) -> String {
        if self.success() {
            "Completed".to_string()
        } else {
            "Failed".to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Output(String),
    Finished { success: bool, output: String },
}

/// Handle to a dispatched operation.
#[derive(Debug)]
pub struct Task<T> {
    events: mpsc::UnboundedReceiver<TaskEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<Option<T>>,
}

/// Spawn `operation` on the runtime.
///
/// Emits one `Output` then one `Finished`, or only `Finished` with
/// [`CANCELLED`] if cancelled first.
pub fn dispatch<F, T>(operation: F) -> Task<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Outcome,
{
    let (tx, events) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!("operation cancelled");
                let _ = tx.send(TaskEvent::Finished {
                    success: false,
                    output: CANCELLED.to_string(),
                });
                None
            }
            value = operation => {
                let _ = tx.send(TaskEvent::Output(value.output()));
                let _ = tx.send(TaskEvent::Finished {
                    success: value.success(),
                    output: value.summary(),
                });
                Some(value)
            }
        }
    });

    Task {
        events,
        cancel,
        handle,
    }
}

impl<T> Task<T> {
    /// Next event, or `None` once the task is gone.
    pub async fn next_event(&mut self) -> Option<TaskEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The operation's value; `None` when cancelled or panicked.
    pub async fn join(self) -> Option<T> {
        match self.handle.await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "operation task failed");
                None
            }
        }
    }
}

// ── Outcome impls ───────────────────────────────────────────────────────────

impl Outcome for CommandResult {
    fn success(&self) -> bool {
        self.success
    }

    fn output(&self) -> String {
        CommandResult::output(self).trim_end().to_string()
    }
}

impl Outcome for OneClickOutcome {
    fn success(&self) -> bool {
        self.success
    }

    fn output(&self) -> String {
        self.steps
            .iter()
            .map(|s| {
                let status = if s.result.success { "ok" } else { "failed" };
                let text = s.result.output().trim();
                if text.is_empty() {
                    format!("{}: {}", s.step, status)
                } else {
                    format!("{}: {} ({})", s.step, status, text)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn summary(&self) -> String {
        if self.success {
            "Device mounted".to_string()
        } else {
            "Mount failed".to_string()
        }
    }
}

impl Outcome for AppsOutcome {
    fn success(&self) -> bool {
        self.result.success
    }

    fn output(&self) -> String {
        if self.result.success {
            self.listing.names().collect::<Vec<_>>().join("\n")
        } else {
            self.result.output().trim_end().to_string()
        }
    }

    fn summary(&self) -> String {
        if self.result.success {
            format!("{} apps", self.listing.len())
        } else {
            "Failed".to_string()
        }
    }
}

impl Outcome for DeviceInfo {
    fn success(&self) -> bool {
        true
    }

    fn output(&self) -> String {
        self.rows()
            .into_iter()
            .map(|(label, value)| format!("{}: {}", label, value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<T: Outcome> Outcome for Result<T, ServiceError> {
    fn success(&self) -> bool {
        self.as_ref().is_ok_and(|v| v.success())
    }

    fn output(&self) -> String {
        match self {
            Ok(v) => v.output(),
            Err(e) => e.to_string(),
        }
    }

    fn summary(&self) -> String {
        match self {
            Ok(v) => v.summary(),
            Err(_) => "Failed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{Step, StepKind};
    use crate::testing::{failed, ok};
    use std::time::Duration;

    #[tokio::test]
    async fn completed_task_emits_output_then_finished() {
        let mut task = dispatch(async { ok("SUCCESS: Validated\n") });
        assert_eq!(
            task.next_event().await,
            Some(TaskEvent::Output("SUCCESS: Validated".into()))
        );
        assert_eq!(
            task.next_event().await,
            Some(TaskEvent::Finished {
                success: true,
                output: "Completed".into()
            })
        );
        assert_eq!(task.next_event().await, None);
    }

    #[tokio::test]
    async fn join_returns_the_value() {
        let task = dispatch(async { failed(2, "boom") });
        let result = task.join().await.unwrap();
        assert_eq!(result.exit_code, 2);
    }

    #[tokio::test]
    async fn cancel_finishes_with_cancelled() {
        let mut task = dispatch(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ok("")
        });
        task.cancel();
        assert_eq!(
            task.next_event().await,
            Some(TaskEvent::Finished {
                success: false,
                output: CANCELLED.into()
            })
        );
        assert!(task.join().await.is_none());
    }

    #[test]
    fn one_click_output_lists_steps() {
        let outcome = OneClickOutcome {
            success: false,
            steps: vec![
                Step {
                    step: StepKind::Validate,
                    result: ok(""),
                },
                Step {
                    step: StepKind::Mount,
                    result: failed(1, "busy"),
                },
            ],
        };
        assert_eq!(outcome.output(), "validate: ok\nmount: failed (busy)");
        assert_eq!(outcome.summary(), "Mount failed");
    }

    #[test]
    fn errors_are_failures() {
        let outcome: Result<DeviceInfo, ServiceError> = Err(ServiceError::NoDevice);
        assert!(!outcome.success());
        assert_eq!(outcome.output(), "No device found");
    }
}
