//! Fire-and-forget notifications about proposal lifecycle events.
//!
//! Events go onto an unbounded queue drained by a background task. Delivery
//! failures are logged and dropped; they never reach the caller that
//! triggered the event.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::model::ApprovalStatus;
use crate::error::DealEngineError;
use crate::DealEngineResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    ProposalSubmitted {
        proposal_id: String,
        owner: String,
        client_name: String,
    },
    ProposalDecided {
        proposal_id: String,
        owner: String,
        status: ApprovalStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rejection_note: Option<String>,
    },
}

impl NotificationEvent {
    pub fn proposal_id(&self) -> &str {
        match self {
            NotificationEvent::ProposalSubmitted { proposal_id, .. }
            | NotificationEvent::ProposalDecided { proposal_id, .. } => proposal_id,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> DealEngineResult<()>;
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, event: &NotificationEvent) -> DealEngineResult<()> {
        info!(proposal = event.proposal_id(), ?event, "notification");
        Ok(())
    }
}

/// Sending side of the notification queue. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<NotificationEvent>,
}

impl NotificationQueue {
    /// Enqueue without waiting. A closed queue only produces a warning.
    pub fn publish(&self, event: NotificationEvent) {
        if let Err(e) = self.tx.send(event) {
            warn!(
                proposal = e.0.proposal_id(),
                "notification queue closed; event dropped"
            );
        }
    }

    /// A queue whose events are discarded, for callers with no notifier.
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }
}

/// Start the worker that drains the queue into `notifier`. Must be called
/// inside a tokio runtime. The worker exits once every queue handle is
/// dropped and the backlog is delivered.
pub fn spawn_notification_worker(
    notifier: Arc<dyn Notifier>,
) -> (NotificationQueue, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(notification_worker(rx, notifier));
    (NotificationQueue { tx }, handle)
}

async fn notification_worker(
    mut rx: mpsc::UnboundedReceiver<NotificationEvent>,
    notifier: Arc<dyn Notifier>,
) {
    info!("notification worker started");
    while let Some(event) = rx.recv().await {
        if let Err(e) = notifier.notify(&event).await {
            log_failure(&event, &e);
        }
    }
    info!("notification worker shutting down");
}

fn log_failure(event: &NotificationEvent, error: &DealEngineError) {
    warn!(
        proposal = event.proposal_id(),
        error = %error,
        "notification failed; continuing"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for Recording {
        async fn notify(&self, event: &NotificationEvent) -> DealEngineResult<()> {
            let id = event.proposal_id().to_string();
            self.seen.lock().unwrap().push(id.clone());
            if id == "boom" {
                return Err(DealEngineError::Storage("smtp down".into()));
            }
            Ok(())
        }
    }

    fn submitted(id: &str) -> NotificationEvent {
        NotificationEvent::ProposalSubmitted {
            proposal_id: id.into(),
            owner: "ana".into(),
            client_name: "ACME".into(),
        }
    }

    #[tokio::test]
    async fn test_worker_survives_failures() {
        let notifier = Arc::new(Recording::default());
        let (queue, handle) = spawn_notification_worker(notifier.clone());
        queue.publish(submitted("boom"));
        queue.publish(submitted("FLX26-2"));
        drop(queue);
        handle.await.unwrap();
        assert_eq!(
            *notifier.seen.lock().unwrap(),
            vec!["boom".to_string(), "FLX26-2".to_string()]
        );
    }

    #[test]
    fn test_publish_on_disconnected_queue_is_silent() {
        NotificationQueue::disconnected().publish(submitted("FLX26-3"));
    }
}
