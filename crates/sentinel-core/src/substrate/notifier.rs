//! `Notifier` — outbound chat notifications for developer escalation and
//! operator-visible state changes (approval requested, rollback fired,
//! circuit opened).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApprovalRequested,
    ApprovalResolved,
    RemediationFailed,
    RollbackFired,
    CircuitOpened,
    DeveloperEscalation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub repository: String,
    pub failure_id: Option<uuid::Uuid>,
    pub summary: String,
    pub details: serde_json::Value,
}

/// An outbound channel for a single notification kind.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: &str, kind: NotificationKind, payload: NotificationPayload) -> Result<()>;
}

/// Records every notification sent instead of delivering it, for tests
/// that assert on escalation behavior.
#[derive(Default)]
pub struct StubNotifier {
    sent: Mutex<Vec<(String, NotificationKind, NotificationPayload)>>,
}

impl StubNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, NotificationKind, NotificationPayload)> {
        self.sent.lock().expect("stub notifier mutex poisoned").clone()
    }
}

#[async_trait]
impl Notifier for StubNotifier {
    async fn send(&self, channel: &str, kind: NotificationKind, payload: NotificationPayload) -> Result<()> {
        self.sent
            .lock()
            .expect("stub notifier mutex poisoned")
            .push((channel.to_string(), kind, payload));
        Ok(())
    }
}
