//! `Explainability` — the append-only decision ledger. Every AI or gate
//! decision (classification, fix generation, risk assessment, file
//! selection) is recorded through this service so the dashboard's
//! audit-trail slice and post-mortem tooling have a uniform query surface.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::DecisionRecord;
use crate::error::Result;
use crate::substrate::Store;

pub struct Explainability {
    store: Arc<dyn Store>,
}

impl Explainability {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn record(&self, decision: DecisionRecord) -> Result<()> {
        self.store.upsert_decision(&decision).await
    }

    pub async fn for_failure(&self, failure_id: Uuid) -> Result<Vec<DecisionRecord>> {
        self.store.decisions_for_failure(failure_id).await
    }

    pub async fn recent(&self, limit: u32) -> Result<Vec<DecisionRecord>> {
        self.store.recent_decisions(limit).await
    }
}
