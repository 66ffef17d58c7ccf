//! `SurrealStore` — embedded SurrealDB backend for durable single-node
//! deployments. Runs entirely in-process (the `kv-mem`/`kv-surrealkv`
//! engines); there is no network round trip to an external SurrealDB
//! server.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinel_core::domain::{
    ApprovalRequest, AuditEntry, CircuitState, DecisionRecord, Failure, FailureSignature, HealthCheck, Pattern,
    PersonalityProfile, Snapshot,
};
use sentinel_core::substrate::store::{AuditFilter, ListFilter};
use sentinel_core::substrate::Store;
use sentinel_core::{CoreError, Result};
use surrealdb::engine::local::{Db, Mem, SurrealKv};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::StoreError;

const TABLES: &[&str] = &[
    "failures",
    "decisions",
    "circuits",
    "snapshots",
    "health_checks",
    "approvals",
    "patterns",
    "personalities",
    "audit",
];

/// An embedded SurrealDB handle implementing `sentinel_core::substrate::Store`.
///
/// Every entity table is `SCHEMALESS`: the entities carry enums, nested
/// vectors, and a fixed-size histogram array whose `DEFINE FIELD` shape
/// would just mirror the Rust struct back at it, so records are stored
/// whole (as `oxidized-state`'s `snapshots`/`memories` tables already do
/// for their own opaque payloads) rather than column-mapped.
pub struct SurrealStore {
    db: Surreal<Db>,
}

impl SurrealStore {
    /// Connect to an embedded, in-memory SurrealDB instance and initialize
    /// the schema. Namespace/database are fixed (`sentinel`/`control_loop`)
    /// since this is a single-tenant, single-node embedded deployment.
    #[instrument(skip_all)]
    pub async fn connect_in_memory() -> Result<Self> {
        info!("connecting embedded SurrealDB (in-memory engine)");
        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| CoreError::from(StoreError::from(e)))?;
        db.use_ns("sentinel")
            .use_db("control_loop")
            .await
            .map_err(|e| CoreError::from(StoreError::from(e)))?;
        let store = Self { db };
        store.init_schema().await?;
        Ok(store)
    }

    /// Connect to an on-disk SurrealKV store at `path`, creating it if
    /// absent, and initialize the schema. Unlike [`Self::connect_in_memory`]
    /// this survives a process restart — the mode `SENTINEL_STORE_DSN`
    /// selects when it names a filesystem path rather than `memory`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn connect_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        info!("connecting embedded SurrealDB (surrealkv engine)");
        let address = path.as_ref().to_string_lossy().into_owned();
        let db = Surreal::new::<SurrealKv>(address)
            .await
            .map_err(|e| CoreError::from(StoreError::from(e)))?;
        db.use_ns("sentinel")
            .use_db("control_loop")
            .await
            .map_err(|e| CoreError::from(StoreError::from(e)))?;
        let store = Self { db };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        debug!("initializing schemaless tables");
        for table in TABLES {
            self.db
                .query(format!("DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS;"))
                .await
                .map_err(|e| CoreError::from(StoreError::from(e)))?;
        }
        Ok(())
    }

    async fn upsert<T>(&self, table: &str, id: impl Into<String>, value: &T) -> Result<()>
    where
        T: serde::Serialize + Clone + Send + Sync + 'static,
    {
        let _: Option<T> = self
            .db
            .upsert((table, id.into()))
            .content(value.clone())
            .await
            .map_err(|e| CoreError::from(StoreError::from(e)))?;
        Ok(())
    }

    async fn get<T>(&self, table: &str, id: impl Into<String>) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de> + Send + Sync + 'static,
    {
        self.db
            .select((table, id.into()))
            .await
            .map_err(|e| CoreError::from(StoreError::from(e)))
    }

    async fn all<T>(&self, table: &str) -> Result<Vec<T>>
    where
        T: for<'de> serde::Deserialize<'de> + Send + Sync + 'static,
    {
        self.db
            .select(table)
            .await
            .map_err(|e| CoreError::from(StoreError::from(e)))
    }

    async fn delete<T>(&self, table: &str, id: impl Into<String>) -> Result<()>
    where
        T: for<'de> serde::Deserialize<'de> + Send + Sync + 'static,
    {
        let _: Option<T> = self
            .db
            .delete((table, id.into()))
            .await
            .map_err(|e| CoreError::from(StoreError::from(e)))?;
        Ok(())
    }
}

fn matches_filter(repository: &str, filter: &ListFilter) -> bool {
    filter.repository.as_deref().map_or(true, |r| r == repository)
}

#[async_trait]
impl Store for SurrealStore {
    async fn upsert_failure(&self, failure: &Failure) -> Result<()> {
        self.upsert("failures", failure.failure_id.to_string(), failure).await
    }

    async fn get_failure(&self, failure_id: uuid::Uuid) -> Result<Option<Failure>> {
        self.get("failures", failure_id.to_string()).await
    }

    async fn list_failures(&self, filter: &ListFilter) -> Result<Vec<Failure>> {
        let mut out: Vec<Failure> = self
            .all::<Failure>("failures")
            .await?
            .into_iter()
            .filter(|f| matches_filter(&f.repository, filter))
            .collect();
        out.sort_by_key(|f| f.detected_at);
        if let Some(limit) = filter.limit {
            out.truncate(limit as usize);
        }
        Ok(out)
    }

    async fn upsert_decision(&self, decision: &DecisionRecord) -> Result<()> {
        self.upsert("decisions", decision.decision_id.to_string(), decision).await
    }

    async fn decisions_for_failure(&self, failure_id: uuid::Uuid) -> Result<Vec<DecisionRecord>> {
        Ok(self
            .all::<DecisionRecord>("decisions")
            .await?
            .into_iter()
            .filter(|d| d.failure_id == failure_id)
            .collect())
    }

    async fn recent_decisions(&self, limit: u32) -> Result<Vec<DecisionRecord>> {
        let mut all = self.all::<DecisionRecord>("decisions").await?;
        all.sort_by_key(|d| d.created_at);
        all.reverse();
        all.truncate(limit as usize);
        Ok(all)
    }

    async fn upsert_circuit(&self, state: &CircuitState) -> Result<()> {
        self.upsert("circuits", state.signature.as_str(), state).await
    }

    async fn get_circuit(&self, signature: &FailureSignature) -> Result<Option<CircuitState>> {
        self.get("circuits", signature.as_str()).await
    }

    async fn upsert_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.upsert("snapshots", snapshot.snapshot_id.to_string(), snapshot).await
    }

    async fn get_snapshot(&self, snapshot_id: uuid::Uuid) -> Result<Option<Snapshot>> {
        self.get("snapshots", snapshot_id.to_string()).await
    }

    async fn list_snapshots(&self, filter: &ListFilter) -> Result<Vec<Snapshot>> {
        Ok(self
            .all::<Snapshot>("snapshots")
            .await?
            .into_iter()
            .filter(|s| matches_filter(&s.repository, filter))
            .collect())
    }

    async fn delete_snapshot(&self, snapshot_id: uuid::Uuid) -> Result<()> {
        self.delete::<Snapshot>("snapshots", snapshot_id.to_string()).await
    }

    async fn upsert_health_check(&self, check: &HealthCheck) -> Result<()> {
        self.upsert("health_checks", check.check_id.to_string(), check).await
    }

    async fn get_health_check(&self, check_id: uuid::Uuid) -> Result<Option<HealthCheck>> {
        self.get("health_checks", check_id.to_string()).await
    }

    async fn pending_health_checks(&self, before: DateTime<Utc>) -> Result<Vec<HealthCheck>> {
        Ok(self
            .all::<HealthCheck>("health_checks")
            .await?
            .into_iter()
            .filter(|c| c.executed_at.is_none() && c.scheduled_at <= before)
            .collect())
    }

    async fn upsert_approval(&self, approval: &ApprovalRequest) -> Result<()> {
        self.upsert("approvals", approval.request_id.to_string(), approval).await
    }

    async fn get_approval(&self, request_id: uuid::Uuid) -> Result<Option<ApprovalRequest>> {
        self.get("approvals", request_id.to_string()).await
    }

    async fn pending_approvals(&self, filter: &ListFilter) -> Result<Vec<ApprovalRequest>> {
        Ok(self
            .all::<ApprovalRequest>("approvals")
            .await?
            .into_iter()
            .filter(|a| matches_filter(&a.repository, filter))
            .collect())
    }

    async fn upsert_pattern(&self, pattern: &Pattern) -> Result<()> {
        self.upsert("patterns", pattern.pattern_id.to_string(), pattern).await
    }

    async fn list_patterns(&self, filter: &ListFilter) -> Result<Vec<Pattern>> {
        Ok(self
            .all::<Pattern>("patterns")
            .await?
            .into_iter()
            .filter(|p| matches_filter(&p.repository, filter))
            .collect())
    }

    async fn upsert_personality(&self, profile: &PersonalityProfile) -> Result<()> {
        self.upsert("personalities", profile.repository.clone(), profile).await
    }

    async fn get_personality(&self, repository: &str) -> Result<Option<PersonalityProfile>> {
        self.get("personalities", repository.to_string()).await
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
        self.upsert("audit", entry.entry_id.to_string(), entry).await
    }

    async fn query_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let mut out: Vec<AuditEntry> = self
            .all::<AuditEntry>("audit")
            .await?
            .into_iter()
            .filter(|entry| filter.failure_id.map_or(true, |id| entry.failure_id == Some(id)))
            .filter(|entry| filter.since.map_or(true, |since| entry.timestamp >= since))
            .collect();
        out.sort_by_key(|e| e.timestamp);
        if let Some(limit) = filter.limit {
            out.truncate(limit as usize);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::domain::DecisionKind;

    #[tokio::test]
    async fn upsert_failure_then_get_round_trips() {
        let store = SurrealStore::connect_in_memory().await.unwrap();
        let failure = Failure::new(
            "acme/widgets",
            "main",
            "build",
            "run-1",
            "abc123",
            "log tail",
            "npm ci failed",
            Utc::now(),
        );
        store.upsert_failure(&failure).await.unwrap();
        let loaded = store.get_failure(failure.failure_id).await.unwrap();
        assert_eq!(loaded.unwrap().workflow_run_id, "run-1");
    }

    #[tokio::test]
    async fn upsert_circuit_is_idempotent_by_signature() {
        let store = SurrealStore::connect_in_memory().await.unwrap();
        let sig = FailureSignature::new("acme/widgets", "main", "npm install timeout");
        let mut state = CircuitState::new(sig.clone());
        store.upsert_circuit(&state).await.unwrap();
        state.failure_count = 1;
        store.upsert_circuit(&state).await.unwrap();

        let loaded = store.get_circuit(&sig).await.unwrap().unwrap();
        assert_eq!(loaded.failure_count, 1);
    }

    #[tokio::test]
    async fn decisions_for_failure_filters_other_failures() {
        let store = SurrealStore::connect_in_memory().await.unwrap();
        let failure_id = uuid::Uuid::new_v4();
        store
            .upsert_decision(&DecisionRecord::new(
                failure_id,
                DecisionKind::Classification,
                "devops",
                vec![],
                "digest",
                70,
                Utc::now(),
            ))
            .await
            .unwrap();
        store
            .upsert_decision(&DecisionRecord::new(
                uuid::Uuid::new_v4(),
                DecisionKind::Classification,
                "developer",
                vec![],
                "digest",
                70,
                Utc::now(),
            ))
            .await
            .unwrap();

        let decisions = store.decisions_for_failure(failure_id).await.unwrap();
        assert_eq!(decisions.len(), 1);
    }
}
