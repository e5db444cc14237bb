//! Best-effort activity log.
//!
//! Every recorded action is an audit convenience, not business data: a sink
//! failure is logged and swallowed so it can never abort the operation that
//! produced the entry.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

use crate::storage::ActivitySink;
use shared::ActivityEntry;

#[derive(Clone)]
pub struct ActivityService {
    sink: Arc<dyn ActivitySink>,
}

impl ActivityService {
    pub fn new(sink: Arc<dyn ActivitySink>) -> Self {
        Self { sink }
    }

    /// Append one entry. Infallible from the caller's perspective.
    pub async fn record(&self, user_id: &str, family_id: &str, action_type: &str, description: &str) {
        let entry = ActivityEntry {
            id: shared::new_record_id(),
            user_id: user_id.to_string(),
            family_id: family_id.to_string(),
            action_type: action_type.to_string(),
            description: description.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        if let Err(e) = self.sink.append(&entry).await {
            warn!("failed to record activity '{}': {:?}", action_type, e);
        }
    }

    /// Recent entries for one family, newest first.
    pub async fn list(&self, family_id: &str, limit: u32) -> Result<Vec<ActivityEntry>> {
        self.sink.list_by_family(family_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use crate::storage::{DbConnection, SqliteActivitySink};

    /// Sink that always fails, to prove recording never propagates errors.
    struct BrokenSink;

    #[async_trait]
    impl ActivitySink for BrokenSink {
        async fn append(&self, _entry: &ActivityEntry) -> Result<()> {
            Err(anyhow!("sink unavailable"))
        }

        async fn list_by_family(&self, _family_id: &str, _limit: u32) -> Result<Vec<ActivityEntry>> {
            Err(anyhow!("sink unavailable"))
        }
    }

    #[tokio::test]
    async fn record_survives_a_broken_sink() {
        let service = ActivityService::new(Arc::new(BrokenSink));
        // must not panic or error
        service
            .record("user-1", "fam-1", "add_income", "Receita adicionada")
            .await;
    }

    #[tokio::test]
    async fn record_and_list_round_trip() {
        let db = DbConnection::init_test().await.unwrap();
        let service = ActivityService::new(Arc::new(SqliteActivitySink::new(db)));

        service
            .record("user-1", "fam-1", "join_family", "Ingressou na família")
            .await;

        let entries = service.list("fam-1", 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action_type, "join_family");
        assert_eq!(entries[0].description, "Ingressou na família");
        assert!(!entries[0].id.is_empty());
    }
}
