//! Audit persistence.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::audit::context::Actor;
use crate::audit::record::AuditRecord;
use crate::audit::AuditError;
use crate::config::AuditConfig;
use crate::store::DataStore;

/// Bulk writer for flushed audit batches.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist `records` on behalf of `actor`, scoped to its organization.
    async fn write_batch(&self, actor: &Actor, records: &[AuditRecord]) -> Result<(), AuditError>;
}

/// Writes audit batches as rows of a table in the data store.
pub struct StoreAuditWriter {
    store: Arc<dyn DataStore>,
    table: String,
    organization_column: String,
}

impl StoreAuditWriter {
    pub fn new(store: Arc<dyn DataStore>, config: &AuditConfig) -> Self {
        Self {
            store,
            table: config.table.clone(),
            organization_column: config.organization_column.clone(),
        }
    }

    /// Row written for one record.
    pub fn row(&self, actor: &Actor, record: &AuditRecord) -> Result<Value, AuditError> {
        let mut row = serde_json::to_value(record)
            .map_err(|e| AuditError::Persistence(format!("encode audit record: {}", e)))?;
        if let Some(fields) = row.as_object_mut() {
            fields.insert("actor_id".to_string(), Value::String(actor.id.clone()));
            fields.insert(
                self.organization_column.clone(),
                Value::String(actor.organization_id.clone()),
            );
        }
        Ok(row)
    }
}

#[async_trait]
impl AuditStore for StoreAuditWriter {
    async fn write_batch(&self, actor: &Actor, records: &[AuditRecord]) -> Result<(), AuditError> {
        let rows = records
            .iter()
            .map(|r| self.row(actor, r))
            .collect::<Result<Vec<_>, _>>()?;

        self.store
            .insert(&self.table, &Value::Array(rows))
            .await
            .map(|_| ())
            .map_err(|e| AuditError::Persistence(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, QueryOptions};

    #[tokio::test]
    async fn test_rows_carry_actor_and_organization() {
        let store = Arc::new(MemoryStore::new());
        let writer = StoreAuditWriter::new(store.clone(), &AuditConfig::default());
        let actor = Actor {
            id: "u-1".to_string(),
            organization_id: "C1".to_string(),
        };

        let records = vec![
            AuditRecord::new("data_select", "select on courses", "gateway"),
            AuditRecord::new("data_insert", "insert on courses", "gateway"),
        ];
        writer.write_batch(&actor, &records).await.unwrap();

        let rows = store
            .select("audit_logs", &QueryOptions::new().filter("college_id", "C1"))
            .await
            .unwrap();
        assert_eq!(rows.as_array().map(Vec::len), Some(2));
        assert_eq!(rows[0]["actor_id"], "u-1");
        assert_eq!(rows[1]["action_type"], "data_insert");
    }
}
