use async_trait::async_trait;

use crate::error::CoreError;
use crate::identifiers::{ReconciliationKey, TaskId};
use crate::items::{ItemQuery, RemoteItem};
use crate::mapping::{MappingTable, TaskMapping};

/// Source of currently open items. Absence of a previously seen item is the
/// only closure signal.
#[async_trait]
pub trait RemoteItemSource: Send + Sync {
    async fn fetch_open_items(&self, query: &ItemQuery) -> Result<Vec<RemoteItem>, CoreError>;
}

#[async_trait]
pub trait TaskSink: Send + Sync {
    async fn create_task(&self, item: &RemoteItem) -> Result<TaskId, CoreError>;
    async fn complete_task(&self, task_id: &TaskId) -> Result<(), CoreError>;
}

/// Durable key/value table of reconciliation key to task mapping.
///
/// Reads never fail: an unreadable table is treated as empty. Every mutating
/// call is a complete read-modify-write of the persisted table.
pub trait MappingStore: Send + Sync {
    fn snapshot(&self) -> MappingTable;

    fn mappings(&self) -> Vec<TaskMapping> {
        self.snapshot().mappings.into_values().collect()
    }

    fn has(&self, key: &ReconciliationKey) -> bool {
        self.snapshot().mappings.contains_key(key)
    }

    fn get(&self, key: &ReconciliationKey) -> Option<TaskMapping> {
        self.snapshot().mappings.remove(key)
    }

    fn upsert(&self, mapping: TaskMapping) -> Result<(), CoreError>;
    fn remove(&self, key: &ReconciliationKey) -> Result<(), CoreError>;
    fn mark_sync_success(&self) -> Result<(), CoreError>;
    fn mark_sync_failure(&self, message: &str) -> Result<(), CoreError>;
}
