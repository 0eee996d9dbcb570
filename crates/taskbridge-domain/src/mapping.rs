use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identifiers::{ReconciliationKey, TaskId};
use crate::items::{ItemCategory, RemoteItem};

/// Persisted link between a remote item and the task created for it.
///
/// `category`, `title` and `url` are a snapshot taken when the task was
/// created and are never refreshed from later fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMapping {
    pub key: ReconciliationKey,
    pub task_id: TaskId,
    pub category: ItemCategory,
    pub title: String,
    pub url: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl TaskMapping {
    pub fn for_item(item: &RemoteItem, task_id: TaskId, created_at: impl Into<String>) -> Self {
        Self {
            key: ReconciliationKey::for_item(item),
            task_id,
            category: item.category,
            title: item.title.clone(),
            url: item.url.clone(),
            created_at: created_at.into(),
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingTable {
    #[serde(default)]
    pub mappings: BTreeMap<ReconciliationKey, TaskMapping>,
    #[serde(default)]
    pub last_sync_at: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl MappingTable {
    pub fn mappings_in(&self, category: ItemCategory) -> Vec<&TaskMapping> {
        self.mappings
            .values()
            .filter(|mapping| mapping.category == category)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileResult {
    pub created: usize,
    pub completed: usize,
    pub unchanged: usize,
    pub errors: Vec<String>,
}

impl ReconcileResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
