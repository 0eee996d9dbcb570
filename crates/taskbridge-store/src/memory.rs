use std::sync::{Mutex, MutexGuard};

use taskbridge_domain::{
    now_timestamp, CoreError, MappingStore, MappingTable, ReconciliationKey, TaskMapping,
};

/// Process-local mapping table. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    table: Mutex<MappingTable>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MappingTable> {
        self.table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MappingStore for InMemoryMappingStore {
    fn snapshot(&self) -> MappingTable {
        self.lock().clone()
    }

    fn has(&self, key: &ReconciliationKey) -> bool {
        self.lock().mappings.contains_key(key)
    }

    fn get(&self, key: &ReconciliationKey) -> Option<TaskMapping> {
        self.lock().mappings.get(key).cloned()
    }

    fn upsert(&self, mapping: TaskMapping) -> Result<(), CoreError> {
        self.lock().mappings.insert(mapping.key.clone(), mapping);
        Ok(())
    }

    fn remove(&self, key: &ReconciliationKey) -> Result<(), CoreError> {
        self.lock().mappings.remove(key);
        Ok(())
    }

    fn mark_sync_success(&self) -> Result<(), CoreError> {
        let mut table = self.lock();
        table.last_sync_at = Some(now_timestamp());
        table.last_error = None;
        Ok(())
    }

    fn mark_sync_failure(&self, message: &str) -> Result<(), CoreError> {
        self.lock().last_error = Some(message.to_owned());
        Ok(())
    }
}
