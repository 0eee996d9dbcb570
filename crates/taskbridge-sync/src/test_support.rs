use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use taskbridge_domain::{
    CoreError, ItemCategory, ItemId, ItemQuery, ItemState, MappingStore, MappingTable,
    ReconciliationKey, RemoteItem, RemoteItemSource, TaskId, TaskMapping, TaskSink,
};
use taskbridge_store::InMemoryMappingStore;

pub(crate) fn item(id: &str, category: ItemCategory, title: &str) -> RemoteItem {
    RemoteItem {
        id: ItemId::new(id),
        category,
        title: title.to_owned(),
        url: format!("https://github.com/octo/repo/issues/{id}"),
        repo: "octo/repo".to_owned(),
        number: 1,
        state: ItemState::Open,
        created_at: String::new(),
        updated_at: String::new(),
    }
}

/// Task sink that hands out sequential ids and fails on request.
#[derive(Default)]
pub(crate) struct ScriptedSink {
    next_id: AtomicUsize,
    created: Mutex<Vec<String>>,
    completed: Mutex<Vec<TaskId>>,
    fail_create: Mutex<HashSet<String>>,
    fail_complete: Mutex<HashSet<String>>,
    create_delay: Mutex<Option<Duration>>,
}

impl ScriptedSink {
    /// Makes every `create_task` sleep on the tokio clock before answering.
    pub(crate) fn delay_creates(&self, delay: Duration) {
        *self.create_delay.lock().expect("lock") = Some(delay);
    }

    pub(crate) fn fail_create_for(&self, item_id: &str) {
        self.fail_create
            .lock()
            .expect("lock")
            .insert(item_id.to_owned());
    }

    pub(crate) fn fail_complete_for(&self, task_id: &str) {
        self.fail_complete
            .lock()
            .expect("lock")
            .insert(task_id.to_owned());
    }

    pub(crate) fn clear_failures(&self) {
        self.fail_create.lock().expect("lock").clear();
        self.fail_complete.lock().expect("lock").clear();
    }

    pub(crate) fn created_titles(&self) -> Vec<String> {
        self.created.lock().expect("lock").clone()
    }

    pub(crate) fn completed_ids(&self) -> Vec<TaskId> {
        self.completed.lock().expect("lock").clone()
    }
}

#[async_trait]
impl TaskSink for ScriptedSink {
    async fn create_task(&self, item: &RemoteItem) -> Result<TaskId, CoreError> {
        let delay = *self.create_delay.lock().expect("lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_create.lock().expect("lock").contains(item.id.as_str()) {
            return Err(CoreError::DependencyUnavailable("things offline".to_owned()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.created.lock().expect("lock").push(item.title.clone());
        Ok(TaskId::new(format!("task-{id}")))
    }

    async fn complete_task(&self, task_id: &TaskId) -> Result<(), CoreError> {
        if self
            .fail_complete
            .lock()
            .expect("lock")
            .contains(task_id.as_str())
        {
            return Err(CoreError::DependencyUnavailable("things offline".to_owned()));
        }
        self.completed.lock().expect("lock").push(task_id.clone());
        Ok(())
    }
}

/// Item source returning a replaceable list, or an error when armed.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    items: Mutex<Vec<RemoteItem>>,
    failure: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) fn set_items(&self, items: Vec<RemoteItem>) {
        *self.items.lock().expect("lock") = items;
    }

    pub(crate) fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock().expect("lock") = message.map(ToOwned::to_owned);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteItemSource for ScriptedSource {
    async fn fetch_open_items(&self, _query: &ItemQuery) -> Result<Vec<RemoteItem>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failure.lock().expect("lock").clone() {
            return Err(CoreError::DependencyUnavailable(message));
        }
        Ok(self.items.lock().expect("lock").clone())
    }
}

/// In-memory store whose writes can be made to fail.
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: InMemoryMappingStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), CoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::Persistence("disk full".to_owned()));
        }
        Ok(())
    }
}

impl MappingStore for FlakyStore {
    fn snapshot(&self) -> MappingTable {
        self.inner.snapshot()
    }

    fn upsert(&self, mapping: TaskMapping) -> Result<(), CoreError> {
        self.check()?;
        self.inner.upsert(mapping)
    }

    fn remove(&self, key: &ReconciliationKey) -> Result<(), CoreError> {
        self.check()?;
        self.inner.remove(key)
    }

    fn mark_sync_success(&self) -> Result<(), CoreError> {
        self.check()?;
        self.inner.mark_sync_success()
    }

    fn mark_sync_failure(&self, message: &str) -> Result<(), CoreError> {
        self.check()?;
        self.inner.mark_sync_failure(message)
    }
}
