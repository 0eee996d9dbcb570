use std::collections::HashSet;
use std::sync::Arc;

use taskbridge_domain::{
    now_timestamp, MappingStore, ReconcileResult, ReconciliationKey, RemoteItem, TaskMapping,
    TaskSink,
};
use tracing::{debug, info, warn};

/// One reconciliation pass: create tasks for untracked open items, then
/// complete tasks whose items are no longer open.
///
/// Item-level failures are collected into the result and never abort the
/// pass. Each mapping change is written through to the store as soon as the
/// sink call that justifies it succeeds.
pub struct Reconciler {
    sink: Arc<dyn TaskSink>,
    store: Arc<dyn MappingStore>,
}

impl Reconciler {
    pub fn new(sink: Arc<dyn TaskSink>, store: Arc<dyn MappingStore>) -> Self {
        Self { sink, store }
    }

    pub async fn reconcile(&self, open_items: &[RemoteItem]) -> ReconcileResult {
        let mut result = ReconcileResult::default();
        let open_keys = open_items
            .iter()
            .map(ReconciliationKey::for_item)
            .collect::<HashSet<_>>();

        for item in open_items {
            self.ensure_task(item, &mut result).await;
        }

        // Reloaded so mappings written by the creation pass are visible.
        for mapping in self.store.mappings() {
            if open_keys.contains(&mapping.key) {
                continue;
            }
            self.complete_task(mapping, &mut result).await;
        }

        result
    }

    async fn ensure_task(&self, item: &RemoteItem, result: &mut ReconcileResult) {
        let key = ReconciliationKey::for_item(item);
        if self.store.has(&key) {
            debug!(key = %key, title = %item.title, "item already tracked");
            result.unchanged += 1;
            return;
        }

        let task_id = match self.sink.create_task(item).await {
            Ok(task_id) => task_id,
            Err(error) => {
                warn!(key = %key, title = %item.title, error = %error, "task creation failed");
                result
                    .errors
                    .push(format!("Failed to create task for {}: {error}", item.title));
                return;
            }
        };

        let mapping = TaskMapping::for_item(item, task_id.clone(), now_timestamp());
        match self.store.upsert(mapping) {
            Ok(()) => {
                info!(key = %key, task_id = %task_id, title = %item.title, "created task");
                result.created += 1;
            }
            Err(error) => {
                warn!(
                    key = %key,
                    task_id = %task_id,
                    title = %item.title,
                    error = %error,
                    "task created but mapping was not recorded"
                );
                result.errors.push(format!(
                    "Created task for {} but failed to record mapping: {error}",
                    item.title
                ));
            }
        }
    }

    async fn complete_task(&self, mapping: TaskMapping, result: &mut ReconcileResult) {
        if let Err(error) = self.sink.complete_task(&mapping.task_id).await {
            warn!(
                key = %mapping.key,
                task_id = %mapping.task_id,
                title = %mapping.title,
                error = %error,
                "task completion failed"
            );
            result
                .errors
                .push(format!("Failed to complete task {}: {error}", mapping.title));
            return;
        }

        match self.store.remove(&mapping.key) {
            Ok(()) => {
                info!(
                    key = %mapping.key,
                    task_id = %mapping.task_id,
                    title = %mapping.title,
                    "completed task"
                );
                result.completed += 1;
            }
            Err(error) => {
                warn!(
                    key = %mapping.key,
                    task_id = %mapping.task_id,
                    title = %mapping.title,
                    error = %error,
                    "task completed but mapping was not removed"
                );
                result.errors.push(format!(
                    "Completed task {} but failed to remove mapping: {error}",
                    mapping.title
                ));
            }
        }
    }
}
