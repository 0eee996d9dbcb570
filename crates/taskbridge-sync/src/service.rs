use std::sync::Arc;

use taskbridge_domain::{
    CoreError, ItemQuery, MappingStore, ReconcileResult, RemoteItemSource, TaskSink,
};
use tracing::{debug, warn};

use crate::reconciler::Reconciler;

/// Fetch, reconcile and record the outcome. Shared by the daemon loop and the
/// one-shot `sync` command.
pub struct SyncService {
    source: Arc<dyn RemoteItemSource>,
    store: Arc<dyn MappingStore>,
    reconciler: Reconciler,
    query: ItemQuery,
}

impl SyncService {
    pub fn new(
        source: Arc<dyn RemoteItemSource>,
        sink: Arc<dyn TaskSink>,
        store: Arc<dyn MappingStore>,
        query: ItemQuery,
    ) -> Self {
        Self {
            source,
            reconciler: Reconciler::new(sink, Arc::clone(&store)),
            store,
            query,
        }
    }

    pub fn query(&self) -> &ItemQuery {
        &self.query
    }

    /// A fetch failure leaves every mapping and `last_sync_at` untouched and
    /// records `last_error`. Item failures are returned in the result.
    pub async fn sync_once(&self) -> Result<ReconcileResult, CoreError> {
        let items = match self.source.fetch_open_items(&self.query).await {
            Ok(items) => items,
            Err(error) => {
                let message = format!("Sync failed: {error}");
                if let Err(mark_error) = self.store.mark_sync_failure(&message) {
                    warn!(error = %mark_error, "failed to record sync failure");
                }
                return Err(error);
            }
        };
        debug!(open_items = items.len(), "fetched open items");

        let result = self.reconciler.reconcile(&items).await;
        self.store.mark_sync_success()?;
        Ok(result)
    }
}
