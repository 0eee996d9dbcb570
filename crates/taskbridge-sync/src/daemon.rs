use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use taskbridge_domain::CoreError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::service::SyncService;

/// Periodic sync loop.
///
/// Runs once immediately, then waits `poll_interval` after each run finishes
/// before starting the next, so runs never overlap. A failed run is logged
/// and the loop carries on.
pub struct SyncDaemon {
    service: Arc<SyncService>,
    poll_interval: Duration,
}

#[derive(Debug)]
pub struct DaemonHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SyncDaemon {
    pub fn new(service: Arc<SyncService>, poll_interval: Duration) -> Self {
        Self {
            service,
            poll_interval,
        }
    }

    /// Runs until `shutdown` resolves. A run in flight at that moment is
    /// dropped, not awaited.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "sync daemon started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.run_once() => {}
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("sync daemon stopped");
    }

    pub fn spawn(self) -> DaemonHandle {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            self.run_until(async move {
                let _ = stop_rx.await;
            })
            .await;
        });

        DaemonHandle {
            stop_tx: Some(stop_tx),
            task,
        }
    }

    async fn run_once(&self) {
        info!("starting sync");
        match self.service.sync_once().await {
            Ok(result) => info!(
                created = result.created,
                completed = result.completed,
                unchanged = result.unchanged,
                errors = result.errors.len(),
                "sync complete"
            ),
            Err(error) => warn!(error = %error, "sync failed"),
        }
    }
}

impl DaemonHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn stop(mut self) -> Result<(), CoreError> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        self.task.await.map_err(|error| {
            CoreError::DependencyUnavailable(format!("sync daemon task join failed: {error}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{item, ScriptedSink, ScriptedSource};
    use taskbridge_domain::{ItemCategory, ItemQuery, MappingStore};
    use taskbridge_store::InMemoryMappingStore;

    const INTERVAL: Duration = Duration::from_secs(300);

    fn daemon(
        source: &Arc<ScriptedSource>,
        store: &Arc<InMemoryMappingStore>,
    ) -> SyncDaemon {
        let service = SyncService::new(
            source.clone(),
            Arc::new(ScriptedSink::default()),
            store.clone(),
            ItemQuery::default(),
        );
        SyncDaemon::new(Arc::new(service), INTERVAL)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_run_is_immediate_and_next_waits_for_interval() {
        let source = Arc::new(ScriptedSource::default());
        let store = Arc::new(InMemoryMappingStore::new());
        let handle = daemon(&source, &store).spawn();

        settle().await;
        assert_eq!(source.calls(), 1);

        tokio::time::advance(INTERVAL - Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(source.calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(source.calls(), 2);

        handle.stop().await.expect("stop daemon");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_is_recorded_and_loop_continues() {
        let source = Arc::new(ScriptedSource::default());
        source.fail_with(Some("rate limited"));
        let store = Arc::new(InMemoryMappingStore::new());
        let handle = daemon(&source, &store).spawn();

        settle().await;
        assert!(store
            .snapshot()
            .last_error
            .as_deref()
            .is_some_and(|error| error.starts_with("Sync failed: ")));

        source.fail_with(None);
        source.set_items(vec![item("A", ItemCategory::PrReview, "Back online")]);
        tokio::time::advance(INTERVAL).await;
        settle().await;

        assert_eq!(source.calls(), 2);
        let table = store.snapshot();
        assert_eq!(table.last_error, None);
        assert_eq!(table.mappings.len(), 1);

        handle.stop().await.expect("stop daemon");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_loop_while_sleeping() {
        let source = Arc::new(ScriptedSource::default());
        let store = Arc::new(InMemoryMappingStore::new());
        let handle = daemon(&source, &store).spawn();
        settle().await;

        assert!(!handle.is_finished());
        handle.stop().await.expect("stop daemon");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_abandons_run_in_flight() {
        let source = Arc::new(ScriptedSource::default());
        source.set_items(
            (0..8)
                .map(|index| item(&format!("I{index}"), ItemCategory::IssueAssigned, "Slow"))
                .collect(),
        );
        let sink = Arc::new(ScriptedSink::default());
        sink.delay_creates(Duration::from_millis(500));
        let store = Arc::new(InMemoryMappingStore::new());
        let service = SyncService::new(
            source.clone(),
            sink.clone(),
            store.clone(),
            ItemQuery::default(),
        );
        let handle = SyncDaemon::new(Arc::new(service), INTERVAL).spawn();

        tokio::time::advance(Duration::from_millis(200)).await;
        settle().await;
        let started = tokio::time::Instant::now();
        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop should not wait for the pass to finish")
            .expect("stop daemon");

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(source.calls(), 1);
        assert!(sink.created_titles().is_empty());
        let table = store.snapshot();
        assert!(table.mappings.is_empty());
        assert_eq!(table.last_sync_at, None);
    }

    #[tokio::test]
    async fn run_until_returns_when_shutdown_already_resolved() {
        let source = Arc::new(ScriptedSource::default());
        let store = Arc::new(InMemoryMappingStore::new());

        daemon(&source, &store).run_until(async {}).await;

        assert!(source.calls() <= 1);
    }
}
