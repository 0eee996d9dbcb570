//! Reconciliation of open GitHub items against tracked Things tasks.

mod daemon;
mod reconciler;
mod service;

pub use daemon::{DaemonHandle, SyncDaemon};
pub use reconciler::Reconciler;
pub use service::SyncService;

#[cfg(test)]
mod test_support;
