//! Shared data model and collaborator contracts for the GitHub to Things sync engine.

pub mod clock;
pub mod error;
pub mod identifiers;
pub mod interface;
pub mod items;
pub mod mapping;

pub use clock::{format_timestamp, now_timestamp, parse_timestamp};
pub use error::CoreError;
pub use identifiers::{ItemId, ReconciliationKey, TaskId};
pub use interface::{MappingStore, RemoteItemSource, TaskSink};
pub use items::{
    ItemBucket, ItemCategory, ItemQuery, ItemState, RemoteItem, RepoFilter, RepoFilterMode,
    SyncType, ALL_SYNC_TYPES, DEFAULT_FETCH_LIMIT, DEFAULT_USERNAME_SCOPE,
};
pub use mapping::{MappingTable, ReconcileResult, TaskMapping};
