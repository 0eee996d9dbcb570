//! Durable mapping table implementations.

mod json_file;
mod memory;

pub use json_file::JsonFileMappingStore;
pub use memory::InMemoryMappingStore;
