//! Storage and transport adapters implementing the domain ports.

pub mod http;
pub mod in_memory;
pub mod json_file;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod session;
