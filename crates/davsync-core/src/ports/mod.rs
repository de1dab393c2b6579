//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync engine depends on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`FileStore`] - Tree operations over one storage backend (local disk, WebDAV)

pub mod file_store;

pub use file_store::{byte_stream, read_to_end, ByteStream, FileStore, Listing, StoreError};
