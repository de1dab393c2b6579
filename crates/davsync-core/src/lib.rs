//! davsync Core - Domain types and rules shared by every davsync crate
//!
//! This crate contains:
//! - **Domain values** - [`Resource`](domain::Resource), one file or directory entry
//! - **Store port** - the [`FileStore`](ports::FileStore) capability trait that the
//!   local-disk and WebDAV backends implement
//! - **Exclusion rules** - the merged global/local pattern set and size ceiling
//! - **Configuration** - the YAML configuration file and its validation
//!
//! # Architecture
//!
//! Like a hexagonal core, nothing here performs I/O against a concrete
//! backend. The sync engine and the binaries depend on the port trait and
//! receive concrete stores through their constructors.

pub mod config;
pub mod domain;
pub mod filter;
pub mod ports;
