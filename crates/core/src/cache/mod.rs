//! SQLite-backed versioned cache namespaces.
//!
//! This module provides persistent response storage using SQLite with async
//! access via tokio-rusqlite. It supports:
//!
//! - Named, versioned namespaces (`{logical}-{version}`) as the unit of garbage collection
//! - Content-addressed entry keys using SHA-256 over method and URL
//! - Atomic whole-snapshot writes
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod manager;
pub mod migrations;
pub mod namespaces;

pub use crate::Error;

pub use connection::CacheDb;
pub use manager::NamespaceManager;
pub use namespaces::{Namespace, NamespaceRecord, physical_name};
