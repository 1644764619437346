//! Core types and shared functionality for offgrid.
//!
//! This crate provides:
//! - Versioned cache namespaces with SQLite backend
//! - Request, response and routing model
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod model;

pub use cache::{CacheDb, Namespace, NamespaceManager, NamespaceRecord};
pub use config::{AppConfig, ConfigError, PrecachePolicy};
pub use error::Error;
pub use model::{
    CacheEntry, Destination, InterceptedRequest, Method, RequestMode, ResourceCategory, Response, ResponseSource,
    Route, Strategy,
};
