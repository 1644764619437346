//! Client code for offgrid.
//!
//! This crate provides the request path (transport, classification, strategy
//! selection and execution, fallback content), the install/activate lifecycle
//! and the event bridge, all shared by the worker binary.

pub mod classify;
pub mod events;
pub mod fallback;
pub mod fetch;
pub mod lifecycle;
pub mod router;
pub mod select;
pub mod strategy;
pub mod tasks;

#[cfg(test)]
mod test_utils;

pub use classify::{ClassificationRule, Classifier};
pub use events::{
    ChannelHub, ClientHub, ClientId, ClientMessage, EventBridge, LogNotifier, Notification, NotificationAction,
    Notifier,
};
pub use fallback::FallbackProvider;
pub use fetch::{FetchClient, FetchConfig, Network};
pub use lifecycle::{
    ActivationReport, InstallReport, LifecycleConfig, LifecycleController, LifecycleState, PrecacheFailure,
};
pub use router::{Router, Served};
pub use select::StrategyTable;
pub use strategy::{Outcome, StrategyExecutor};
pub use tasks::BackgroundTasks;
