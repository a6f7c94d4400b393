pub mod auth;
pub mod cli;
pub mod collection;
pub mod config;
pub mod database;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod notify;
pub mod permission;
pub mod registry;
pub mod session;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use collection::{Collection, CollectionSnapshot};
pub use database::{DocumentStore, MemoryStore, Partial, Record};
pub use error::{DataError, DataResult};
pub use fetch::Fetcher;
pub use filter::Constraint;
pub use notify::{NotificationKind, Notifier};
pub use permission::{Authorization, PermissionGate, PermissionState};
pub use session::Session;
pub use types::{Action, Operation};
