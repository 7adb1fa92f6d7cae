//! Caching stores for credentials and provider catalogs.
//!
//! Both stores answer snapshot reads from memory without touching the network, coalesce
//! concurrent fetches of the same key onto one remote call, and notify subscribers after every
//! change. Writes and their notifications are serialized through one async writer gate per store,
//! so observers see changes in the order they were applied.

pub mod catalog;
pub mod credential;

pub use catalog::{ProviderCatalogStore, ProviderQuery};
pub use credential::CredentialStore;
