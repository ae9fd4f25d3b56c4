//! Platform client implementations for configit.
//!
//! Provides:
//! - An in-memory platform (dry runs, local validation and tests)

pub mod memory;

pub use configit_core::client::{ApiClient, ClientSet, Payload, RemoteObject};
pub use memory::{InMemoryClient, StoredObject};
