//! Core domain types and traits for configit.
//!
//! This crate contains:
//! - Coordinates and references between configuration objects
//! - Parameters and their resolution
//! - Configs, config types and projects
//! - Template rendering
//! - Delete entries
//! - The per-run resolution context
//! - The platform client trait

pub mod client;
pub mod config;
pub mod context;
pub mod coordinate;
pub mod delete;
pub mod error;
pub mod id;
pub mod parameter;
pub mod project;
pub mod template;

pub use client::{ApiClient, ClientSet, Payload, RemoteObject};
pub use config::{Config, ConfigKind, ConfigType};
pub use context::{ResolutionContext, ResolvedEntity};
pub use coordinate::{Coordinate, Reference};
pub use delete::DeleteEntry;
pub use error::{Error, Result};
pub use id::RunId;
pub use parameter::{Parameter, ParameterError};
pub use project::{ConfigSet, ConfigsPerType, Project};
pub use template::Template;
