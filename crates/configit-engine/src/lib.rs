//! Deployment and deletion engine for configit.
//!
//! Builds a dependency graph per environment, orders it into waves and
//! applies configs wave by wave. Deletions bypass the graph.

pub mod cancel;
pub mod delete;
pub mod deploy;
pub mod error;
pub mod graph;
pub mod sort;

pub use cancel::CancellationFlag;
pub use delete::{DeleteOptions, DeleteOutcome, DeleteReport, DeleteResult, Deleter};
pub use deploy::{
    ConfigState, DEFAULT_CONCURRENCY, DeployOptions, DeployReport, Deployer, EnvironmentResult,
    SkipReason,
};
pub use error::{DeployError, GraphError};
pub use graph::DependencyGraph;
pub use sort::{Wave, sort_waves};
