//! Berth Core Library
//!
//! Converges a container runtime toward a Compose descriptor: descriptor
//! model, resource identity, runtime seam, and the reconciliation engine.

pub mod compose;
pub mod config;
pub mod error;
pub mod observability;
pub mod paths;
pub mod reconcile;
pub mod runtime;
pub mod types;
pub mod units;

// Re-export commonly used items
pub use config::Config;
pub use error::{BerthError, Result};
pub use observability::init as init_observability;
pub use reconcile::{ConvergeReport, Plan, ProgressEvent, ProgressReporter, Reconciler, TeardownReport};
pub use runtime::{ContainerRuntime, DockerRuntime};
pub use types::{Fingerprint, Project, ResourceKind};
