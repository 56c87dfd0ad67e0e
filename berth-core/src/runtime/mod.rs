//! Container runtime abstraction.
//!
//! The reconciliation engine talks to the runtime only through the
//! `ContainerRuntime` trait. Not-found is reported as `Ok(None)` by the
//! inspect calls and as [`BerthError::NotFound`](crate::error::BerthError::NotFound)
//! everywhere else; an unreachable runtime is `Connectivity`.

use crate::error::Result;
use crate::types::{
    ContainerSpec, ContainerSummary, EndpointSpec, LabelFilter, NetworkSpec, NetworkSummary,
    VolumeSpec, VolumeSummary,
};
use async_trait::async_trait;

pub mod docker;

pub use docker::DockerRuntime;

/// Container runtime trait.
///
/// Methods are instrumented by implementations (not here) to maintain observability.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check that the runtime is reachable.
    async fn ping(&self) -> Result<()>;

    /// List containers (running and stopped) carrying every label in `filter`.
    async fn list_containers(&self, filter: &LabelFilter) -> Result<Vec<ContainerSummary>>;

    /// List networks carrying every label in `filter`.
    async fn list_networks(&self, filter: &LabelFilter) -> Result<Vec<NetworkSummary>>;

    /// List volumes carrying every label in `filter`.
    async fn list_volumes(&self, filter: &LabelFilter) -> Result<Vec<VolumeSummary>>;

    /// Inspect a network by name or id.
    async fn inspect_network(&self, name: &str) -> Result<Option<NetworkSummary>>;

    /// Inspect a volume by name.
    async fn inspect_volume(&self, name: &str) -> Result<Option<VolumeSummary>>;

    /// Create a network, returning its id.
    async fn create_network(&self, spec: &NetworkSpec) -> Result<String>;

    /// Create a named volume.
    async fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeSummary>;

    /// Remove a network. Fails with `ResourceInUse` while containers are attached.
    async fn remove_network(&self, id: &str) -> Result<()>;

    /// Remove a volume. Fails with `ResourceInUse` while a container references it.
    async fn remove_volume(&self, name: &str) -> Result<()>;

    /// Whether `image` is present locally.
    async fn image_exists(&self, image: &str) -> Result<bool>;

    /// Pull `image` once.
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// Create a container, returning its id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// Start a created container.
    async fn start_container(&self, id: &str) -> Result<()>;

    /// Stop a container. Stopping a stopped container succeeds.
    async fn stop_container(&self, id: &str) -> Result<()>;

    /// Remove a stopped container.
    async fn remove_container(&self, id: &str) -> Result<()>;

    /// Attach a container to an additional network.
    async fn connect_network(&self, network: &str, container_id: &str, endpoint: &EndpointSpec) -> Result<()>;

    /// Runtime name (for logging/metrics).
    fn name(&self) -> &str;
}
