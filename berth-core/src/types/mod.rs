//! Core domain types for berth.

pub mod container;
pub mod fingerprint;
pub mod labels;
pub mod network;
pub mod project;
pub mod volume;

// Re-exports
pub use container::{short_id, ContainerSpec, ContainerSummary, HostSpec, RestartPolicy};
pub use fingerprint::Fingerprint;
pub use labels::{identity_labels, logical_name, project_filter, LabelFilter, ResourceKind};
pub use network::{
    EndpointSpec, IpamPool, IpamSpec, NetworkSpec, NetworkSummary, PortBinding, PortKey, Protocol,
};
pub use project::{Project, ProjectNetwork, ProjectVolume};
pub use volume::{BindPropagation, MountSpec, VolumeSpec, VolumeSummary};
