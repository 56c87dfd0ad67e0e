//! Resource inventory collection.
//!
//! Lists everything a project owns on the runtime, grouped by the logical
//! name recorded in each resource's labels.

use crate::error::Result;
use crate::runtime::ContainerRuntime;
use crate::types::{
    logical_name, project_filter, ContainerSummary, NetworkSummary, ResourceKind, VolumeSummary,
};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Managed resources of one project, keyed by logical name.
///
/// Resources without a logical-name label group under `""`. A key with more
/// than one container is a duplication anomaly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub containers: BTreeMap<String, Vec<ContainerSummary>>,
    pub networks: BTreeMap<String, Vec<NetworkSummary>>,
    pub volumes: BTreeMap<String, Vec<VolumeSummary>>,
}

impl Inventory {
    /// Collect the inventory of `project`.
    ///
    /// The runtime is pinged first; any failure aborts the whole collection.
    #[instrument(skip(runtime))]
    pub async fn collect(runtime: &dyn ContainerRuntime, project: &str) -> Result<Self> {
        runtime.ping().await?;

        let containers = runtime.list_containers(&project_filter(project, ResourceKind::Container)).await?;
        let networks = runtime.list_networks(&project_filter(project, ResourceKind::Network)).await?;
        let volumes = runtime.list_volumes(&project_filter(project, ResourceKind::Volume)).await?;

        let inventory = Self {
            containers: group(containers, |c| logical_name(&c.labels, ResourceKind::Container)),
            networks: group(networks, |n| logical_name(&n.labels, ResourceKind::Network)),
            volumes: group(volumes, |v| logical_name(&v.labels, ResourceKind::Volume)),
        };
        debug!(
            containers = inventory.container_count(),
            networks = inventory.networks.len(),
            volumes = inventory.volumes.len(),
            "Inventory collected"
        );
        Ok(inventory)
    }

    /// Total number of containers across all services.
    pub fn container_count(&self) -> usize {
        self.containers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.networks.is_empty() && self.volumes.is_empty()
    }
}

fn group<T>(items: Vec<T>, key: impl Fn(&T) -> String) -> BTreeMap<String, Vec<T>> {
    let mut grouped: BTreeMap<String, Vec<T>> = BTreeMap::new();
    for item in items {
        grouped.entry(key(&item)).or_default().push(item);
    }
    grouped
}
