//! Project teardown.
//!
//! Removes every managed resource of a project: containers first, then
//! volumes, then networks. External resources declared by the descriptor are
//! never touched. The first failure aborts the run; earlier removals stand.

use super::events::{EventType, ProgressEvent, ProgressReporter};
use super::inventory::Inventory;
use super::provision::stop_and_remove;
use crate::error::Result;
use crate::observability::metrics;
use crate::runtime::ContainerRuntime;
use crate::types::{Project, ResourceKind};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// What a teardown run removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub containers: Vec<String>,
    pub volumes: Vec<String>,
    pub networks: Vec<String>,

    /// External resources left in place
    pub skipped: Vec<String>,
}

impl TeardownReport {
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.volumes.is_empty() && self.networks.is_empty()
    }
}

/// Remove everything labeled with `project_name`.
///
/// `project` is optional: without a descriptor, every labeled resource is
/// removed since external ones never carry the identity labels.
#[instrument(skip(runtime, progress, project))]
pub async fn teardown(
    runtime: &dyn ContainerRuntime,
    progress: &dyn ProgressReporter,
    project_name: &str,
    project: Option<&Project>,
) -> Result<TeardownReport> {
    let inventory = Inventory::collect(runtime, project_name).await?;
    let mut report = TeardownReport::default();

    if inventory.is_empty() {
        info!("Nothing to remove");
        return Ok(report);
    }

    let (external_networks, external_volumes) = external_names(project);

    for (service, containers) in &inventory.containers {
        for container in containers {
            stop_and_remove(runtime, progress, service, container).await?;
            metrics::record_container_removed(project_name);
            report.containers.push(container.name.clone());
        }
    }

    for volume in inventory.volumes.values().flatten() {
        if external_volumes.contains(&volume.name) {
            skip(progress, &mut report, ResourceKind::Volume, &volume.name);
            continue;
        }
        match runtime.remove_volume(&volume.name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!(volume = %volume.name, "Volume already gone"),
            Err(e) => return Err(e),
        }
        progress.report(&ProgressEvent::volume(EventType::VolumeRemoved, &volume.name));
        report.volumes.push(volume.name.clone());
    }

    for network in inventory.networks.values().flatten() {
        if external_networks.contains(&network.name) {
            skip(progress, &mut report, ResourceKind::Network, &network.name);
            continue;
        }
        match runtime.remove_network(&network.id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!(network = %network.name, "Network already gone"),
            Err(e) => return Err(e),
        }
        progress.report(&ProgressEvent::network(EventType::NetworkRemoved, &network.name));
        report.networks.push(network.name.clone());
    }

    info!(
        containers = report.containers.len(),
        volumes = report.volumes.len(),
        networks = report.networks.len(),
        "Teardown complete"
    );
    Ok(report)
}

fn external_names(project: Option<&Project>) -> (BTreeSet<String>, BTreeSet<String>) {
    let Some(project) = project else {
        return Default::default();
    };
    let networks = project.networks().into_iter().filter(|n| n.is_external()).map(|n| n.name).collect();
    let volumes = project.volumes().into_iter().filter(|v| v.is_external()).map(|v| v.name).collect();
    (networks, volumes)
}

fn skip(progress: &dyn ProgressReporter, report: &mut TeardownReport, kind: ResourceKind, name: &str) {
    debug!(kind = %kind, name = %name, "Leaving external resource");
    progress.report(&ProgressEvent::new(EventType::Skipped, Some(kind), name));
    report.skipped.push(name.to_string());
}
