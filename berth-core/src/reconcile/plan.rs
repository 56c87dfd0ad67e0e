//! Convergence planning.
//!
//! [`plan`] diffs a project against its inventory and decides, for every
//! declared network, volume and service, what the provisioner must do. It
//! makes no runtime calls, so a plan can be shown before anything changes.

use super::inventory::Inventory;
use super::translate::{network_spec, volume_spec};
use crate::error::Result;
use crate::types::{ContainerSummary, Fingerprint, NetworkSpec, Project, VolumeSpec};
use std::fmt;

/// Decision for a declared network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkAction {
    /// Already present with the expected name.
    Keep { key: String, name: String },

    /// Inspect by name and create when absent.
    Ensure { key: String, spec: NetworkSpec },

    /// External: must exist, never created.
    VerifyExternal { key: String, name: String },
}

impl NetworkAction {
    /// Runtime name of the network.
    pub fn name(&self) -> &str {
        match self {
            NetworkAction::Keep { name, .. } | NetworkAction::VerifyExternal { name, .. } => name,
            NetworkAction::Ensure { spec, .. } => &spec.name,
        }
    }
}

/// Decision for a declared volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeAction {
    Keep { key: String, name: String },
    Ensure { key: String, spec: VolumeSpec },
    VerifyExternal { key: String, name: String },
}

impl VolumeAction {
    /// Runtime name of the volume.
    pub fn name(&self) -> &str {
        match self {
            VolumeAction::Keep { name, .. } | VolumeAction::VerifyExternal { name, .. } => name,
            VolumeAction::Ensure { spec, .. } => &spec.name,
        }
    }
}

/// Why existing containers are replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceReason {
    /// Recorded fingerprint differs from the service's current one.
    Drift,

    /// More than one container carries the service's identity.
    Duplicated,
}

impl fmt::Display for ReplaceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplaceReason::Drift => write!(f, "configuration changed"),
            ReplaceReason::Duplicated => write!(f, "duplicate containers"),
        }
    }
}

/// Decision for a service, or for an orphaned container family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAction {
    Create { service: String, fingerprint: Fingerprint },
    Keep { service: String, container: ContainerSummary },

    /// Fingerprint matches but the container is not running.
    Start { service: String, container: ContainerSummary },

    Replace {
        service: String,
        reason: ReplaceReason,
        existing: Vec<ContainerSummary>,
        fingerprint: Fingerprint,
    },

    /// Containers whose service is no longer declared.
    Remove { service: String, containers: Vec<ContainerSummary> },
}

impl ServiceAction {
    /// Logical service name the action applies to.
    pub fn service(&self) -> &str {
        match self {
            ServiceAction::Create { service, .. }
            | ServiceAction::Keep { service, .. }
            | ServiceAction::Start { service, .. }
            | ServiceAction::Replace { service, .. }
            | ServiceAction::Remove { service, .. } => service,
        }
    }

    /// Short verb for progress and plan output.
    pub fn verb(&self) -> &'static str {
        match self {
            ServiceAction::Create { .. } => "create",
            ServiceAction::Keep { .. } => "keep",
            ServiceAction::Start { .. } => "start",
            ServiceAction::Replace { .. } => "replace",
            ServiceAction::Remove { .. } => "remove",
        }
    }
}

/// Counts of each action kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub keep: usize,
    pub start: usize,
    pub replace: usize,
    pub remove: usize,
    pub networks_ensured: usize,
    pub volumes_ensured: usize,
}

/// Complete set of decisions for one convergence run.
///
/// `services` holds declared services in descriptor order followed by
/// orphan removals in logical-name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub project: String,
    pub networks: Vec<NetworkAction>,
    pub volumes: Vec<VolumeAction>,
    pub services: Vec<ServiceAction>,
}

impl Plan {
    /// True when applying the plan would not mutate the runtime.
    pub fn is_noop(&self) -> bool {
        self.networks.iter().all(|a| !matches!(a, NetworkAction::Ensure { .. }))
            && self.volumes.iter().all(|a| !matches!(a, VolumeAction::Ensure { .. }))
            && self.services.iter().all(|a| matches!(a, ServiceAction::Keep { .. }))
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary {
            networks_ensured: self.networks.iter().filter(|a| matches!(a, NetworkAction::Ensure { .. })).count(),
            volumes_ensured: self.volumes.iter().filter(|a| matches!(a, VolumeAction::Ensure { .. })).count(),
            ..Default::default()
        };
        for action in &self.services {
            match action {
                ServiceAction::Create { .. } => summary.create += 1,
                ServiceAction::Keep { .. } => summary.keep += 1,
                ServiceAction::Start { .. } => summary.start += 1,
                ServiceAction::Replace { .. } => summary.replace += 1,
                ServiceAction::Remove { .. } => summary.remove += 1,
            }
        }
        summary
    }
}

/// Diff `project` against `inventory`.
pub fn plan(project: &Project, inventory: &Inventory) -> Result<Plan> {
    let networks = project
        .networks()
        .into_iter()
        .map(|network| {
            if network.is_external() {
                return NetworkAction::VerifyExternal { key: network.key, name: network.name };
            }
            let present = inventory
                .networks
                .get(&network.key)
                .is_some_and(|found| found.iter().any(|n| n.name == network.name));
            if present {
                NetworkAction::Keep { key: network.key, name: network.name }
            } else {
                let spec = network_spec(project, &network);
                NetworkAction::Ensure { key: network.key, spec }
            }
        })
        .collect();

    let volumes = project
        .volumes()
        .into_iter()
        .map(|volume| {
            if volume.is_external() {
                return VolumeAction::VerifyExternal { key: volume.key, name: volume.name };
            }
            let present = inventory
                .volumes
                .get(&volume.key)
                .is_some_and(|found| found.iter().any(|v| v.name == volume.name));
            if present {
                VolumeAction::Keep { key: volume.key, name: volume.name }
            } else {
                let spec = volume_spec(project, &volume);
                VolumeAction::Ensure { key: volume.key, spec }
            }
        })
        .collect();

    let mut services = Vec::with_capacity(project.compose.services.len());
    for (name, service) in &project.compose.services {
        let fingerprint = Fingerprint::of(name, service)?;
        let existing = inventory.containers.get(name).cloned().unwrap_or_default();
        services.push(classify(name, fingerprint, existing));
    }

    for (name, containers) in &inventory.containers {
        if !project.compose.services.contains_key(name) {
            services.push(ServiceAction::Remove { service: name.clone(), containers: containers.clone() });
        }
    }

    Ok(Plan { project: project.name.clone(), networks, volumes, services })
}

fn classify(name: &str, fingerprint: Fingerprint, mut existing: Vec<ContainerSummary>) -> ServiceAction {
    let service = name.to_string();
    match existing.len() {
        0 => ServiceAction::Create { service, fingerprint },
        1 => {
            let matches = Fingerprint::from_labels(&existing[0].labels).as_ref() == Some(&fingerprint);
            match (matches, existing.pop()) {
                (true, Some(container)) if container.running => ServiceAction::Keep { service, container },
                (true, Some(container)) => ServiceAction::Start { service, container },
                _ => ServiceAction::Replace { service, reason: ReplaceReason::Drift, existing, fingerprint },
            }
        }
        _ => ServiceAction::Replace { service, reason: ReplaceReason::Duplicated, existing, fingerprint },
    }
}
