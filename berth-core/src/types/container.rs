//! Container domain types.
//!
//! [`ContainerSpec`] is the runtime-neutral creation request produced from a
//! service; adapters map it onto their own API.

use super::network::{EndpointSpec, PortBinding, PortKey};
use super::volume::MountSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Container restart policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    #[default]
    No,
    Always,
    UnlessStopped,
    OnFailure {
        max_retries: Option<i64>,
    },
}

impl std::str::FromStr for RestartPolicy {
    type Err = String;

    /// Parse `no`, `always`, `unless-stopped` or `on-failure[:N]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no" | "" => Ok(RestartPolicy::No),
            "always" => Ok(RestartPolicy::Always),
            "unless-stopped" => Ok(RestartPolicy::UnlessStopped),
            "on-failure" => Ok(RestartPolicy::OnFailure { max_retries: None }),
            other => match other.strip_prefix("on-failure:") {
                Some(n) => n
                    .parse::<i64>()
                    .map(|n| RestartPolicy::OnFailure { max_retries: Some(n) })
                    .map_err(|_| format!("invalid restart policy: {}", s)),
                None => Err(format!("invalid restart policy: {}", s)),
            },
        }
    }
}

/// Host-level settings of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSpec {
    /// Network mode (`bridge`, `host`, `none`, `container:<id>`, or a network name)
    pub network_mode: Option<String>,
    pub restart_policy: RestartPolicy,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub dns: Vec<String>,
    pub dns_search: Vec<String>,
    pub extra_hosts: Vec<String>,
    pub links: Vec<String>,
    pub ipc_mode: Option<String>,
    pub pid_mode: Option<String>,
    pub userns_mode: Option<String>,
    pub privileged: bool,
    pub readonly_rootfs: bool,
    pub security_opt: Vec<String>,

    /// Size of /dev/shm in bytes
    pub shm_size: Option<i64>,

    pub sysctls: BTreeMap<String, String>,
    pub isolation: Option<String>,
    pub init: Option<bool>,
    pub port_bindings: BTreeMap<PortKey, Vec<PortBinding>>,
    pub mounts: Vec<MountSpec>,

    /// Memory limit in bytes
    pub memory: Option<i64>,

    /// CPU quota in units of 1e-9 CPUs
    pub nano_cpus: Option<i64>,
}

/// Creation request for a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Runtime name
    pub name: String,

    /// Image reference
    pub image: String,

    pub hostname: Option<String>,
    pub domainname: Option<String>,
    pub user: Option<String>,
    pub tty: bool,
    pub open_stdin: bool,
    pub command: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub mac_address: Option<String>,
    pub stop_signal: Option<String>,

    /// `KEY=value` entries
    pub env: Vec<String>,

    /// Descriptor labels plus identity labels and fingerprint
    pub labels: BTreeMap<String, String>,

    pub network_disabled: bool,
    pub exposed_ports: BTreeSet<PortKey>,
    pub host: HostSpec,

    /// Network attached at creation time
    pub primary_endpoint: Option<EndpointSpec>,
}

/// Container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub labels: BTreeMap<String, String>,
    pub running: bool,

    /// Names of the networks the container is attached to
    #[serde(default)]
    pub networks: BTreeSet<String>,
}

impl ContainerSummary {
    /// First 12 characters of the runtime id.
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// First 12 characters of a runtime id.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(12) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
