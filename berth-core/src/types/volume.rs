//! Volume and mount domain types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Creation request for a named volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Runtime name (`<project>_<name>`)
    pub name: String,

    /// Volume driver (runtime default when unset)
    pub driver: Option<String>,

    pub driver_opts: BTreeMap<String, String>,

    /// Descriptor labels plus identity labels
    pub labels: BTreeMap<String, String>,
}

/// Volume as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub name: String,
    pub driver: String,
    pub labels: BTreeMap<String, String>,
}

/// Bind propagation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindPropagation {
    Private,
    Rprivate,
    Shared,
    Rshared,
    Slave,
    Rslave,
}

impl std::str::FromStr for BindPropagation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "rprivate" => Ok(Self::Rprivate),
            "shared" => Ok(Self::Shared),
            "rshared" => Ok(Self::Rshared),
            "slave" => Ok(Self::Slave),
            "rslave" => Ok(Self::Rslave),
            _ => Err(format!("Unknown bind propagation: {}", s)),
        }
    }
}

/// Mount attached to a container.
///
/// Each variant carries only the fields its runtime mount type accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MountSpec {
    /// Host path bind mount; `source` is absolute.
    Bind {
        source: PathBuf,
        target: String,
        read_only: bool,
        propagation: Option<BindPropagation>,
    },

    /// Named volume, or anonymous volume when `source` is `None`.
    Volume {
        source: Option<String>,
        target: String,
        read_only: bool,
        no_copy: bool,
    },

    /// In-memory filesystem.
    Tmpfs { target: String, size_bytes: Option<i64> },
}

impl MountSpec {
    /// Mount point inside the container.
    pub fn target(&self) -> &str {
        match self {
            MountSpec::Bind { target, .. }
            | MountSpec::Volume { target, .. }
            | MountSpec::Tmpfs { target, .. } => target,
        }
    }
}
