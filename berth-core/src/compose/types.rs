//! Compose file format types.
//!
//! Types matching the Compose specification. Top-level sections keep the
//! order they were written in; per-service maps are sorted so that a record
//! always serializes the same way.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root structure of a compose file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeFile {
    /// Compose file format version (e.g., "2", "3", "3.8")
    #[serde(default)]
    pub version: String,

    /// Project name declared in the file
    #[serde(default)]
    pub name: Option<String>,

    /// Services to be created, in declaration order
    #[serde(default)]
    pub services: IndexMap<String, Service>,

    /// Networks
    #[serde(default)]
    pub networks: IndexMap<String, Option<NetworkDefinition>>,

    /// Named volumes
    #[serde(default)]
    pub volumes: IndexMap<String, Option<VolumeDefinition>>,

    /// Config files exposed to services
    #[serde(default)]
    pub configs: IndexMap<String, FileObjectDefinition>,

    /// Secret files exposed to services
    #[serde(default)]
    pub secrets: IndexMap<String, FileObjectDefinition>,
}

impl ComposeFile {
    /// Declared network definitions, with `null` entries defaulted.
    pub fn network_definitions(&self) -> impl Iterator<Item = (&String, NetworkDefinition)> {
        self.networks.iter().map(|(k, v)| (k, v.clone().unwrap_or_default()))
    }

    /// Declared volume definitions, with `null` entries defaulted.
    pub fn volume_definitions(&self) -> impl Iterator<Item = (&String, VolumeDefinition)> {
        self.volumes.iter().map(|(k, v)| (k, v.clone().unwrap_or_default()))
    }
}

/// A service in a compose file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    /// Container image to use
    pub image: String,

    /// Fixed container name (otherwise derived from project and service)
    pub container_name: Option<String>,

    /// Override the default command
    pub command: Option<ShellCommand>,

    /// Override the default entrypoint
    pub entrypoint: Option<ShellCommand>,

    /// Environment variables
    pub environment: KeyValues,

    /// Metadata labels
    pub labels: KeyValues,

    pub hostname: Option<String>,
    pub domainname: Option<String>,
    pub user: Option<String>,
    pub working_dir: Option<String>,
    pub mac_address: Option<String>,
    pub stop_signal: Option<String>,
    pub tty: bool,
    pub stdin_open: bool,

    /// Network mode (`host`, `none`, `container:<id>`, `service:<name>`, ...)
    pub network_mode: Option<String>,

    /// Networks to connect to
    pub networks: ServiceNetworks,

    /// Port mappings
    pub ports: Vec<PortDefinition>,

    /// Volume, bind and tmpfs mounts
    pub volumes: Vec<ServiceVolume>,

    /// Config files mounted into the container
    pub configs: Vec<FileReference>,

    /// Secret files mounted into the container
    pub secrets: Vec<FileReference>,

    /// Restart policy (`no`, `always`, `unless-stopped`, `on-failure[:N]`)
    pub restart: Option<String>,

    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub dns: StringOrList,
    pub dns_search: StringOrList,
    pub extra_hosts: Vec<String>,
    pub links: Vec<String>,
    pub ipc: Option<String>,
    pub pid: Option<String>,
    pub userns_mode: Option<String>,
    pub privileged: bool,
    pub read_only: bool,
    pub security_opt: Vec<String>,

    /// Size of /dev/shm in bytes or as a human size ("64m")
    pub shm_size: Option<Scalar>,

    pub sysctls: KeyValues,
    pub isolation: Option<String>,
    pub init: Option<bool>,

    /// Deployment configuration
    pub deploy: Option<DeployConfig>,
}

/// Scalar values accepted where compose expects strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "{}", s),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
        }
    }
}

/// Key/value sections (environment, labels, sysctls) can be a map or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValues {
    /// Key-value map
    Map(BTreeMap<String, Option<Scalar>>),
    /// List of KEY=value strings
    List(Vec<String>),
}

impl Default for KeyValues {
    fn default() -> Self {
        KeyValues::Map(BTreeMap::new())
    }
}

impl KeyValues {
    /// Keys with their optional values, sorted by key.
    pub fn entries(&self) -> BTreeMap<String, Option<String>> {
        match self {
            KeyValues::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.as_ref().map(ToString::to_string))).collect(),
            KeyValues::List(list) => list
                .iter()
                .map(|s| match s.split_once('=') {
                    Some((k, v)) => (k.to_string(), Some(v.to_string())),
                    None => (s.clone(), None),
                })
                .collect(),
        }
    }

    /// Convert to a map regardless of input format. Keys without a value map to "".
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries().into_iter().map(|(k, v)| (k, v.unwrap_or_default())).collect()
    }

    /// Render as environment entries sorted by key.
    ///
    /// A key without a value stays bare (`KEY`) so the engine passes the
    /// variable through from its own environment.
    pub fn to_env_list(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{}={}", k, v),
                None => k,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            KeyValues::Map(map) => map.is_empty(),
            KeyValues::List(list) => list.is_empty(),
        }
    }
}

/// Commands can be written as a shell string or an exec list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShellCommand {
    Shell(String),
    Exec(Vec<String>),
}

impl ShellCommand {
    /// Split into argv. Returns `None` when a shell string has unbalanced quotes.
    pub fn to_argv(&self) -> Option<Vec<String>> {
        match self {
            ShellCommand::Shell(s) => shlex::split(s),
            ShellCommand::Exec(v) => Some(v.clone()),
        }
    }
}

/// A single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl Default for StringOrList {
    fn default() -> Self {
        StringOrList::Many(Vec::new())
    }
}

impl StringOrList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            StringOrList::One(s) => vec![s.clone()],
            StringOrList::Many(v) => v.clone(),
        }
    }
}

/// Service network memberships, as a list of names or a map with per-network settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceNetworks {
    List(Vec<String>),
    Map(IndexMap<String, Option<ServiceNetworkConfig>>),
}

impl Default for ServiceNetworks {
    fn default() -> Self {
        ServiceNetworks::List(Vec::new())
    }
}

impl ServiceNetworks {
    /// Memberships in declaration order with their aliases.
    pub fn entries(&self) -> Vec<(String, Vec<String>)> {
        match self {
            ServiceNetworks::List(names) => names.iter().map(|n| (n.clone(), Vec::new())).collect(),
            ServiceNetworks::Map(map) => map
                .iter()
                .map(|(n, cfg)| {
                    (n.clone(), cfg.as_ref().map(|c| c.aliases.clone()).unwrap_or_default())
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ServiceNetworks::List(names) => names.is_empty(),
            ServiceNetworks::Map(map) => map.is_empty(),
        }
    }
}

/// Per-network settings of a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceNetworkConfig {
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Port declaration in short (`"8080:80/tcp"`) or long form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortDefinition {
    Number(u16),
    Short(String),
    Long(PortConfig),
}

/// Long-form port declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Container port
    pub target: u16,

    /// Host port
    #[serde(default)]
    pub published: Option<Scalar>,

    /// Host interface to bind
    #[serde(default)]
    pub host_ip: Option<String>,

    /// Protocol (tcp, udp, sctp)
    #[serde(default)]
    pub protocol: Option<String>,
}

/// Mount declaration in short (`"src:dst:ro"`) or long form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceVolume {
    Short(String),
    Long(ServiceVolumeConfig),
}

/// Long-form mount declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceVolumeConfig {
    /// Mount type: bind, volume or tmpfs
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub source: Option<String>,

    pub target: String,

    #[serde(default)]
    pub read_only: bool,

    #[serde(default)]
    pub bind: Option<BindOptions>,

    #[serde(default)]
    pub volume: Option<VolumeOptions>,

    #[serde(default)]
    pub tmpfs: Option<TmpfsOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindOptions {
    #[serde(default)]
    pub propagation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeOptions {
    #[serde(default)]
    pub nocopy: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TmpfsOptions {
    /// Size in bytes or as a human size ("64m")
    #[serde(default)]
    pub size: Option<Scalar>,
}

/// Reference from a service to a config or secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileReference {
    Short(String),
    Long(FileReferenceConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileReferenceConfig {
    pub source: String,

    #[serde(default)]
    pub target: Option<String>,
}

impl FileReference {
    pub fn source(&self) -> &str {
        match self {
            FileReference::Short(s) => s,
            FileReference::Long(c) => &c.source,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            FileReference::Short(_) => None,
            FileReference::Long(c) => c.target.as_deref(),
        }
    }
}

/// Deployment configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Resource limits and reservations
    #[serde(default)]
    pub resources: Option<Resources>,
}

/// Resource configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    /// Resource limits (maximum)
    #[serde(default)]
    pub limits: Option<ResourceLimit>,
}

/// Resource limits for CPU and memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimit {
    /// CPU limit (e.g., "2.0" for 2 cores)
    #[serde(default)]
    pub cpus: Option<Scalar>,

    /// Memory limit in bytes or as a human size ("1024M", "1G")
    #[serde(default)]
    pub memory: Option<Scalar>,
}

/// `external: true`, or the legacy `external: { name: ... }` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum External {
    Flag(bool),
    Named { name: Option<String> },
}

impl Default for External {
    fn default() -> Self {
        External::Flag(false)
    }
}

impl External {
    pub fn is_external(&self) -> bool {
        match self {
            External::Flag(flag) => *flag,
            External::Named { .. } => true,
        }
    }

    /// Name given through the legacy form, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            External::Named { name } => name.as_deref(),
            External::Flag(_) => None,
        }
    }
}

/// Network definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkDefinition {
    /// Runtime name (defaults to the logical key)
    pub name: Option<String>,

    /// Network driver to use
    pub driver: Option<String>,

    /// Driver-specific options
    pub driver_opts: BTreeMap<String, String>,

    /// IPAM configuration
    pub ipam: Option<IpamConfig>,

    pub external: External,
    pub internal: bool,
    pub attachable: bool,
    pub labels: KeyValues,
}

/// IP Address Management configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpamConfig {
    /// IPAM driver
    #[serde(default)]
    pub driver: Option<String>,

    /// IPAM pool entries
    #[serde(default)]
    pub config: Vec<IpamPoolConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpamPoolConfig {
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub ip_range: Option<String>,
}

/// Volume definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeDefinition {
    /// Name used instead of the logical key
    pub name: Option<String>,

    /// Volume driver to use
    pub driver: Option<String>,

    /// Driver-specific options
    pub driver_opts: BTreeMap<String, String>,

    pub external: External,
    pub labels: KeyValues,
}

/// Top-level config or secret definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileObjectDefinition {
    /// Path of the backing file, relative to the project directory
    pub file: Option<String>,

    /// Name used instead of the logical key
    pub name: Option<String>,

    pub external: External,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_values_to_map_from_list() {
        let env = KeyValues::List(vec![
            "ENV=production".to_string(),
            "DEBUG=false".to_string(),
            "EMPTY".to_string(),
        ]);
        let map = env.to_map();
        assert_eq!(map.get("ENV"), Some(&"production".to_string()));
        assert_eq!(map.get("DEBUG"), Some(&"false".to_string()));
        assert_eq!(map.get("EMPTY"), Some(&String::new()));
    }

    #[test]
    fn test_key_values_to_map_from_map() {
        let env = KeyValues::Map(BTreeMap::from([
            ("PORT".to_string(), Some(Scalar::Int(8080))),
            ("VERBOSE".to_string(), Some(Scalar::Bool(true))),
            ("UNSET".to_string(), None),
        ]));
        assert_eq!(env.to_env_list(), vec!["PORT=8080", "UNSET", "VERBOSE=true"]);
    }

    #[test]
    fn test_env_list_keeps_bare_and_empty_apart() {
        let env = KeyValues::List(vec!["HOME".to_string(), "BLANK=".to_string(), "A=b=c".to_string()]);
        assert_eq!(env.to_env_list(), vec!["A=b=c", "BLANK=", "HOME"]);
        assert_eq!(env.to_map().get("HOME"), Some(&String::new()));
    }

    #[test]
    fn test_shell_command_split() {
        let cmd = ShellCommand::Shell(r#"sh -c "echo hello world""#.to_string());
        assert_eq!(cmd.to_argv().unwrap(), vec!["sh", "-c", "echo hello world"]);
        assert!(ShellCommand::Shell("echo 'unterminated".to_string()).to_argv().is_none());
    }

    #[test]
    fn test_service_networks_entries_keep_order() {
        let mut map = IndexMap::new();
        map.insert("front".to_string(), None);
        map.insert(
            "back".to_string(),
            Some(ServiceNetworkConfig { aliases: vec!["api".to_string()] }),
        );
        let entries = ServiceNetworks::Map(map).entries();
        assert_eq!(entries[0], ("front".to_string(), vec![]));
        assert_eq!(entries[1], ("back".to_string(), vec!["api".to_string()]));
    }

    #[test]
    fn test_external_forms() {
        assert!(!External::default().is_external());
        assert!(External::Flag(true).is_external());
        let legacy = External::Named { name: Some("shared".to_string()) };
        assert!(legacy.is_external());
        assert_eq!(legacy.name(), Some("shared"));
    }
}
