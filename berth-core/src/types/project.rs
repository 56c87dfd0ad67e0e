//! Project: a loaded descriptor plus the identity rules derived from it.

use super::labels::trimmed_project;
use super::network::{DEFAULT_NETWORK, DEFAULT_NETWORK_DRIVER};
use crate::compose::{ComposeFile, ComposeParser, FileBindings, NetworkDefinition, VolumeDefinition};
use crate::error::{BerthError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// A declared (or synthesized) network with its resolved runtime name.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectNetwork {
    /// Logical key in the descriptor
    pub key: String,

    /// Runtime name
    pub name: String,

    pub definition: NetworkDefinition,
}

impl ProjectNetwork {
    pub fn is_external(&self) -> bool {
        self.definition.external.is_external()
    }
}

/// A declared volume with its resolved runtime name.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectVolume {
    /// Logical key in the descriptor
    pub key: String,

    /// Runtime name
    pub name: String,

    pub definition: VolumeDefinition,
}

impl ProjectVolume {
    pub fn is_external(&self) -> bool {
        self.definition.external.is_external()
    }
}

/// A loaded compose project.
#[derive(Debug, Clone)]
pub struct Project {
    /// Project name, the root of every resource identity
    pub name: String,

    /// Absolute directory containing the descriptor
    pub working_dir: PathBuf,

    pub compose: ComposeFile,

    /// Config and secret bindings for this run
    pub bindings: FileBindings,
}

impl Project {
    /// Load the descriptor at `file`.
    ///
    /// The project name is `name` when given, then the descriptor's `name`
    /// field, then the basename of the descriptor's directory.
    #[instrument(skip(name))]
    pub fn load(file: &Path, name: Option<&str>) -> Result<Self> {
        let compose = ComposeParser::parse_file(file)?;
        let absolute = std::fs::canonicalize(file)
            .map_err(|e| BerthError::IoError { path: file.to_path_buf(), source: e })?;
        let working_dir = absolute.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("/"));
        Self::from_compose(compose, working_dir, name)
    }

    /// Build a project from an already parsed descriptor.
    pub fn from_compose(compose: ComposeFile, working_dir: PathBuf, name: Option<&str>) -> Result<Self> {
        let name = resolve_name(name, compose.name.as_deref(), &working_dir)?;
        let bindings = FileBindings::from_compose(&compose);
        debug!(project = %name, working_dir = ?working_dir, "Loaded project");
        Ok(Self { name, working_dir, compose, bindings })
    }

    /// Runtime name of the container for `service`.
    pub fn container_name(&self, service: &str) -> String {
        match self.compose.services.get(service).and_then(|s| s.container_name.clone()) {
            Some(name) => name,
            None => format!("{}_{}_1", trimmed_project(&self.name), service),
        }
    }

    /// Declared networks in descriptor order, followed by the synthesized
    /// default network when none is declared.
    pub fn networks(&self) -> Vec<ProjectNetwork> {
        let mut networks: Vec<ProjectNetwork> = self
            .compose
            .network_definitions()
            .map(|(key, definition)| ProjectNetwork {
                key: key.clone(),
                name: network_name(key, &definition),
                definition,
            })
            .collect();

        if !networks.iter().any(is_default) {
            networks.push(ProjectNetwork {
                key: DEFAULT_NETWORK.to_string(),
                name: format!("{}-default", self.name),
                definition: NetworkDefinition {
                    driver: Some(DEFAULT_NETWORK_DRIVER.to_string()),
                    ..Default::default()
                },
            });
        }
        networks
    }

    /// Declared volumes in descriptor order.
    pub fn volumes(&self) -> Vec<ProjectVolume> {
        self.compose
            .volume_definitions()
            .map(|(key, definition)| ProjectVolume {
                key: key.clone(),
                name: self.volume_name(key, &definition),
                definition,
            })
            .collect()
    }

    /// Network with logical key `key`, including the synthesized default.
    pub fn network(&self, key: &str) -> Option<ProjectNetwork> {
        self.networks().into_iter().find(|n| n.key == key)
    }

    /// The network services join when they list none: the one keyed or named
    /// `default`, otherwise the synthesized `<project>-default`.
    pub fn default_network(&self) -> Option<ProjectNetwork> {
        let networks = self.networks();
        networks
            .iter()
            .position(|n| n.key == DEFAULT_NETWORK)
            .or_else(|| networks.iter().position(is_default))
            .map(|index| networks[index].clone())
    }

    /// Declared volume with logical key `key`.
    pub fn volume(&self, key: &str) -> Option<ProjectVolume> {
        self.volumes().into_iter().find(|v| v.key == key)
    }

    fn volume_name(&self, key: &str, definition: &VolumeDefinition) -> String {
        if definition.external.is_external() {
            return definition
                .name
                .clone()
                .or_else(|| definition.external.name().map(str::to_string))
                .unwrap_or_else(|| key.to_string());
        }
        let base = definition.name.as_deref().unwrap_or(key);
        format!("{}_{}", trimmed_project(&self.name), base)
    }
}

fn is_default(network: &ProjectNetwork) -> bool {
    network.key == DEFAULT_NETWORK || network.name == DEFAULT_NETWORK
}

fn network_name(key: &str, definition: &NetworkDefinition) -> String {
    definition
        .name
        .clone()
        .or_else(|| definition.external.name().map(str::to_string))
        .unwrap_or_else(|| key.to_string())
}

fn resolve_name(flag: Option<&str>, declared: Option<&str>, working_dir: &Path) -> Result<String> {
    let candidate = flag
        .filter(|n| !n.is_empty())
        .or_else(|| declared.filter(|n| !n.is_empty()))
        .map(str::to_string)
        .or_else(|| working_dir.file_name().map(|n| n.to_string_lossy().to_string()));

    match candidate {
        Some(name) if !trimmed_project(&name).is_empty() => Ok(name),
        _ => Err(BerthError::InvalidConfig {
            reason: format!("cannot derive a project name from {:?}", working_dir),
        }),
    }
}
