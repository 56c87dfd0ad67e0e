//! Identity labels attached to every managed resource.
//!
//! A resource belongs to a project when it carries the project label; within
//! the project, the kind label plus the per-kind name label identify its family.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LABEL_NAMESPACE: &str = "io.compose-spec";
pub const LABEL_PROJECT: &str = "io.compose-spec.project";
pub const LABEL_KIND: &str = "io.compose-spec.kind";
pub const LABEL_SERVICE: &str = "io.compose-spec.service";
pub const LABEL_NETWORK: &str = "io.compose-spec.network";
pub const LABEL_VOLUME: &str = "io.compose-spec.volume";
pub const LABEL_CONFIG_HASH: &str = "io.compose-spec.config-hash";

/// Kind of runtime resource managed by a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Container,
    Network,
    Volume,
}

impl ResourceKind {
    /// Value stored under [`LABEL_KIND`].
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Network => "network",
            Self::Volume => "volume",
        }
    }

    /// Label key holding the logical name for this kind.
    pub fn name_label(&self) -> &'static str {
        match self {
            Self::Container => LABEL_SERVICE,
            Self::Network => LABEL_NETWORK,
            Self::Volume => LABEL_VOLUME,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Container => write!(f, "Container"),
            Self::Network => write!(f, "Network"),
            Self::Volume => write!(f, "Volume"),
        }
    }
}

/// Build the identity label set `{project, kind, name}`.
pub fn identity_labels(project: &str, kind: ResourceKind, name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_PROJECT.to_string(), project.to_string()),
        (LABEL_KIND.to_string(), kind.as_label().to_string()),
        (kind.name_label().to_string(), name.to_string()),
    ])
}

/// Logical name recorded on a resource, or `""` when the label is missing.
pub fn logical_name(labels: &BTreeMap<String, String>, kind: ResourceKind) -> String {
    labels.get(kind.name_label()).cloned().unwrap_or_default()
}

/// Server-side label filter: every entry must match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    pub labels: Vec<(String, String)>,
}

impl LabelFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.labels.push((key.to_string(), value.to_string()));
        self
    }

    /// Filter expressions in the `key=value` form the Docker API expects.
    pub fn to_expressions(&self) -> Vec<String> {
        self.labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.labels.iter().all(|(k, v)| labels.get(k) == Some(v))
    }
}

/// Filter selecting every resource of `kind` owned by `project`.
pub fn project_filter(project: &str, kind: ResourceKind) -> LabelFilter {
    LabelFilter::new().with(LABEL_PROJECT, project).with(LABEL_KIND, kind.as_label())
}

/// Project name with leading and trailing `-`/`_` removed, used as an identity prefix.
pub fn trimmed_project(project: &str) -> &str {
    project.trim_matches(|c| c == '-' || c == '_')
}
