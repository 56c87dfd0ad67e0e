//! In-memory container runtime for integration tests.
//!
//! Behaves like the Docker engine for the subset the engine uses: label
//! filters, name conflicts, in-use checks on removal, and image presence.
//! Every call is recorded as `"<operation> <target>"`.

#![allow(dead_code)]

use async_trait::async_trait;
use berth_core::error::{BerthError, Result};
use berth_core::reconcile::{ProgressEvent, ProgressReporter};
use berth_core::types::{
    ContainerSpec, ContainerSummary, EndpointSpec, LabelFilter, MountSpec, NetworkSpec, NetworkSummary,
    ResourceKind, VolumeSpec, VolumeSummary,
};
use berth_core::ContainerRuntime;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;

/// A container held by the mock.
#[derive(Debug, Clone)]
pub struct MockContainer {
    pub summary: ContainerSummary,

    /// Creation request, absent for containers seeded directly
    pub spec: Option<ContainerSpec>,

    /// Attached networks (by name) with their aliases
    pub endpoints: BTreeMap<String, Vec<String>>,

    /// Named volumes referenced by mounts
    pub volumes: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Runtime,
    NotFound,
}

#[derive(Debug, Default)]
struct State {
    containers: BTreeMap<String, MockContainer>,
    networks: BTreeMap<String, NetworkSummary>,
    volumes: BTreeMap<String, VolumeSummary>,
    images: BTreeSet<String>,
    calls: Vec<String>,
    failures: BTreeMap<String, Failure>,
    unreachable: bool,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:012x}{:052x}", self.next_id, self.next_id)
    }

    fn find_container(&self, id: &str) -> Option<String> {
        self.containers
            .iter()
            .find(|(cid, c)| cid.as_str() == id || c.summary.name == id)
            .map(|(cid, _)| cid.clone())
    }

    fn find_network(&self, id_or_name: &str) -> Option<String> {
        self.networks
            .values()
            .find(|n| n.id == id_or_name || n.name == id_or_name)
            .map(|n| n.name.clone())
    }
}

/// In-memory [`ContainerRuntime`].
#[derive(Debug, Default)]
pub struct MockRuntime {
    state: Mutex<State>,
}

impl MockRuntime {
    /// Runtime where every image is present.
    pub fn new() -> Self {
        let mock = Self::default();
        mock.state.lock().unwrap().images.insert("*".to_string());
        mock
    }

    /// Runtime where only the listed images are present; others must be pulled.
    pub fn with_images(images: &[&str]) -> Self {
        let mock = Self::default();
        mock.state.lock().unwrap().images.extend(images.iter().map(|i| i.to_string()));
        mock
    }

    /// Make `operation` fail with a runtime error (e.g. `"start_container"`).
    pub fn fail_on(&self, operation: &str) {
        self.state.lock().unwrap().failures.insert(operation.to_string(), Failure::Runtime);
    }

    /// Make `operation` drop its target and report it missing, as if removed concurrently.
    pub fn vanish_on(&self, operation: &str) {
        self.state.lock().unwrap().failures.insert(operation.to_string(), Failure::NotFound);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that change runtime state.
    pub fn mutations(&self) -> Vec<String> {
        const READ_ONLY: [&str; 7] =
            ["ping", "list_containers", "list_networks", "list_volumes", "inspect_network", "inspect_volume", "image_exists"];
        self.calls().into_iter().filter(|c| !READ_ONLY.iter().any(|op| c.split(' ').next() == Some(*op))).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn containers(&self) -> Vec<MockContainer> {
        self.state.lock().unwrap().containers.values().cloned().collect()
    }

    pub fn container(&self, name: &str) -> Option<MockContainer> {
        self.state.lock().unwrap().containers.values().find(|c| c.summary.name == name).cloned()
    }

    pub fn network_names(&self) -> Vec<String> {
        self.state.lock().unwrap().networks.keys().cloned().collect()
    }

    pub fn volume_names(&self) -> Vec<String> {
        self.state.lock().unwrap().volumes.keys().cloned().collect()
    }

    pub fn images(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().images.clone()
    }

    /// Seed an unlabeled network, as created outside the engine.
    pub fn add_network(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.networks.insert(
            name.to_string(),
            NetworkSummary { id, name: name.to_string(), driver: "bridge".to_string(), labels: BTreeMap::new() },
        );
    }

    /// Seed an unlabeled volume, as created outside the engine.
    pub fn add_volume(&self, name: &str) {
        self.state.lock().unwrap().volumes.insert(
            name.to_string(),
            VolumeSummary { name: name.to_string(), driver: "local".to_string(), labels: BTreeMap::new() },
        );
    }

    /// Seed a container directly, bypassing creation.
    pub fn add_container(
        &self,
        name: &str,
        labels: BTreeMap<String, String>,
        running: bool,
        networks: &[&str],
    ) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let container = MockContainer {
            summary: ContainerSummary {
                id: id.clone(),
                name: name.to_string(),
                image: "seeded:latest".to_string(),
                labels,
                running,
                networks: BTreeSet::new(),
            },
            spec: None,
            endpoints: networks.iter().map(|n| (n.to_string(), Vec::new())).collect(),
            volumes: BTreeSet::new(),
        };
        state.containers.insert(id.clone(), container);
        id
    }

    /// Change a container's recorded labels in place.
    pub fn set_label(&self, name: &str, key: &str, value: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state.containers.values_mut().find(|c| c.summary.name == name) {
            c.summary.labels.insert(key.to_string(), value.to_string());
        }
    }

    fn begin(&self, operation: &str, target: &str) -> Result<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{} {}", operation, target).trim_end().to_string());
        if state.unreachable {
            return Err(BerthError::Connectivity { reason: "connection refused".to_string() });
        }
        match state.failures.get(operation).copied() {
            Some(Failure::Runtime) => {
                return Err(BerthError::Runtime {
                    operation: operation.to_string(),
                    reason: "injected failure".to_string(),
                })
            }
            Some(Failure::NotFound) => {
                state.containers.retain(|id, c| id != target && c.summary.name != target);
                state.networks.retain(|_, n| n.id != target && n.name != target);
                state.volumes.remove(target);
                return Err(BerthError::NotFound { kind: ResourceKind::Container, name: target.to_string() });
            }
            None => {}
        }
        Ok(state)
    }
}

fn not_found(kind: ResourceKind, name: &str) -> BerthError {
    BerthError::NotFound { kind, name: name.to_string() }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn ping(&self) -> Result<()> {
        self.begin("ping", "").map(|_| ())
    }

    async fn list_containers(&self, filter: &LabelFilter) -> Result<Vec<ContainerSummary>> {
        let state = self.begin("list_containers", "")?;
        Ok(state
            .containers
            .values()
            .filter(|c| filter.matches(&c.summary.labels))
            .map(|c| ContainerSummary { networks: c.endpoints.keys().cloned().collect(), ..c.summary.clone() })
            .collect())
    }

    async fn list_networks(&self, filter: &LabelFilter) -> Result<Vec<NetworkSummary>> {
        let state = self.begin("list_networks", "")?;
        Ok(state.networks.values().filter(|n| filter.matches(&n.labels)).cloned().collect())
    }

    async fn list_volumes(&self, filter: &LabelFilter) -> Result<Vec<VolumeSummary>> {
        let state = self.begin("list_volumes", "")?;
        Ok(state.volumes.values().filter(|v| filter.matches(&v.labels)).cloned().collect())
    }

    async fn inspect_network(&self, name: &str) -> Result<Option<NetworkSummary>> {
        let state = self.begin("inspect_network", name)?;
        Ok(state.find_network(name).and_then(|n| state.networks.get(&n).cloned()))
    }

    async fn inspect_volume(&self, name: &str) -> Result<Option<VolumeSummary>> {
        let state = self.begin("inspect_volume", name)?;
        Ok(state.volumes.get(name).cloned())
    }

    async fn create_network(&self, spec: &NetworkSpec) -> Result<String> {
        let mut state = self.begin("create_network", &spec.name)?;
        if state.networks.contains_key(&spec.name) {
            return Err(BerthError::Runtime {
                operation: "create_network".to_string(),
                reason: format!("network with name {} already exists", spec.name),
            });
        }
        let id = state.next_id();
        state.networks.insert(
            spec.name.clone(),
            NetworkSummary { id: id.clone(), name: spec.name.clone(), driver: spec.driver.clone(), labels: spec.labels.clone() },
        );
        Ok(id)
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeSummary> {
        let mut state = self.begin("create_volume", &spec.name)?;
        let summary = VolumeSummary {
            name: spec.name.clone(),
            driver: spec.driver.clone().unwrap_or_else(|| "local".to_string()),
            labels: spec.labels.clone(),
        };
        state.volumes.insert(spec.name.clone(), summary.clone());
        Ok(summary)
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        let mut state = self.begin("remove_network", id)?;
        let name = state.find_network(id).ok_or_else(|| not_found(ResourceKind::Network, id))?;
        if state.containers.values().any(|c| c.endpoints.contains_key(&name)) {
            return Err(BerthError::ResourceInUse {
                kind: ResourceKind::Network,
                name,
                reason: "network has active endpoints".to_string(),
            });
        }
        state.networks.remove(&name);
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        let mut state = self.begin("remove_volume", name)?;
        if !state.volumes.contains_key(name) {
            return Err(not_found(ResourceKind::Volume, name));
        }
        if state.containers.values().any(|c| c.volumes.contains(name)) {
            return Err(BerthError::ResourceInUse {
                kind: ResourceKind::Volume,
                name: name.to_string(),
                reason: "volume is in use".to_string(),
            });
        }
        state.volumes.remove(name);
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        let state = self.begin("image_exists", image)?;
        Ok(state.images.contains("*") || state.images.contains(image))
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let mut state = self.begin("pull_image", image)?;
        state.images.insert(image.to_string());
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let mut state = self.begin("create_container", &spec.name)?;
        if state.containers.values().any(|c| c.summary.name == spec.name) {
            return Err(BerthError::Runtime {
                operation: "create_container".to_string(),
                reason: format!("Conflict. The container name \"/{}\" is already in use", spec.name),
            });
        }
        if !state.images.contains("*") && !state.images.contains(&spec.image) {
            return Err(not_found(ResourceKind::Container, &format!("image {}", spec.image)));
        }

        let mut endpoints = BTreeMap::new();
        if let Some(endpoint) = &spec.primary_endpoint {
            if state.find_network(&endpoint.network).is_none() {
                return Err(not_found(ResourceKind::Network, &endpoint.network));
            }
            endpoints.insert(endpoint.network.clone(), endpoint.aliases.clone());
        }

        let mut volumes = BTreeSet::new();
        for mount in &spec.host.mounts {
            if let MountSpec::Volume { source: Some(source), .. } = mount {
                if !state.volumes.contains_key(source) {
                    state.volumes.insert(
                        source.clone(),
                        VolumeSummary { name: source.clone(), driver: "local".to_string(), labels: BTreeMap::new() },
                    );
                }
                volumes.insert(source.clone());
            }
        }

        let id = state.next_id();
        state.containers.insert(
            id.clone(),
            MockContainer {
                summary: ContainerSummary {
                    id: id.clone(),
                    name: spec.name.clone(),
                    image: spec.image.clone(),
                    labels: spec.labels.clone(),
                    running: false,
                    networks: BTreeSet::new(),
                },
                spec: Some(spec.clone()),
                endpoints,
                volumes,
            },
        );
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let mut state = self.begin("start_container", id)?;
        let key = state.find_container(id).ok_or_else(|| not_found(ResourceKind::Container, id))?;
        if let Some(c) = state.containers.get_mut(&key) {
            c.summary.running = true;
        }
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        let mut state = self.begin("stop_container", id)?;
        let key = state.find_container(id).ok_or_else(|| not_found(ResourceKind::Container, id))?;
        if let Some(c) = state.containers.get_mut(&key) {
            c.summary.running = false;
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let mut state = self.begin("remove_container", id)?;
        let key = state.find_container(id).ok_or_else(|| not_found(ResourceKind::Container, id))?;
        if state.containers.get(&key).is_some_and(|c| c.summary.running) {
            return Err(BerthError::Runtime {
                operation: "remove_container".to_string(),
                reason: "cannot remove a running container".to_string(),
            });
        }
        state.containers.remove(&key);
        Ok(())
    }

    async fn connect_network(&self, network: &str, container_id: &str, endpoint: &EndpointSpec) -> Result<()> {
        let mut state = self.begin("connect_network", network)?;
        let name = state.find_network(network).ok_or_else(|| not_found(ResourceKind::Network, network))?;
        let key = state.find_container(container_id).ok_or_else(|| not_found(ResourceKind::Container, container_id))?;
        if let Some(c) = state.containers.get_mut(&key) {
            c.endpoints.insert(name, endpoint.aliases.clone());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Progress reporter that keeps every event.
#[derive(Debug, Default)]
pub struct CollectingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingProgress {
    pub fn lines(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(ToString::to_string).collect()
    }
}

impl ProgressReporter for CollectingProgress {
    fn report(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Write `yaml` as `compose.yaml` under `dir` and return its path.
pub fn write_compose(dir: &Path, yaml: &str) -> std::path::PathBuf {
    let path = dir.join("compose.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}
