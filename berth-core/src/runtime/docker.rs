//! Docker Engine runtime.
//!
//! Implements [`ContainerRuntime`] over the Docker Engine API using bollard.
//! Runtime-neutral specs are mapped onto the engine's request models here and
//! nowhere else.

use super::ContainerRuntime;
use crate::config::Config as BerthConfig;
use crate::error::{BerthError, Result};
use crate::types::{
    BindPropagation, ContainerSpec, ContainerSummary, EndpointSpec, HostSpec, LabelFilter, MountSpec,
    NetworkSpec, NetworkSummary, ResourceKind, RestartPolicy, VolumeSpec, VolumeSummary,
};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, NetworkingConfig, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::{
    EndpointSettings, HostConfig, HostConfigIsolationEnum, Ipam, IpamConfig, Mount, MountBindOptions,
    MountBindOptionsPropagationEnum, MountTmpfsOptions, MountTypeEnum, MountVolumeOptions,
    PortBinding as DockerPortBinding, RestartPolicy as DockerRestartPolicy, RestartPolicyNameEnum,
};
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions, InspectNetworkOptions, ListNetworksOptions};
use bollard::volume::{CreateVolumeOptions, ListVolumesOptions, RemoveVolumeOptions};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::StreamExt;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

/// Request timeout for engine connections, in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Docker Engine runtime.
pub struct DockerRuntime {
    docker: Docker,
    stop_timeout: i64,
}

impl DockerRuntime {
    /// Connect using `config.docker_host`, or the local defaults (`DOCKER_HOST`,
    /// then the platform socket) when unset.
    ///
    /// Connecting does not contact the engine; the first request does.
    #[instrument(skip(config))]
    pub fn connect(config: &BerthConfig) -> Result<Self> {
        let docker = match config.docker_host.as_deref() {
            Some(host) if host.starts_with("unix://") => Docker::connect_with_socket(
                host.trim_start_matches("unix://"),
                CONNECT_TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            ),
            Some(host) if host.starts_with("tcp://") || host.starts_with("http://") => {
                Docker::connect_with_http(host, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            Some(host) => {
                return Err(BerthError::InvalidConfig {
                    reason: format!("unsupported docker_host scheme: {}", host),
                })
            }
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| BerthError::Connectivity { reason: e.to_string() })?;

        debug!(stop_timeout = config.stop_timeout_secs, "Docker client configured");
        Ok(Self::with_client(docker, config.stop_timeout_secs as i64))
    }

    /// Wrap an existing client.
    pub fn with_client(docker: Docker, stop_timeout: i64) -> Self {
        Self { docker, stop_timeout }
    }
}

/// Map an engine error for `operation` on resource `kind`/`name`.
fn map_error(err: DockerError, operation: &str, kind: ResourceKind, name: &str) -> BerthError {
    match err {
        DockerError::DockerResponseServerError { status_code: 404, .. } => {
            BerthError::NotFound { kind, name: name.to_string() }
        }
        DockerError::DockerResponseServerError { status_code: 403 | 409, message }
            if operation.starts_with("remove") =>
        {
            BerthError::ResourceInUse { kind, name: name.to_string(), reason: message }
        }
        DockerError::DockerResponseServerError { status_code, message } => BerthError::Runtime {
            operation: operation.to_string(),
            reason: format!("{} (status {})", message, status_code),
        },
        err @ (DockerError::RequestTimeoutError
        | DockerError::IOError { .. }
        | DockerError::HyperResponseError { .. }) => BerthError::Connectivity { reason: err.to_string() },
        other => BerthError::Runtime { operation: operation.to_string(), reason: other.to_string() },
    }
}

fn label_filters(filter: &LabelFilter) -> HashMap<String, Vec<String>> {
    HashMap::from([("label".to_string(), filter.to_expressions())])
}

fn to_btree(labels: Option<HashMap<String, String>>) -> BTreeMap<String, String> {
    labels.unwrap_or_default().into_iter().collect()
}

/// Append `:latest` when the reference names neither a tag nor a digest.
fn with_default_tag(image: &str) -> String {
    let last = image.rsplit('/').next().unwrap_or(image);
    if last.contains(':') || last.contains('@') {
        image.to_string()
    } else {
        format!("{}:latest", image)
    }
}

fn to_restart_policy(policy: RestartPolicy) -> DockerRestartPolicy {
    let (name, maximum_retry_count) = match policy {
        RestartPolicy::No => (RestartPolicyNameEnum::NO, None),
        RestartPolicy::Always => (RestartPolicyNameEnum::ALWAYS, None),
        RestartPolicy::UnlessStopped => (RestartPolicyNameEnum::UNLESS_STOPPED, None),
        RestartPolicy::OnFailure { max_retries } => (RestartPolicyNameEnum::ON_FAILURE, max_retries),
    };
    DockerRestartPolicy { name: Some(name), maximum_retry_count }
}

fn to_propagation(propagation: BindPropagation) -> MountBindOptionsPropagationEnum {
    match propagation {
        BindPropagation::Private => MountBindOptionsPropagationEnum::PRIVATE,
        BindPropagation::Rprivate => MountBindOptionsPropagationEnum::RPRIVATE,
        BindPropagation::Shared => MountBindOptionsPropagationEnum::SHARED,
        BindPropagation::Rshared => MountBindOptionsPropagationEnum::RSHARED,
        BindPropagation::Slave => MountBindOptionsPropagationEnum::SLAVE,
        BindPropagation::Rslave => MountBindOptionsPropagationEnum::RSLAVE,
    }
}

fn to_mount(mount: &MountSpec) -> Mount {
    match mount {
        MountSpec::Bind { source, target, read_only, propagation } => Mount {
            typ: Some(MountTypeEnum::BIND),
            source: Some(source.to_string_lossy().to_string()),
            target: Some(target.clone()),
            read_only: Some(*read_only),
            bind_options: (*propagation).map(|p| MountBindOptions {
                propagation: Some(to_propagation(p)),
                ..Default::default()
            }),
            ..Default::default()
        },
        MountSpec::Volume { source, target, read_only, no_copy } => Mount {
            typ: Some(MountTypeEnum::VOLUME),
            source: source.clone(),
            target: Some(target.clone()),
            read_only: Some(*read_only),
            volume_options: (*no_copy)
                .then(|| MountVolumeOptions { no_copy: Some(true), ..Default::default() }),
            ..Default::default()
        },
        MountSpec::Tmpfs { target, size_bytes } => Mount {
            typ: Some(MountTypeEnum::TMPFS),
            target: Some(target.clone()),
            tmpfs_options: (*size_bytes)
                .map(|size| MountTmpfsOptions { size_bytes: Some(size), ..Default::default() }),
            ..Default::default()
        },
    }
}

fn to_isolation(isolation: &str) -> Result<HostConfigIsolationEnum> {
    match isolation {
        "default" => Ok(HostConfigIsolationEnum::DEFAULT),
        "process" => Ok(HostConfigIsolationEnum::PROCESS),
        "hyperv" => Ok(HostConfigIsolationEnum::HYPERV),
        other => Err(BerthError::Runtime {
            operation: "create_container".to_string(),
            reason: format!("unsupported isolation: {}", other),
        }),
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

fn to_host_config(host: &HostSpec) -> Result<HostConfig> {
    let port_bindings: HashMap<String, Option<Vec<DockerPortBinding>>> = host
        .port_bindings
        .iter()
        .map(|(key, bindings)| {
            let bindings = bindings
                .iter()
                .map(|b| DockerPortBinding { host_ip: b.host_ip.clone(), host_port: b.host_port.clone() })
                .collect();
            (key.to_string(), Some(bindings))
        })
        .collect();

    Ok(HostConfig {
        network_mode: host.network_mode.clone(),
        restart_policy: Some(to_restart_policy(host.restart_policy)),
        cap_add: non_empty(&host.cap_add),
        cap_drop: non_empty(&host.cap_drop),
        dns: non_empty(&host.dns),
        dns_search: non_empty(&host.dns_search),
        extra_hosts: non_empty(&host.extra_hosts),
        links: non_empty(&host.links),
        ipc_mode: host.ipc_mode.clone(),
        pid_mode: host.pid_mode.clone(),
        userns_mode: host.userns_mode.clone(),
        privileged: Some(host.privileged),
        readonly_rootfs: Some(host.readonly_rootfs),
        security_opt: non_empty(&host.security_opt),
        shm_size: host.shm_size,
        sysctls: (!host.sysctls.is_empty())
            .then(|| host.sysctls.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        isolation: host.isolation.as_deref().map(to_isolation).transpose()?,
        init: host.init,
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        mounts: (!host.mounts.is_empty()).then(|| host.mounts.iter().map(to_mount).collect()),
        memory: host.memory,
        nano_cpus: host.nano_cpus,
        ..Default::default()
    })
}

fn to_container_config(spec: &ContainerSpec) -> Result<Config<String>> {
    let exposed_ports: HashMap<String, HashMap<(), ()>> =
        spec.exposed_ports.iter().map(|key| (key.to_string(), HashMap::new())).collect();

    let networking_config = spec.primary_endpoint.as_ref().map(|endpoint| NetworkingConfig {
        endpoints_config: HashMap::from([(
            endpoint.network.clone(),
            EndpointSettings { aliases: non_empty(&endpoint.aliases), ..Default::default() },
        )]),
    });

    Ok(Config {
        image: Some(spec.image.clone()),
        hostname: spec.hostname.clone(),
        domainname: spec.domainname.clone(),
        user: spec.user.clone(),
        tty: Some(spec.tty),
        open_stdin: Some(spec.open_stdin),
        cmd: spec.command.clone(),
        entrypoint: spec.entrypoint.clone(),
        working_dir: spec.working_dir.clone(),
        mac_address: spec.mac_address.clone(),
        stop_signal: spec.stop_signal.clone(),
        env: non_empty(&spec.env),
        labels: Some(spec.labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        network_disabled: Some(spec.network_disabled),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        host_config: Some(to_host_config(&spec.host)?),
        networking_config,
        ..Default::default()
    })
}

fn to_create_network(spec: &NetworkSpec) -> CreateNetworkOptions<String> {
    let ipam = spec
        .ipam
        .as_ref()
        .map(|ipam| Ipam {
            driver: ipam.driver.clone(),
            config: (!ipam.pools.is_empty()).then(|| {
                ipam.pools
                    .iter()
                    .map(|pool| IpamConfig {
                        subnet: pool.subnet.clone(),
                        gateway: pool.gateway.clone(),
                        ip_range: pool.ip_range.clone(),
                        ..Default::default()
                    })
                    .collect()
            }),
            ..Default::default()
        })
        .unwrap_or_default();

    CreateNetworkOptions {
        name: spec.name.clone(),
        driver: spec.driver.clone(),
        internal: spec.internal,
        attachable: spec.attachable,
        ipam,
        options: spec.options.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        labels: spec.labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    #[instrument(skip(self))]
    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| BerthError::Connectivity { reason: e.to_string() })
    }

    #[instrument(skip(self))]
    async fn list_containers(&self, filter: &LabelFilter) -> Result<Vec<ContainerSummary>> {
        let options = ListContainersOptions::<String> {
            all: true,
            filters: label_filters(filter),
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| map_error(e, "list_containers", ResourceKind::Container, ""))?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: c.id.unwrap_or_default(),
                name: c
                    .names
                    .and_then(|names| names.into_iter().next())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                labels: to_btree(c.labels),
                running: c.state.as_deref() == Some("running"),
                networks: c
                    .network_settings
                    .and_then(|settings| settings.networks)
                    .map(|networks| networks.into_keys().collect())
                    .unwrap_or_default(),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_networks(&self, filter: &LabelFilter) -> Result<Vec<NetworkSummary>> {
        let options = ListNetworksOptions::<String> { filters: label_filters(filter) };
        let networks = self
            .docker
            .list_networks(Some(options))
            .await
            .map_err(|e| map_error(e, "list_networks", ResourceKind::Network, ""))?;

        Ok(networks
            .into_iter()
            .map(|n| NetworkSummary {
                id: n.id.unwrap_or_default(),
                name: n.name.unwrap_or_default(),
                driver: n.driver.unwrap_or_default(),
                labels: to_btree(n.labels),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_volumes(&self, filter: &LabelFilter) -> Result<Vec<VolumeSummary>> {
        let options = ListVolumesOptions::<String> { filters: label_filters(filter) };
        let response = self
            .docker
            .list_volumes(Some(options))
            .await
            .map_err(|e| map_error(e, "list_volumes", ResourceKind::Volume, ""))?;

        Ok(response
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|v| VolumeSummary { name: v.name, driver: v.driver, labels: v.labels.into_iter().collect() })
            .collect())
    }

    #[instrument(skip(self))]
    async fn inspect_network(&self, name: &str) -> Result<Option<NetworkSummary>> {
        match self.docker.inspect_network(name, None::<InspectNetworkOptions<String>>).await {
            Ok(n) => Ok(Some(NetworkSummary {
                id: n.id.unwrap_or_default(),
                name: n.name.unwrap_or_default(),
                driver: n.driver.unwrap_or_default(),
                labels: to_btree(n.labels),
            })),
            Err(e) => match map_error(e, "inspect_network", ResourceKind::Network, name) {
                BerthError::NotFound { .. } => Ok(None),
                other => Err(other),
            },
        }
    }

    #[instrument(skip(self))]
    async fn inspect_volume(&self, name: &str) -> Result<Option<VolumeSummary>> {
        match self.docker.inspect_volume(name).await {
            Ok(v) => Ok(Some(VolumeSummary {
                name: v.name,
                driver: v.driver,
                labels: v.labels.into_iter().collect(),
            })),
            Err(e) => match map_error(e, "inspect_volume", ResourceKind::Volume, name) {
                BerthError::NotFound { .. } => Ok(None),
                other => Err(other),
            },
        }
    }

    #[instrument(skip(self, spec), fields(network = %spec.name))]
    async fn create_network(&self, spec: &NetworkSpec) -> Result<String> {
        self.docker
            .create_network(to_create_network(spec))
            .await
            .map_err(|e| map_error(e, "create_network", ResourceKind::Network, &spec.name))?;

        let created = self.inspect_network(&spec.name).await?.ok_or_else(|| BerthError::NotFound {
            kind: ResourceKind::Network,
            name: spec.name.clone(),
        })?;
        info!(network_id = %created.id, "Network created");
        Ok(created.id)
    }

    #[instrument(skip(self, spec), fields(volume = %spec.name))]
    async fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeSummary> {
        let options = CreateVolumeOptions {
            name: spec.name.clone(),
            driver: spec.driver.clone().unwrap_or_else(|| "local".to_string()),
            driver_opts: spec.driver_opts.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            labels: spec.labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        };
        let volume = self
            .docker
            .create_volume(options)
            .await
            .map_err(|e| map_error(e, "create_volume", ResourceKind::Volume, &spec.name))?;
        Ok(VolumeSummary { name: volume.name, driver: volume.driver, labels: volume.labels.into_iter().collect() })
    }

    #[instrument(skip(self))]
    async fn remove_network(&self, id: &str) -> Result<()> {
        self.docker
            .remove_network(id)
            .await
            .map_err(|e| map_error(e, "remove_network", ResourceKind::Network, id))
    }

    #[instrument(skip(self))]
    async fn remove_volume(&self, name: &str) -> Result<()> {
        self.docker
            .remove_volume(name, Some(RemoveVolumeOptions { force: false }))
            .await
            .map_err(|e| map_error(e, "remove_volume", ResourceKind::Volume, name))
    }

    #[instrument(skip(self))]
    async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(DockerError::DockerResponseServerError { status_code: 404, .. }) => Ok(false),
            Err(e) => Err(map_error(e, "inspect_image", ResourceKind::Container, image)),
        }
    }

    #[instrument(skip(self))]
    async fn pull_image(&self, image: &str) -> Result<()> {
        info!("Pulling image");
        let options = CreateImageOptions { from_image: with_default_tag(image), ..Default::default() };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            let progress = progress.map_err(|e| map_error(e, "pull_image", ResourceKind::Container, image))?;
            if let Some(status) = progress.status {
                debug!(status = %status, "Pull progress");
            }
        }
        Ok(())
    }

    #[instrument(skip(self, spec), fields(container = %spec.name))]
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let options = CreateContainerOptions { name: spec.name.clone(), platform: None };
        let response = self
            .docker
            .create_container(Some(options), to_container_config(spec)?)
            .await
            .map_err(|e| map_error(e, "create_container", ResourceKind::Container, &spec.name))?;
        for warning in &response.warnings {
            debug!(warning = %warning, "Engine warning");
        }
        Ok(response.id)
    }

    #[instrument(skip(self))]
    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| map_error(e, "start_container", ResourceKind::Container, id))
    }

    #[instrument(skip(self))]
    async fn stop_container(&self, id: &str) -> Result<()> {
        match self.docker.stop_container(id, Some(StopContainerOptions { t: self.stop_timeout })).await {
            Ok(()) => Ok(()),
            // Already stopped
            Err(DockerError::DockerResponseServerError { status_code: 304, .. }) => Ok(()),
            Err(e) => Err(map_error(e, "stop_container", ResourceKind::Container, id)),
        }
    }

    #[instrument(skip(self))]
    async fn remove_container(&self, id: &str) -> Result<()> {
        self.docker
            .remove_container(id, Some(RemoveContainerOptions { force: false, ..Default::default() }))
            .await
            .map_err(|e| map_error(e, "remove_container", ResourceKind::Container, id))
    }

    #[instrument(skip(self, endpoint))]
    async fn connect_network(&self, network: &str, container_id: &str, endpoint: &EndpointSpec) -> Result<()> {
        let options = ConnectNetworkOptions {
            container: container_id.to_string(),
            endpoint_config: EndpointSettings { aliases: non_empty(&endpoint.aliases), ..Default::default() },
        };
        self.docker
            .connect_network(network, options)
            .await
            .map_err(|e| map_error(e, "connect_network", ResourceKind::Network, network))
    }

    fn name(&self) -> &str {
        "docker"
    }
}
