//! Service → runtime request translation.
//!
//! Pure functions: nothing here talks to the runtime. Every translation error
//! is a `ConfigTranslation` naming the offending service.

use crate::compose::{
    FileReference, PortDefinition, Scalar, Service, ServiceVolume, ServiceVolumeConfig,
};
use crate::error::{BerthError, Result};
use crate::paths::expand_home;
use crate::types::labels::{identity_labels, LABEL_CONFIG_HASH};
use crate::types::network::DEFAULT_NETWORK;
use crate::types::{
    BindPropagation, ContainerSpec, EndpointSpec, Fingerprint, HostSpec, IpamPool, IpamSpec, MountSpec,
    NetworkSpec, PortBinding, PortKey, Project, ProjectNetwork, ProjectVolume, Protocol, ResourceKind,
    RestartPolicy, VolumeSpec,
};
use crate::units::ram_in_bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

/// Network mode that disables networking entirely.
const NETWORK_MODE_DISABLED: &str = "disabled";

/// How a container joins its networks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkAttachment {
    /// Host network mode passed at creation
    pub mode: Option<String>,

    /// Endpoint attached at creation
    pub primary: Option<EndpointSpec>,

    /// Networks connected after start, with their declared aliases
    pub secondary: Vec<EndpointSpec>,
}

/// Creation request for a project network.
pub fn network_spec(project: &Project, network: &ProjectNetwork) -> NetworkSpec {
    let def = &network.definition;
    let mut labels = def.labels.to_map();
    labels.extend(identity_labels(&project.name, ResourceKind::Network, &network.key));

    let ipam = def.ipam.as_ref().and_then(|ipam| {
        if ipam.driver.is_none() && ipam.config.is_empty() {
            return None;
        }
        Some(IpamSpec {
            driver: ipam.driver.clone(),
            pools: ipam
                .config
                .iter()
                .map(|pool| IpamPool {
                    subnet: pool.subnet.clone(),
                    gateway: pool.gateway.clone(),
                    ip_range: pool.ip_range.clone(),
                })
                .collect(),
        })
    });

    NetworkSpec {
        name: network.name.clone(),
        driver: def
            .driver
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| crate::types::network::DEFAULT_NETWORK_DRIVER.to_string()),
        internal: def.internal,
        attachable: def.attachable,
        options: def.driver_opts.clone(),
        labels,
        ipam,
    }
}

/// Creation request for a project volume.
pub fn volume_spec(project: &Project, volume: &ProjectVolume) -> VolumeSpec {
    let def = &volume.definition;
    let mut labels = def.labels.to_map();
    labels.extend(identity_labels(&project.name, ResourceKind::Volume, &volume.key));

    VolumeSpec {
        name: volume.name.clone(),
        driver: def.driver.clone().filter(|d| !d.is_empty()),
        driver_opts: def.driver_opts.clone(),
        labels,
    }
}

/// Translate service `name` into a container creation request.
pub fn container_spec(
    project: &Project,
    name: &str,
    service: &Service,
    fingerprint: &Fingerprint,
) -> Result<ContainerSpec> {
    let mut labels = service.labels.to_map();
    labels.extend(identity_labels(&project.name, ResourceKind::Container, name));
    labels.insert(LABEL_CONFIG_HASH.to_string(), fingerprint.to_string());

    let (exposed_ports, port_bindings) = ports(name, &service.ports)?;

    let mut mounts = volume_mounts(project, name, service)?;
    mounts.extend(file_mounts(project, name, &service.configs, FileKind::Config)?);
    mounts.extend(file_mounts(project, name, &service.secrets, FileKind::Secret)?);

    let attachment = network_attachment(project, name, service)?;

    let host = HostSpec {
        network_mode: attachment.mode.clone(),
        restart_policy: restart_policy(name, service.restart.as_deref())?,
        cap_add: service.cap_add.clone(),
        cap_drop: service.cap_drop.clone(),
        dns: service.dns.to_vec(),
        dns_search: service.dns_search.to_vec(),
        extra_hosts: service.extra_hosts.clone(),
        links: service.links.clone(),
        ipc_mode: service.ipc.clone(),
        pid_mode: service.pid.clone(),
        userns_mode: service.userns_mode.clone(),
        privileged: service.privileged,
        readonly_rootfs: service.read_only,
        security_opt: service.security_opt.clone(),
        shm_size: service.shm_size.as_ref().map(|size| size_bytes(name, "shm_size", size)).transpose()?,
        sysctls: service.sysctls.to_map(),
        isolation: service.isolation.clone(),
        init: service.init,
        port_bindings,
        mounts,
        memory: memory_limit(name, service)?,
        nano_cpus: nano_cpus(name, service)?,
    };

    Ok(ContainerSpec {
        name: project.container_name(name),
        image: service.image.clone(),
        hostname: service.hostname.clone(),
        domainname: service.domainname.clone(),
        user: service.user.clone(),
        tty: service.tty,
        open_stdin: service.stdin_open,
        command: argv(name, "command", service.command.as_ref())?,
        entrypoint: argv(name, "entrypoint", service.entrypoint.as_ref())?,
        working_dir: service.working_dir.clone(),
        mac_address: service.mac_address.clone(),
        stop_signal: service.stop_signal.clone(),
        env: service.environment.to_env_list(),
        labels,
        network_disabled: service.network_mode.as_deref() == Some(NETWORK_MODE_DISABLED),
        exposed_ports,
        host,
        primary_endpoint: attachment.primary,
    })
}

fn argv(
    service: &str,
    field: &str,
    command: Option<&crate::compose::ShellCommand>,
) -> Result<Option<Vec<String>>> {
    command
        .map(|c| {
            c.to_argv()
                .ok_or_else(|| BerthError::translation(service, format!("{}: unbalanced quotes", field)))
        })
        .transpose()
}

fn restart_policy(service: &str, restart: Option<&str>) -> Result<RestartPolicy> {
    match restart {
        None => Ok(RestartPolicy::No),
        Some(policy) => policy.parse().map_err(|e: String| BerthError::translation(service, e)),
    }
}

fn memory_limit(service_name: &str, service: &Service) -> Result<Option<i64>> {
    let memory = service
        .deploy
        .as_ref()
        .and_then(|d| d.resources.as_ref())
        .and_then(|r| r.limits.as_ref())
        .and_then(|l| l.memory.as_ref());
    memory.map(|m| size_bytes(service_name, "memory", m)).transpose()
}

/// Byte count from an integer or a human size expression.
fn size_bytes(service: &str, field: &str, value: &Scalar) -> Result<i64> {
    match value {
        Scalar::Int(n) if *n >= 0 => Ok(*n),
        Scalar::String(s) => {
            ram_in_bytes(s).map_err(|e| BerthError::translation(service, format!("{}: {}", field, e)))
        }
        other => Err(BerthError::translation(service, format!("{}: invalid size '{}'", field, other))),
    }
}

fn nano_cpus(service_name: &str, service: &Service) -> Result<Option<i64>> {
    let cpus = service
        .deploy
        .as_ref()
        .and_then(|d| d.resources.as_ref())
        .and_then(|r| r.limits.as_ref())
        .and_then(|l| l.cpus.as_ref());
    let Some(cpus) = cpus else {
        return Ok(None);
    };
    let value = match cpus {
        Scalar::Int(n) => *n as f64,
        Scalar::Float(x) => *x,
        Scalar::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| BerthError::translation(service_name, format!("cpus: invalid value '{}'", s)))?,
        Scalar::Bool(_) => {
            return Err(BerthError::translation(service_name, "cpus: expected a number"));
        }
    };
    if value < 0.0 {
        return Err(BerthError::translation(service_name, "cpus: must not be negative"));
    }
    Ok(Some((value * 1e9) as i64))
}

type PortTable = (BTreeSet<PortKey>, BTreeMap<PortKey, Vec<PortBinding>>);

/// Exposed ports and host bindings for every declared port.
fn ports(service: &str, declared: &[PortDefinition]) -> Result<PortTable> {
    let mut exposed = BTreeSet::new();
    let mut bindings: BTreeMap<PortKey, Vec<PortBinding>> = BTreeMap::new();

    for port in declared {
        for (key, binding) in port_entries(service, port)? {
            exposed.insert(key);
            bindings.entry(key).or_default().push(binding);
        }
    }
    Ok((exposed, bindings))
}

fn port_entries(service: &str, port: &PortDefinition) -> Result<Vec<(PortKey, PortBinding)>> {
    match port {
        PortDefinition::Number(target) => {
            Ok(vec![(PortKey { port: *target, protocol: Protocol::Tcp }, PortBinding::default())])
        }
        PortDefinition::Long(cfg) => {
            let protocol = parse_protocol(service, cfg.protocol.as_deref().unwrap_or("tcp"))?;
            let binding = PortBinding {
                host_ip: cfg.host_ip.clone().filter(|ip| !ip.is_empty()),
                host_port: cfg.published.as_ref().map(|p| p.to_string()).filter(|p| !p.is_empty()),
            };
            Ok(vec![(PortKey { port: cfg.target, protocol }, binding)])
        }
        PortDefinition::Short(spec) => short_port(service, spec),
    }
}

/// Parse `[ip:][host:]target[/proto]`, where `host` and `target` may be ranges.
fn short_port(service: &str, spec: &str) -> Result<Vec<(PortKey, PortBinding)>> {
    let invalid = || BerthError::translation(service, format!("invalid port '{}'", spec));

    let (addr, protocol) = match spec.rsplit_once('/') {
        Some((addr, proto)) => (addr, parse_protocol(service, proto)?),
        None => (spec, Protocol::Tcp),
    };

    let mut parts = addr.rsplitn(3, ':');
    let target = parts.next().filter(|t| !t.is_empty()).ok_or_else(invalid)?;
    let host = parts.next().filter(|h| !h.is_empty());
    let host_ip = parts
        .next()
        .map(|ip| ip.trim_start_matches('[').trim_end_matches(']').to_string())
        .filter(|ip| !ip.is_empty());

    let (start, end) = port_range(target).ok_or_else(invalid)?;
    let targets: Vec<u16> = (start..=end).collect();

    let host_ports: Vec<Option<String>> = match host {
        None => vec![None; targets.len()],
        Some(host) => {
            let (host_start, host_end) = port_range(host).ok_or_else(invalid)?;
            if targets.len() == 1 {
                vec![Some(host.to_string())]
            } else if (host_end - host_start) as usize + 1 == targets.len() {
                (host_start..=host_end).map(|p| Some(p.to_string())).collect()
            } else {
                return Err(invalid());
            }
        }
    };

    Ok(targets
        .into_iter()
        .zip(host_ports)
        .map(|(port, host_port)| {
            (PortKey { port, protocol }, PortBinding { host_ip: host_ip.clone(), host_port })
        })
        .collect())
}

fn port_range(s: &str) -> Option<(u16, u16)> {
    match s.split_once('-') {
        Some((a, b)) => {
            let (a, b) = (a.parse::<u16>().ok()?, b.parse::<u16>().ok()?);
            (a <= b).then_some((a, b))
        }
        None => s.parse::<u16>().ok().map(|p| (p, p)),
    }
}

fn parse_protocol(service: &str, proto: &str) -> Result<Protocol> {
    proto.parse().map_err(|e: String| BerthError::translation(service, e))
}

/// Lexically normalize `path`: drop `.` components and resolve `..`.
pub(crate) fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !path.is_absolute() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Absolute host path for a bind source.
fn bind_source(project: &Project, source: &str) -> PathBuf {
    let expanded = expand_home(source);
    if expanded.is_absolute() {
        clean_path(&expanded)
    } else {
        clean_path(&project.working_dir.join(expanded))
    }
}

fn is_path_like(source: &str) -> bool {
    source.starts_with('.') || source.starts_with('/') || source.starts_with('~')
}

fn volume_source(project: &Project, source: &str) -> String {
    project.volume(source).map(|v| v.name).unwrap_or_else(|| source.to_string())
}

fn volume_mounts(project: &Project, service_name: &str, service: &Service) -> Result<Vec<MountSpec>> {
    service
        .volumes
        .iter()
        .map(|volume| match volume {
            ServiceVolume::Short(spec) => short_mount(project, service_name, spec),
            ServiceVolume::Long(cfg) => long_mount(project, service_name, cfg),
        })
        .collect()
}

/// Parse `target`, `source:target` or `source:target:mode`.
fn short_mount(project: &Project, service: &str, spec: &str) -> Result<MountSpec> {
    let parts: Vec<&str> = spec.split(':').collect();
    let (source, target, mode) = match parts.as_slice() {
        [target] => (None, *target, ""),
        [source, target] => (Some(*source), *target, ""),
        [source, target, mode] => (Some(*source), *target, *mode),
        _ => return Err(BerthError::translation(service, format!("invalid volume '{}'", spec))),
    };
    if target.is_empty() {
        return Err(BerthError::translation(service, format!("invalid volume '{}'", spec)));
    }

    let mut read_only = false;
    let mut no_copy = false;
    let mut propagation = None;
    for option in mode.split(',').filter(|o| !o.is_empty()) {
        match option {
            "ro" => read_only = true,
            "rw" => read_only = false,
            "nocopy" => no_copy = true,
            // SELinux relabeling is a runtime concern
            "z" | "Z" => {}
            other => {
                propagation = Some(other.parse::<BindPropagation>().map_err(|_| {
                    BerthError::translation(service, format!("invalid volume mode '{}' in '{}'", other, spec))
                })?)
            }
        }
    }

    Ok(match source {
        Some(source) if is_path_like(source) => MountSpec::Bind {
            source: bind_source(project, source),
            target: target.to_string(),
            read_only,
            propagation,
        },
        Some(source) => MountSpec::Volume {
            source: Some(volume_source(project, source)),
            target: target.to_string(),
            read_only,
            no_copy,
        },
        None => MountSpec::Volume { source: None, target: target.to_string(), read_only, no_copy },
    })
}

fn long_mount(project: &Project, service: &str, cfg: &ServiceVolumeConfig) -> Result<MountSpec> {
    let source = cfg.source.as_deref().filter(|s| !s.is_empty());
    match cfg.kind.as_str() {
        "bind" => {
            let source = source.ok_or_else(|| {
                BerthError::translation(service, format!("bind mount on '{}' has no source", cfg.target))
            })?;
            let propagation = cfg
                .bind
                .as_ref()
                .and_then(|b| b.propagation.as_deref())
                .map(|p| p.parse::<BindPropagation>().map_err(|e| BerthError::translation(service, e)))
                .transpose()?;
            Ok(MountSpec::Bind {
                source: bind_source(project, source),
                target: cfg.target.clone(),
                read_only: cfg.read_only,
                propagation,
            })
        }
        "volume" => Ok(MountSpec::Volume {
            source: source.map(|s| volume_source(project, s)),
            target: cfg.target.clone(),
            read_only: cfg.read_only,
            no_copy: cfg.volume.as_ref().map(|v| v.nocopy).unwrap_or(false),
        }),
        "tmpfs" => {
            let size_bytes = cfg
                .tmpfs
                .as_ref()
                .and_then(|t| t.size.as_ref())
                .map(|size| size_bytes(service, "tmpfs size", size))
                .transpose()?;
            Ok(MountSpec::Tmpfs { target: cfg.target.clone(), size_bytes })
        }
        other => Err(BerthError::translation(service, format!("unsupported mount type '{}'", other))),
    }
}

#[derive(Debug, Clone, Copy)]
enum FileKind {
    Config,
    Secret,
}

/// Read-only bind mounts for config or secret references.
fn file_mounts(
    project: &Project,
    service: &str,
    references: &[FileReference],
    kind: FileKind,
) -> Result<Vec<MountSpec>> {
    references
        .iter()
        .map(|reference| {
            let name = reference.source();
            let (file, label) = match kind {
                FileKind::Config => (project.bindings.config(name), "config"),
                FileKind::Secret => (project.bindings.secret(name), "secret"),
            };
            let file = file.ok_or_else(|| {
                BerthError::translation(service, format!("couldn't find {} reference '{}'", label, name))
            })?;

            let target = match reference.target() {
                Some(target) if !target.is_empty() => target.to_string(),
                _ => clean_path(&Path::new("/").join(file)).to_string_lossy().to_string(),
            };
            Ok(MountSpec::Bind { source: bind_source(project, file), target, read_only: true, propagation: None })
        })
        .collect()
}

/// Select the creation-time network and the networks connected after start.
pub fn network_attachment(project: &Project, name: &str, service: &Service) -> Result<NetworkAttachment> {
    if let Some(mode) = service.network_mode.as_deref().filter(|m| !m.is_empty()) {
        return Ok(NetworkAttachment { mode: Some(mode.to_string()), ..Default::default() });
    }

    if project.networks().is_empty() {
        return Ok(NetworkAttachment { mode: Some("none".to_string()), ..Default::default() });
    }

    let memberships = service.networks.entries();
    let mut endpoints = Vec::with_capacity(memberships.len().max(1));
    if memberships.is_empty() {
        let network = project.default_network().ok_or_else(|| {
            BerthError::translation(name, format!("service refers to undefined network '{}'", DEFAULT_NETWORK))
        })?;
        endpoints.push(EndpointSpec { network: network.name, aliases: Vec::new() });
    }
    for (key, aliases) in memberships {
        let network = project.network(&key).ok_or_else(|| {
            BerthError::translation(name, format!("service refers to undefined network '{}'", key))
        })?;
        endpoints.push(EndpointSpec { network: network.name, aliases });
    }

    let mut endpoints = endpoints.into_iter();
    let primary = endpoints.next().map(|endpoint| {
        let mut aliases = vec![name.to_string()];
        aliases.extend(endpoint.aliases);
        EndpointSpec { network: endpoint.network, aliases }
    });

    Ok(NetworkAttachment {
        mode: primary.as_ref().map(|p| p.network.clone()),
        primary,
        secondary: endpoints.collect(),
    })
}

/// Aliases for a network connected after start: service name, short id, declared aliases.
pub fn secondary_aliases(service: &str, container_id: &str, declared: &[String]) -> Vec<String> {
    let mut aliases = vec![service.to_string(), crate::types::short_id(container_id).to_string()];
    aliases.extend(declared.iter().cloned());
    aliases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::ComposeParser;

    fn project(yaml: &str) -> Project {
        let compose = ComposeParser::parse(yaml).unwrap();
        Project::from_compose(compose, PathBuf::from("/srv/shop"), None).unwrap()
    }

    fn spec(yaml: &str, service: &str) -> Result<ContainerSpec> {
        let p = project(yaml);
        let svc = p.compose.services[service].clone();
        let fp = Fingerprint::of(service, &svc).unwrap();
        container_spec(&p, service, &svc, &fp)
    }

    #[test]
    fn test_identity_and_process_fields() {
        let yaml = r#"
services:
  web:
    image: nginx:1.25
    hostname: web01
    user: "101"
    tty: true
    command: nginx -g "daemon off;"
    entrypoint: ["/docker-entrypoint.sh"]
    environment:
      B: "2"
      A: "1"
    labels:
      tier: frontend
    stop_signal: SIGQUIT
"#;
        let spec = spec(yaml, "web").unwrap();
        assert_eq!(spec.name, "shop_web_1");
        assert_eq!(spec.image, "nginx:1.25");
        assert_eq!(spec.hostname.as_deref(), Some("web01"));
        assert_eq!(spec.user.as_deref(), Some("101"));
        assert!(spec.tty);
        assert_eq!(spec.command, Some(vec!["nginx".to_string(), "-g".to_string(), "daemon off;".to_string()]));
        assert_eq!(spec.entrypoint, Some(vec!["/docker-entrypoint.sh".to_string()]));
        assert_eq!(spec.env, vec!["A=1", "B=2"]);
        assert_eq!(spec.stop_signal.as_deref(), Some("SIGQUIT"));
        assert!(!spec.network_disabled);

        assert_eq!(spec.labels.get("tier").map(String::as_str), Some("frontend"));
        assert_eq!(spec.labels.get("io.compose-spec.project").map(String::as_str), Some("shop"));
        assert_eq!(spec.labels.get("io.compose-spec.service").map(String::as_str), Some("web"));
        assert_eq!(spec.labels.get("io.compose-spec.kind").map(String::as_str), Some("container"));
        assert!(spec.labels.contains_key(LABEL_CONFIG_HASH));
    }

    #[test]
    fn test_host_fields() {
        let yaml = r#"
services:
  app:
    image: app
    restart: on-failure:5
    cap_add: [NET_ADMIN]
    cap_drop: [ALL]
    dns: 8.8.8.8
    dns_search: [example.com]
    privileged: true
    read_only: true
    shm_size: 64m
    sysctls:
      net.core.somaxconn: 1024
    init: true
    deploy:
      resources:
        limits:
          cpus: "1.5"
          memory: 512m
"#;
        let host = spec(yaml, "app").unwrap().host;
        assert_eq!(host.restart_policy, RestartPolicy::OnFailure { max_retries: Some(5) });
        assert_eq!(host.cap_add, vec!["NET_ADMIN"]);
        assert_eq!(host.cap_drop, vec!["ALL"]);
        assert_eq!(host.dns, vec!["8.8.8.8"]);
        assert_eq!(host.dns_search, vec!["example.com"]);
        assert!(host.privileged);
        assert!(host.readonly_rootfs);
        assert_eq!(host.shm_size, Some(67_108_864));
        assert_eq!(host.sysctls.get("net.core.somaxconn").map(String::as_str), Some("1024"));
        assert_eq!(host.init, Some(true));
        assert_eq!(host.memory, Some(512 * 1024 * 1024));
        assert_eq!(host.nano_cpus, Some(1_500_000_000));
    }

    #[test]
    fn test_invalid_restart_policy() {
        let yaml = "services:\n  app:\n    image: app\n    restart: sometimes\n";
        let err = spec(yaml, "app").unwrap_err();
        assert!(matches!(err, BerthError::ConfigTranslation { ref service, .. } if service == "app"));
    }

    #[test]
    fn test_malformed_shm_size() {
        let yaml = "services:\n  app:\n    image: app\n    shm_size: lots\n";
        let err = spec(yaml, "app").unwrap_err();
        assert!(matches!(err, BerthError::ConfigTranslation { .. }));
        assert!(err.to_string().contains("shm_size"));
    }

    #[test]
    fn test_network_disabled() {
        let yaml = "services:\n  app:\n    image: app\n    network_mode: disabled\n";
        let spec = spec(yaml, "app").unwrap();
        assert!(spec.network_disabled);
        assert_eq!(spec.host.network_mode.as_deref(), Some("disabled"));
        assert!(spec.primary_endpoint.is_none());
    }

    #[test]
    fn test_ports() {
        let yaml = r#"
services:
  web:
    image: nginx
    ports:
      - "8080:80"
      - "443"
      - "127.0.0.1:5353:53/udp"
      - "9000-9001:7000-7001"
      - target: 6379
        published: 16379
"#;
        let container = spec(yaml, "web").unwrap();
        let tcp = |port| PortKey { port, protocol: Protocol::Tcp };

        assert_eq!(container.exposed_ports.len(), 6);
        assert!(container.exposed_ports.contains(&PortKey { port: 53, protocol: Protocol::Udp }));

        let bindings = &container.host.port_bindings;
        assert_eq!(bindings[&tcp(80)][0].host_port.as_deref(), Some("8080"));
        assert_eq!(bindings[&tcp(443)][0], PortBinding::default());
        let dns = &bindings[&PortKey { port: 53, protocol: Protocol::Udp }][0];
        assert_eq!(dns.host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(dns.host_port.as_deref(), Some("5353"));
        assert_eq!(bindings[&tcp(7001)][0].host_port.as_deref(), Some("9001"));
        assert_eq!(bindings[&tcp(6379)][0].host_port.as_deref(), Some("16379"));
    }

    #[test]
    fn test_invalid_port() {
        let yaml = "services:\n  web:\n    image: nginx\n    ports:\n      - \"80:http\"\n";
        assert!(matches!(spec(yaml, "web"), Err(BerthError::ConfigTranslation { .. })));
    }

    #[test]
    fn test_mounts() {
        let yaml = r#"
services:
  db:
    image: postgres
    volumes:
      - data:/var/lib/postgresql/data
      - ./init/../sql:/docker-entrypoint-initdb.d:ro
      - /var/log
      - shared-cache:/cache:nocopy
      - type: tmpfs
        target: /run
        tmpfs:
          size: 1k
      - type: bind
        source: /etc/hosts
        target: /etc/hosts
        bind:
          propagation: rslave
volumes:
  data:
"#;
        let mounts = spec(yaml, "db").unwrap().host.mounts;
        assert_eq!(
            mounts[0],
            MountSpec::Volume {
                source: Some("shop_data".to_string()),
                target: "/var/lib/postgresql/data".to_string(),
                read_only: false,
                no_copy: false,
            }
        );
        assert_eq!(
            mounts[1],
            MountSpec::Bind {
                source: PathBuf::from("/srv/shop/sql"),
                target: "/docker-entrypoint-initdb.d".to_string(),
                read_only: true,
                propagation: None,
            }
        );
        assert_eq!(
            mounts[2],
            MountSpec::Volume { source: None, target: "/var/log".to_string(), read_only: false, no_copy: false }
        );
        assert_eq!(
            mounts[3],
            MountSpec::Volume {
                source: Some("shared-cache".to_string()),
                target: "/cache".to_string(),
                read_only: false,
                no_copy: true,
            }
        );
        assert_eq!(mounts[4], MountSpec::Tmpfs { target: "/run".to_string(), size_bytes: Some(1024) });
        assert!(matches!(
            mounts[5],
            MountSpec::Bind { propagation: Some(BindPropagation::Rslave), .. }
        ));
    }

    #[test]
    fn test_config_and_secret_mounts() {
        let yaml = r#"
services:
  proxy:
    image: nginx
    configs:
      - nginx
      - source: site
        target: /etc/nginx/conf.d/site.conf
    secrets:
      - key
configs:
  nginx:
    file: ./conf/nginx.conf
  site:
    file: /opt/site.conf
secrets:
  key:
    file: key.pem
"#;
        let mounts = spec(yaml, "proxy").unwrap().host.mounts;
        assert_eq!(
            mounts,
            vec![
                MountSpec::Bind {
                    source: PathBuf::from("/srv/shop/conf/nginx.conf"),
                    target: "/conf/nginx.conf".to_string(),
                    read_only: true,
                    propagation: None,
                },
                MountSpec::Bind {
                    source: PathBuf::from("/opt/site.conf"),
                    target: "/etc/nginx/conf.d/site.conf".to_string(),
                    read_only: true,
                    propagation: None,
                },
                MountSpec::Bind {
                    source: PathBuf::from("/srv/shop/key.pem"),
                    target: "/key.pem".to_string(),
                    read_only: true,
                    propagation: None,
                },
            ]
        );
    }

    #[test]
    fn test_unknown_config_reference() {
        let yaml = "services:\n  proxy:\n    image: nginx\n    secrets:\n      - missing\n";
        let err = spec(yaml, "proxy").unwrap_err();
        assert!(matches!(err, BerthError::ConfigTranslation { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_attachment_default_network() {
        let p = project("services:\n  web:\n    image: nginx\n");
        let attachment = network_attachment(&p, "web", &p.compose.services["web"]).unwrap();
        assert_eq!(attachment.mode.as_deref(), Some("shop-default"));
        assert_eq!(
            attachment.primary,
            Some(EndpointSpec { network: "shop-default".to_string(), aliases: vec!["web".to_string()] })
        );
        assert!(attachment.secondary.is_empty());
    }

    #[test]
    fn test_attachment_default_network_declared_by_name() {
        let p = project("services:\n  web:\n    image: nginx\nnetworks:\n  front:\n    name: default\n");
        let attachment = network_attachment(&p, "web", &p.compose.services["web"]).unwrap();
        assert_eq!(attachment.mode.as_deref(), Some("default"));
        assert_eq!(attachment.primary.unwrap().aliases, vec!["web"]);
    }

    #[test]
    fn test_attachment_multiple_networks() {
        let yaml = r#"
services:
  api:
    image: api
    networks:
      back:
        aliases: [backend]
      front:
        aliases: [edge]
networks:
  front:
  back:
    name: shop-back
"#;
        let p = project(yaml);
        let attachment = network_attachment(&p, "api", &p.compose.services["api"]).unwrap();
        assert_eq!(attachment.mode.as_deref(), Some("shop-back"));
        assert_eq!(attachment.primary.unwrap().aliases, vec!["api", "backend"]);
        assert_eq!(
            attachment.secondary,
            vec![EndpointSpec { network: "front".to_string(), aliases: vec!["edge".to_string()] }]
        );
    }

    #[test]
    fn test_attachment_explicit_mode_wins() {
        let yaml = "services:\n  web:\n    image: nginx\n    network_mode: host\n";
        let p = project(yaml);
        let attachment = network_attachment(&p, "web", &p.compose.services["web"]).unwrap();
        assert_eq!(attachment.mode.as_deref(), Some("host"));
        assert!(attachment.primary.is_none());
    }

    #[test]
    fn test_attachment_undeclared_network() {
        let yaml = "services:\n  web:\n    image: nginx\n    networks: [ghost]\n";
        let p = project(yaml);
        let err = network_attachment(&p, "web", &p.compose.services["web"]).unwrap_err();
        assert!(matches!(err, BerthError::ConfigTranslation { .. }));
    }

    #[test]
    fn test_secondary_aliases() {
        let aliases = secondary_aliases("api", "0123456789abcdef", &["edge".to_string()]);
        assert_eq!(aliases, vec!["api", "0123456789ab", "edge"]);
    }

    #[test]
    fn test_network_and_volume_specs() {
        let yaml = r#"
services:
  web:
    image: nginx
networks:
  back:
    internal: true
    labels:
      team: core
    ipam:
      config:
        - subnet: 10.9.0.0/16
volumes:
  data:
    driver: local
"#;
        let p = project(yaml);
        let back = network_spec(&p, &p.network("back").unwrap());
        assert_eq!(back.name, "back");
        assert_eq!(back.driver, "bridge");
        assert!(back.internal);
        assert_eq!(back.labels.get("team").map(String::as_str), Some("core"));
        assert_eq!(back.labels.get("io.compose-spec.network").map(String::as_str), Some("back"));
        assert_eq!(back.ipam.unwrap().pools[0].subnet.as_deref(), Some("10.9.0.0/16"));

        let data = volume_spec(&p, &p.volume("data").unwrap());
        assert_eq!(data.name, "shop_data");
        assert_eq!(data.driver.as_deref(), Some("local"));
        assert_eq!(data.labels.get("io.compose-spec.volume").map(String::as_str), Some("data"));
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean_path(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(clean_path(Path::new("./x")), PathBuf::from("x"));
    }
}
