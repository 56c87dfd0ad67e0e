//! Plan application.
//!
//! Applies a [`Plan`] strictly in order: networks, volumes, declared services,
//! orphan removals. Each runtime request is awaited before the next one is
//! issued. The first error aborts the run; nothing is rolled back.

use super::events::{EventType, ProgressEvent, ProgressReporter};
use super::plan::{NetworkAction, Plan, ServiceAction, VolumeAction};
use super::translate::{container_spec, network_attachment, secondary_aliases};
use super::ConvergeReport;
use crate::error::{BerthError, Result};
use crate::observability::metrics;
use crate::runtime::ContainerRuntime;
use crate::compose::Service;
use crate::types::{short_id, ContainerSummary, EndpointSpec, Fingerprint, Project, ResourceKind};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// Applies one plan against one runtime.
pub struct Provisioner<'a> {
    runtime: &'a dyn ContainerRuntime,
    progress: &'a dyn ProgressReporter,
    project: &'a Project,
    pull_images: bool,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        progress: &'a dyn ProgressReporter,
        project: &'a Project,
        pull_images: bool,
    ) -> Self {
        Self { runtime, progress, project, pull_images }
    }

    /// Execute every action of `plan`.
    #[instrument(skip_all, fields(project = %self.project.name))]
    pub async fn apply(&self, plan: &Plan) -> Result<ConvergeReport> {
        let mut report = ConvergeReport::default();

        for action in &plan.networks {
            self.apply_network(action, &mut report).await?;
        }
        for action in &plan.volumes {
            self.apply_volume(action, &mut report).await?;
        }
        for action in &plan.services {
            self.apply_service(action, &mut report).await?;
        }

        info!(
            created = report.created.len(),
            replaced = report.replaced.len(),
            removed = report.removed.len(),
            "Plan applied"
        );
        Ok(report)
    }

    async fn apply_network(&self, action: &NetworkAction, report: &mut ConvergeReport) -> Result<()> {
        match action {
            NetworkAction::Keep { name, .. } => {
                debug!(network = %name, "Network up to date");
            }
            NetworkAction::Ensure { spec, .. } => {
                if self.runtime.inspect_network(&spec.name).await?.is_some() {
                    debug!(network = %spec.name, "Network already exists");
                    return Ok(());
                }
                self.runtime.create_network(spec).await?;
                metrics::record_network_created(&self.project.name);
                self.progress.report(&ProgressEvent::network(EventType::NetworkCreated, &spec.name));
                report.networks_created.push(spec.name.clone());
            }
            NetworkAction::VerifyExternal { name, .. } => {
                if self.runtime.inspect_network(name).await?.is_none() {
                    return Err(BerthError::ExternalResourceNotFound {
                        kind: ResourceKind::Network,
                        name: name.clone(),
                    });
                }
                self.progress.report(&ProgressEvent::network(EventType::ExternalVerified, name));
            }
        }
        Ok(())
    }

    async fn apply_volume(&self, action: &VolumeAction, report: &mut ConvergeReport) -> Result<()> {
        match action {
            VolumeAction::Keep { name, .. } => {
                debug!(volume = %name, "Volume up to date");
            }
            VolumeAction::Ensure { spec, .. } => {
                if self.runtime.inspect_volume(&spec.name).await?.is_some() {
                    debug!(volume = %spec.name, "Volume already exists");
                    return Ok(());
                }
                self.runtime.create_volume(spec).await?;
                metrics::record_volume_created(&self.project.name);
                self.progress.report(&ProgressEvent::volume(EventType::VolumeCreated, &spec.name));
                report.volumes_created.push(spec.name.clone());
            }
            VolumeAction::VerifyExternal { name, .. } => {
                if self.runtime.inspect_volume(name).await?.is_none() {
                    return Err(BerthError::ExternalResourceNotFound {
                        kind: ResourceKind::Volume,
                        name: name.clone(),
                    });
                }
                self.progress.report(&ProgressEvent::volume(EventType::ExternalVerified, name));
            }
        }
        Ok(())
    }

    async fn apply_service(&self, action: &ServiceAction, report: &mut ConvergeReport) -> Result<()> {
        match action {
            ServiceAction::Create { service, fingerprint } => {
                self.create(service, fingerprint).await?;
                report.created.push(service.clone());
            }
            ServiceAction::Keep { service, container } => {
                debug!(service = %service, container_id = %container.short_id(), "Container up to date");
                report.kept.push(service.clone());
            }
            ServiceAction::Start { service, container } => {
                self.start(service, container).await?;
                report.started.push(service.clone());
            }
            ServiceAction::Replace { service, reason, existing, fingerprint } => {
                info!(service = %service, reason = %reason, count = existing.len(), "Replacing containers");
                self.remove_all(service, existing).await?;
                self.create(service, fingerprint).await?;
                report.replaced.push(service.clone());
            }
            ServiceAction::Remove { service, containers } => {
                self.remove_all(service, containers).await?;
                report.removed.push(service.clone());
            }
        }
        Ok(())
    }

    /// Create, start, then connect the remaining networks.
    #[instrument(skip_all, fields(service = %service))]
    async fn create(&self, service: &str, fingerprint: &Fingerprint) -> Result<()> {
        let definition = self.definition(service)?;
        let spec = container_spec(self.project, service, definition, fingerprint)?;
        let attachment = network_attachment(self.project, service, definition)?;

        self.ensure_image(&spec.image).await?;

        let id = self.runtime.create_container(&spec).await?;
        metrics::record_container_created(&self.project.name);
        self.progress.report(&ProgressEvent::container(EventType::ContainerCreated, service, &spec.name));

        self.runtime.start_container(&id).await?;
        self.progress.report(&ProgressEvent::container(EventType::ContainerStarted, service, &spec.name));

        self.connect_secondary(service, &id, &attachment.secondary, &BTreeSet::new()).await
    }

    /// Start a created container and connect the networks a failed start left out.
    #[instrument(skip_all, fields(service = %service))]
    async fn start(&self, service: &str, container: &ContainerSummary) -> Result<()> {
        let attachment = network_attachment(self.project, service, self.definition(service)?)?;

        self.runtime.start_container(&container.id).await?;
        self.progress.report(&ProgressEvent::container(EventType::ContainerStarted, service, &container.name));

        self.connect_secondary(service, &container.id, &attachment.secondary, &container.networks).await
    }

    async fn connect_secondary(
        &self,
        service: &str,
        id: &str,
        secondary: &[EndpointSpec],
        attached: &BTreeSet<String>,
    ) -> Result<()> {
        for endpoint in secondary.iter().filter(|e| !attached.contains(&e.network)) {
            let endpoint = EndpointSpec {
                network: endpoint.network.clone(),
                aliases: secondary_aliases(service, id, &endpoint.aliases),
            };
            debug!(container_id = %short_id(id), network = %endpoint.network, "Connecting network");
            self.runtime.connect_network(&endpoint.network, id, &endpoint).await?;
        }
        Ok(())
    }

    fn definition(&self, service: &str) -> Result<&'a Service> {
        self.project.compose.services.get(service).ok_or_else(|| {
            BerthError::Internal(format!("service '{}' missing from project {}", service, self.project.name))
        })
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        if !self.pull_images || self.runtime.image_exists(image).await? {
            return Ok(());
        }
        info!(image = %image, "Pulling image");
        self.runtime.pull_image(image).await?;
        self.progress.report(&ProgressEvent::new(EventType::ImagePulled, None, image));
        Ok(())
    }

    async fn remove_all(&self, service: &str, containers: &[ContainerSummary]) -> Result<()> {
        for container in containers {
            stop_and_remove(self.runtime, self.progress, service, container).await?;
            metrics::record_container_removed(&self.project.name);
        }
        Ok(())
    }
}

/// Stop then remove one container. A container that vanished counts as removed.
pub(crate) async fn stop_and_remove(
    runtime: &dyn ContainerRuntime,
    progress: &dyn ProgressReporter,
    service: &str,
    container: &ContainerSummary,
) -> Result<()> {
    match runtime.stop_container(&container.id).await {
        Ok(()) => progress.report(&ProgressEvent::container(EventType::ContainerStopped, service, &container.name)),
        Err(e) if e.is_not_found() => {
            debug!(container_id = %container.short_id(), "Container already gone");
            return Ok(());
        }
        Err(e) => return Err(e),
    }
    match runtime.remove_container(&container.id).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => debug!(container_id = %container.short_id(), "Container already gone"),
        Err(e) => return Err(e),
    }
    progress.report(&ProgressEvent::container(EventType::ContainerRemoved, service, &container.name));
    Ok(())
}
