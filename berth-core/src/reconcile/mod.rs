//! Reconciliation engine.
//!
//! `up` is inventory → plan → apply; `down` is inventory → teardown. Every
//! runtime request is issued sequentially through the shared
//! [`ContainerRuntime`] handle.

use crate::error::Result;
use crate::observability::metrics;
use crate::runtime::ContainerRuntime;
use crate::types::Project;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub mod events;
pub mod inventory;
pub mod plan;
pub mod provision;
pub mod teardown;
pub mod translate;

pub use events::{EventType, NoopProgress, ProgressEvent, ProgressReporter, TracingProgress};
pub use inventory::Inventory;
pub use plan::{plan, NetworkAction, Plan, PlanSummary, ReplaceReason, ServiceAction, VolumeAction};
pub use provision::Provisioner;
pub use teardown::{teardown, TeardownReport};

/// Outcome of one convergence run, by logical name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergeReport {
    pub created: Vec<String>,
    pub started: Vec<String>,
    pub replaced: Vec<String>,
    pub kept: Vec<String>,

    /// Orphaned services whose containers were removed
    pub removed: Vec<String>,

    pub networks_created: Vec<String>,
    pub volumes_created: Vec<String>,
}

impl ConvergeReport {
    /// True when the run did not change the runtime.
    pub fn is_unchanged(&self) -> bool {
        self.created.is_empty()
            && self.started.is_empty()
            && self.replaced.is_empty()
            && self.removed.is_empty()
            && self.networks_created.is_empty()
            && self.volumes_created.is_empty()
    }
}

/// Converges projects on one runtime.
#[derive(Clone)]
pub struct Reconciler {
    runtime: Arc<dyn ContainerRuntime>,
    progress: Arc<dyn ProgressReporter>,
    pull_images: bool,
}

impl Reconciler {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime, progress: Arc::new(TracingProgress), pull_images: true }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Whether missing images are pulled before container creation.
    pub fn with_pull_images(mut self, pull_images: bool) -> Self {
        self.pull_images = pull_images;
        self
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    /// Collect the inventory and diff it against `project` without mutating anything.
    #[instrument(skip_all, fields(project = %project.name))]
    pub async fn plan(&self, project: &Project) -> Result<Plan> {
        let inventory = Inventory::collect(self.runtime.as_ref(), &project.name).await?;
        plan(project, &inventory)
    }

    /// Converge the runtime toward `project`.
    #[instrument(skip_all, fields(project = %project.name, runtime = %self.runtime.name()))]
    pub async fn up(&self, project: &Project) -> Result<ConvergeReport> {
        let result = match self.plan(project).await {
            Ok(plan) => self.apply(project, &plan).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(report) if report.is_unchanged() => {
                info!("Project already converged");
                metrics::record_convergence_run("unchanged");
            }
            Ok(_) => metrics::record_convergence_run("changed"),
            Err(e) => {
                warn!(error = %e, "Convergence failed");
                metrics::record_convergence_run("failed");
            }
        }
        result
    }

    /// Apply a previously computed plan.
    pub async fn apply(&self, project: &Project, plan: &Plan) -> Result<ConvergeReport> {
        Provisioner::new(self.runtime.as_ref(), self.progress.as_ref(), project, self.pull_images)
            .apply(plan)
            .await
    }

    /// Remove every managed resource of `project_name`.
    ///
    /// When the descriptor is available, its external networks and volumes are
    /// left in place.
    #[instrument(skip_all, fields(project = %project_name))]
    pub async fn down(&self, project_name: &str, project: Option<&Project>) -> Result<TeardownReport> {
        teardown(self.runtime.as_ref(), self.progress.as_ref(), project_name, project).await
    }
}
