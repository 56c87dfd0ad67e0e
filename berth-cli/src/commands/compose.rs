//! Compose CLI commands: `up` and `down`.

use anyhow::{Context, Result};
use berth_core::reconcile::{NetworkAction, Plan, ServiceAction, VolumeAction};
use berth_core::{Project, ProgressEvent, ProgressReporter, Reconciler};
use colored::Colorize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};
use tracing::warn;

/// Prints one line per mutating step.
pub struct ConsoleProgress;

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: &ProgressEvent) {
        println!("  {} {}", action_marker(event.event_type.action()), event);
    }
}

/// Converge the project described by `file`.
pub async fn up(reconciler: &Reconciler, file: &Path, name: Option<&str>, dry_run: bool) -> Result<()> {
    let project = Project::load(file, name)
        .with_context(|| format!("Failed to load compose file {}", file.display()))?;

    if dry_run {
        let plan = reconciler.plan(&project).await.context("Failed to compute plan")?;
        print_plan(&plan);
        return Ok(());
    }

    println!(
        "{} Converging project {} ({} service(s))",
        "→".cyan().bold(),
        project.name.bold(),
        project.compose.services.len()
    );

    let report = reconciler.up(&project).await.context("Failed to converge project")?;

    if report.is_unchanged() {
        println!("{} Project {} is up to date", "✓".green().bold(), project.name.bold());
    } else {
        println!(
            "{} Project {} converged: {} created, {} replaced, {} started, {} removed",
            "✓".green().bold(),
            project.name.bold(),
            report.created.len(),
            report.replaced.len(),
            report.started.len(),
            report.removed.len()
        );
    }
    Ok(())
}

/// Remove the project's resources.
///
/// With `--project-name`, a missing or broken compose file is not fatal: every
/// labeled resource is removed.
pub async fn down(reconciler: &Reconciler, file: &Path, name: Option<&str>) -> Result<()> {
    let (project, project_name) = match Project::load(file, name) {
        Ok(project) => {
            let project_name = project.name.clone();
            (Some(project), project_name)
        }
        Err(e) => match name {
            Some(name) => {
                warn!(error = %e, "Tearing down without a compose file");
                (None, name.to_string())
            }
            None => {
                return Err(e).with_context(|| format!("Failed to load compose file {}", file.display()));
            }
        },
    };

    println!("{} Removing project {}", "→".yellow().bold(), project_name.bold());
    let report = reconciler
        .down(&project_name, project.as_ref())
        .await
        .with_context(|| format!("Failed to remove project {}", project_name))?;

    if report.is_empty() {
        println!("{} Nothing to remove", "✓".green().bold());
    } else {
        println!(
            "{} Removed {} container(s), {} volume(s), {} network(s)",
            "✓".green().bold(),
            report.containers.len(),
            report.volumes.len(),
            report.networks.len()
        );
    }
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

#[derive(Tabled, Debug, PartialEq, Eq)]
pub struct PlanRow {
    #[tabled(rename = "ACTION")]
    pub action: String,
    #[tabled(rename = "KIND")]
    pub kind: String,
    #[tabled(rename = "NAME")]
    pub name: String,
    #[tabled(rename = "DETAIL")]
    pub detail: String,
}

/// One table row per planned action, in execution order.
pub fn plan_rows(plan: &Plan) -> Vec<PlanRow> {
    let row = |action: &str, kind: &str, name: &str, detail: String| PlanRow {
        action: action.to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        detail,
    };

    let mut rows = Vec::new();
    for action in &plan.networks {
        rows.push(match action {
            NetworkAction::Keep { name, .. } => row("keep", "network", name, String::new()),
            NetworkAction::Ensure { spec, .. } => row("create", "network", &spec.name, spec.driver.clone()),
            NetworkAction::VerifyExternal { name, .. } => row("verify", "network", name, "external".to_string()),
        });
    }
    for action in &plan.volumes {
        rows.push(match action {
            VolumeAction::Keep { name, .. } => row("keep", "volume", name, String::new()),
            VolumeAction::Ensure { spec, .. } => {
                row("create", "volume", &spec.name, spec.driver.clone().unwrap_or_default())
            }
            VolumeAction::VerifyExternal { name, .. } => row("verify", "volume", name, "external".to_string()),
        });
    }
    for action in &plan.services {
        let detail = match action {
            ServiceAction::Create { .. } => String::new(),
            ServiceAction::Keep { container, .. } | ServiceAction::Start { container, .. } => {
                container.short_id().to_string()
            }
            ServiceAction::Replace { reason, existing, .. } => format!("{} ({})", reason, existing.len()),
            ServiceAction::Remove { containers, .. } => format!("orphan ({})", containers.len()),
        };
        rows.push(row(action.verb(), "service", action.service(), detail));
    }
    rows
}

fn print_plan(plan: &Plan) {
    if plan.is_noop() {
        println!("{} Project {} is up to date", "✓".green().bold(), plan.project.bold());
        return;
    }

    let rows: Vec<PlanRow> = plan_rows(plan)
        .into_iter()
        .map(|mut row| {
            row.action = colorize_action(&row.action);
            row
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);

    let summary = plan.summary();
    println!(
        "{} {} to create, {} to replace, {} to start, {} to remove",
        "Plan:".bold(),
        summary.create,
        summary.replace,
        summary.start,
        summary.remove
    );
}

/// Colorize an action verb based on its effect
pub fn colorize_action(action: &str) -> String {
    match action {
        "create" => action.green().to_string(),
        "start" => action.cyan().to_string(),
        "replace" => action.yellow().to_string(),
        "remove" => action.red().to_string(),
        _ => action.dimmed().to_string(),
    }
}

/// Leading marker for a progress line
pub fn action_marker(action: &str) -> String {
    match action {
        "created" | "started" | "pulled" => "+".green().bold().to_string(),
        "removed" | "stopped" => "-".red().bold().to_string(),
        _ => "•".dimmed().to_string(),
    }
}
