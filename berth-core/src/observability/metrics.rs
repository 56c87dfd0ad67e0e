//! Core metrics definitions.
//!
//! Counters are recorded through the `metrics` facade; without an installed
//! recorder they are no-ops.

use metrics::{counter, describe_counter};

pub const CONTAINERS_CREATED: &str = "berth_containers_created_total";
pub const CONTAINERS_REMOVED: &str = "berth_containers_removed_total";
pub const NETWORKS_CREATED: &str = "berth_networks_created_total";
pub const VOLUMES_CREATED: &str = "berth_volumes_created_total";
pub const CONVERGENCE_RUNS: &str = "berth_convergence_runs_total";

/// Register all core metrics with descriptions.
pub fn register_core_metrics() {
    describe_counter!(CONTAINERS_CREATED, "Total number of containers created (by project)");
    describe_counter!(CONTAINERS_REMOVED, "Total number of containers removed (by project)");
    describe_counter!(NETWORKS_CREATED, "Total number of networks created (by project)");
    describe_counter!(VOLUMES_CREATED, "Total number of volumes created (by project)");
    describe_counter!(CONVERGENCE_RUNS, "Total number of convergence runs (by outcome)");
}

pub fn record_container_created(project: &str) {
    counter!(CONTAINERS_CREATED, "project" => project.to_string()).increment(1);
}

pub fn record_container_removed(project: &str) {
    counter!(CONTAINERS_REMOVED, "project" => project.to_string()).increment(1);
}

pub fn record_network_created(project: &str) {
    counter!(NETWORKS_CREATED, "project" => project.to_string()).increment(1);
}

pub fn record_volume_created(project: &str) {
    counter!(VOLUMES_CREATED, "project" => project.to_string()).increment(1);
}

pub fn record_convergence_run(outcome: &str) {
    counter!(CONVERGENCE_RUNS, "outcome" => outcome.to_string()).increment(1);
}
