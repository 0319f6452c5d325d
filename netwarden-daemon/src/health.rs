//! Aggregated health reporting.
//!
//! The orchestrator polls each component and folds the results into one
//! [`DaemonHealth`]. The overall status is the worst component status:
//!
//! - all Healthy -> Healthy
//! - any Degraded, none Unhealthy -> Degraded(reasons)
//! - any Unhealthy -> Unhealthy(reasons of the unhealthy ones)

use serde::Serialize;

use netwarden_core::pipeline::HealthStatus;
use netwarden_flow_engine::TrafficSnapshot;

/// Health of the whole daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Worst status among all components.
    pub status: HealthStatus,
    /// Seconds since the orchestrator was built.
    pub uptime_secs: u64,
    /// Per-component reports.
    pub components: Vec<ComponentHealth>,
    /// Flow engine counters at report time.
    pub traffic: TrafficSnapshot,
    /// Entries currently held by the recent-alert buffer.
    pub recent_alerts: usize,
}

/// Health of one component (e.g. "flow-engine", "capture").
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

fn severity(status: &HealthStatus) -> u8 {
    match status {
        HealthStatus::Healthy => 0,
        HealthStatus::Degraded(_) => 1,
        HealthStatus::Unhealthy(_) => 2,
    }
}

/// Fold component statuses into the worst one, joining the reasons of
/// every component at that level as `"name: reason; ..."`.
pub fn aggregate_status(components: &[ComponentHealth]) -> HealthStatus {
    let worst = components
        .iter()
        .map(|c| severity(&c.status))
        .max()
        .unwrap_or(0);

    let reasons = || {
        components
            .iter()
            .filter(|c| severity(&c.status) == worst)
            .map(|c| match &c.status {
                HealthStatus::Degraded(r) | HealthStatus::Unhealthy(r) => {
                    format!("{}: {}", c.name, r)
                }
                HealthStatus::Healthy => c.name.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    };

    match worst {
        0 => HealthStatus::Healthy,
        1 => HealthStatus::Degraded(reasons()),
        _ => HealthStatus::Unhealthy(reasons()),
    }
}
