//! Alert subscribers.
//!
//! Each subscriber owns the receiving end of one bounded channel
//! registered with the flow engine and runs as its own task. A task ends
//! when the engine drops its sender on stop, after draining what was
//! already queued.
//!
//! - [`AlertLogger`]: one structured `warn!` line per alert
//! - [`RecentAlerts`]: bounded in-memory view, newest first

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use netwarden_core::types::protocol_name;
use netwarden_flow_engine::{AlertEvent, Feature};

/// Default number of alerts kept by [`RecentAlerts`].
pub const DEFAULT_RECENT_CAPACITY: usize = 50;

/// Logs every alert it receives.
#[derive(Debug, Default)]
pub struct AlertLogger {
    logged: u64,
}

impl AlertLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of alerts logged so far.
    pub fn logged(&self) -> u64 {
        self.logged
    }

    pub fn log(&mut self, event: &AlertEvent) {
        let alert = &event.alert;
        warn!(
            alert_id = %event.id,
            trace_id = %event.metadata.trace_id,
            label = %alert.label,
            src = %alert.src_ip,
            src_port = alert.src_port,
            dst = %alert.dst_ip,
            dst_port = alert.dst_port,
            protocol = protocol_name(alert.protocol),
            fwd_packets = alert.details.get(Feature::TotalFwdPackets),
            bwd_packets = alert.details.get(Feature::TotalBackwardPackets),
            flow_duration_us = alert.details.get(Feature::FlowDuration),
            "intrusion alert"
        );
        self.logged += 1;
    }

    /// Consume alerts until the channel closes. Resolves to the number logged.
    pub fn spawn(mut self, mut rx: mpsc::Receiver<AlertEvent>) -> JoinHandle<u64> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.log(&event);
            }
            debug!(logged = self.logged, "alert logger finished");
            self.logged
        })
    }
}

/// One entry of the recent-alert view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentAlert {
    pub id: String,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    #[serde(rename = "type")]
    pub label: String,
    /// Unix seconds.
    pub timestamp: f64,
    /// Local time, `%Y-%m-%d %H:%M:%S`.
    pub time_str: String,
}

impl RecentAlert {
    pub fn from_event(event: &AlertEvent) -> Self {
        let alert = &event.alert;
        Self {
            id: event.id.clone(),
            src_ip: alert.src_ip,
            dst_ip: alert.dst_ip,
            label: alert.label.clone(),
            timestamp: alert
                .timestamp
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_secs_f64(),
            time_str: time_str(alert.timestamp),
        }
    }
}

/// Format a timestamp in local time for display.
pub fn time_str(at: SystemTime) -> String {
    DateTime::<Local>::from(at)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Bounded, newest-first buffer of recent alerts.
///
/// Cheap to clone; clones share the same buffer.
#[derive(Debug, Clone)]
pub struct RecentAlerts {
    capacity: usize,
    entries: Arc<Mutex<VecDeque<RecentAlert>>>,
}

impl Default for RecentAlerts {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_CAPACITY)
    }
}

impl RecentAlerts {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert at the front, dropping the oldest entry when full.
    pub fn push(&self, event: &AlertEvent) {
        let entry = RecentAlert::from_event(event);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }

    /// Copy of the buffer, newest first.
    pub fn snapshot(&self) -> Vec<RecentAlert> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume alerts into this buffer until the channel closes.
    pub fn spawn(&self, mut rx: mpsc::Receiver<AlertEvent>) -> JoinHandle<()> {
        let recent = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                recent.push(&event);
            }
            debug!(kept = recent.len(), "recent alert buffer closed");
        })
    }
}
