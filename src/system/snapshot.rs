use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use super::process::Process;

/// Per-process point for charting, taken from the same cycle's top list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessSample {
    pub name: String,
    pub cpu: f32,
    pub memory: u64,
}

impl From<&Process> for ProcessSample {
    fn from(process: &Process) -> Self {
        ProcessSample {
            name: process.name.clone(),
            cpu: process.cpu_percent,
            memory: process.memory_bytes,
        }
    }
}

/// Host-wide usage. A zero CPU figure means "temporarily unavailable" as
/// often as it means idle.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub total_memory_bytes: u64,
    pub used_memory_bytes: u64,
    pub cpu_usage_percent: f32,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub process_samples: Vec<ProcessSample>,
}

impl SystemMetrics {
    /// All-zero metrics stamped now.
    pub fn unavailable() -> Self {
        SystemMetrics {
            total_memory_bytes: 0,
            used_memory_bytes: 0,
            cpu_usage_percent: 0.0,
            timestamp: now_millis(),
            process_samples: Vec::new(),
        }
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// One published poll cycle. Replaces the previous snapshot wholesale.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub top_processes: Vec<Process>,
    pub metrics: SystemMetrics,
    pub tracked_processes: Vec<Process>,
}
