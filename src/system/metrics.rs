//! Host-wide memory and CPU usage.
//!
//! Two strategies exist and one is picked at startup:
//! - page based (`vm_stat` + `top -l 1 -n 0`), used on macOS
//! - table based (`free -b` + `top -b -n 1`), used everywhere else
//!
//! Every failure degrades the affected field to zero and is logged.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use super::runner::{CommandRunner, ToolError, args, run_tool};
use super::snapshot::{SystemMetrics, now_millis};

pub const DEFAULT_PAGE_SIZE: u64 = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MetricsStrategy {
    PageBased { page_size: u64 },
    TableBased,
}

impl MetricsStrategy {
    /// Strategy for an OS identifier as reported by `std::env::consts::OS`.
    pub fn for_os(os: &str, page_size: u64) -> Self {
        match os {
            "macos" | "ios" => MetricsStrategy::PageBased { page_size },
            _ => MetricsStrategy::TableBased,
        }
    }

    pub fn detect(page_size: u64) -> Self {
        Self::for_os(std::env::consts::OS, page_size)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub total: u64,
    pub used: u64,
}

pub struct MetricsAggregator {
    runner: Arc<dyn CommandRunner>,
    strategy: MetricsStrategy,
}

impl MetricsAggregator {
    pub fn new(runner: Arc<dyn CommandRunner>, strategy: MetricsStrategy) -> Self {
        MetricsAggregator { runner, strategy }
    }

    /// Collect memory and CPU concurrently. `process_samples` is left empty
    /// for the caller to fill from the same cycle's top list.
    pub async fn collect(&self) -> SystemMetrics {
        let (memory, cpu) = tokio::join!(self.memory(), self.cpu());
        let memory = memory.unwrap_or_else(|err| {
            warn!(error = %err, "memory statistics unavailable");
            MemoryUsage::default()
        });
        let cpu = cpu.unwrap_or_else(|err| {
            warn!(error = %err, "cpu summary unavailable");
            0.0
        });

        SystemMetrics {
            total_memory_bytes: memory.total,
            used_memory_bytes: memory.used,
            cpu_usage_percent: cpu.clamp(0.0, 100.0),
            timestamp: now_millis(),
            process_samples: Vec::new(),
        }
    }

    async fn memory(&self) -> Result<MemoryUsage, MetricsError> {
        match self.strategy {
            MetricsStrategy::PageBased { page_size } => {
                let out = run_tool(&self.runner, "vm_stat", Vec::new()).await?;
                parse_page_report(&out, page_size).ok_or(MetricsError::Unparsable("vm_stat"))
            }
            MetricsStrategy::TableBased => {
                let out = run_tool(&self.runner, "free", args(&["-b"])).await?;
                parse_memory_table(&out).ok_or(MetricsError::Unparsable("free"))
            }
        }
    }

    async fn cpu(&self) -> Result<f32, MetricsError> {
        match self.strategy {
            MetricsStrategy::PageBased { .. } => {
                let out = run_tool(&self.runner, "top", args(&["-l", "1", "-n", "0"])).await?;
                parse_user_percent(&out).ok_or(MetricsError::Unparsable("top"))
            }
            MetricsStrategy::TableBased => {
                let out = run_tool(&self.runner, "top", args(&["-b", "-n", "1"])).await?;
                parse_user_system_percent(&out).ok_or(MetricsError::Unparsable("top"))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum MetricsError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("unrecognized `{0}` output")]
    Unparsable(&'static str),
}

/// `vm_stat` style report: `Pages free:   12345.` lines. Total is the sum of
/// free, active, inactive and wired pages; used is total minus free.
pub fn parse_page_report(report: &str, page_size: u64) -> Option<MemoryUsage> {
    let mut free = None;
    let mut active = None;
    let mut inactive = None;
    let mut wired = None;

    for line in report.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let slot = match key.trim() {
            "Pages free" => &mut free,
            "Pages active" => &mut active,
            "Pages inactive" => &mut inactive,
            "Pages wired down" => &mut wired,
            _ => continue,
        };
        *slot = value.trim().trim_end_matches('.').parse::<u64>().ok();
    }

    let free = free?.saturating_mul(page_size);
    let total = free
        .saturating_add(active?.saturating_mul(page_size))
        .saturating_add(inactive?.saturating_mul(page_size))
        .saturating_add(wired?.saturating_mul(page_size));
    Some(MemoryUsage {
        total,
        used: total - free,
    })
}

/// `free -b` style table: the first data row carries total and used bytes
/// in its second and third fields.
pub fn parse_memory_table(table: &str) -> Option<MemoryUsage> {
    let row = table.lines().skip(1).find(|line| !line.trim().is_empty())?;
    let fields: Vec<&str> = row.split_whitespace().collect();
    let total = fields.get(1)?.parse().ok()?;
    let used = fields.get(2)?.parse().ok()?;
    Some(MemoryUsage { total, used })
}

/// macOS `top` summary: `CPU usage: 7.69% user, 15.38% sys, 76.92% idle`.
pub fn parse_user_percent(output: &str) -> Option<f32> {
    let line = output.lines().find(|l| l.contains("CPU usage"))?;
    let (_, fields) = line.split_once(':')?;
    fields
        .split(',')
        .map(split_labeled)
        .find(|(_, label)| *label == "user")
        .and_then(|(value, _)| value)
}

/// procps `top` summary: `%Cpu(s):  2.3 us,  0.8 sy, ...`, also the older
/// `Cpu(s):  2.3%us,  0.8%sy` form. Returns user + system.
pub fn parse_user_system_percent(output: &str) -> Option<f32> {
    let line = output.lines().find(|l| l.contains("Cpu(s)"))?;
    let (_, fields) = line.split_once(':')?;
    let mut user = None;
    let mut system = None;
    for (value, label) in fields.split(',').map(split_labeled) {
        match label {
            "us" => user = value,
            "sy" => system = value,
            _ => {}
        }
    }
    Some(user? + system?)
}

/// Split `" 2.3 us"` / `"2.3%us"` / `"7.69% user"` into value and label.
fn split_labeled(field: &str) -> (Option<f32>, &str) {
    let field = field.trim();
    let label_start = field
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(field.len());
    let (value, label) = field.split_at(label_start);
    let value = value.trim().trim_end_matches('%').trim().parse().ok();
    (value, label.trim())
}
