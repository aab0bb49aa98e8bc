use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

#[cfg(test)]
use super::metrics::MetricsStrategy;
use super::metrics::MetricsAggregator;
use super::process::select_top;
use super::sampler::Sampler;
use super::snapshot::{ProcessSample, Snapshot, SystemMetrics};
use super::tracked::TrackedSet;

pub const DEFAULT_TOP_N: usize = 20;

/// Composes sampling, metrics and the tracked-set refresh into one
/// [`Snapshot`]. At most one cycle runs at a time.
pub struct Monitor {
    sampler: Sampler,
    metrics: MetricsAggregator,
    tracked: Arc<TrackedSet>,
    top_n: usize,
    sub_task_timeout: Duration,
    in_flight: AtomicBool,
}

/// Held for the duration of a cycle; releases the single-flight flag on drop.
pub struct CycleTicket<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CycleTicket<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Monitor {
    pub fn new(
        sampler: Sampler,
        metrics: MetricsAggregator,
        tracked: Arc<TrackedSet>,
        top_n: usize,
        sub_task_timeout: Duration,
    ) -> Self {
        Monitor {
            sampler,
            metrics,
            tracked,
            top_n,
            sub_task_timeout,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn tracked(&self) -> &Arc<TrackedSet> {
        &self.tracked
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the single-flight slot. `None` while another cycle is running.
    pub fn try_begin(&self) -> Option<CycleTicket<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleTicket {
                flag: &self.in_flight,
            })
    }

    /// Run one cycle, or return `None` if one is already in flight.
    pub async fn cycle(&self) -> Option<Snapshot> {
        let Some(_ticket) = self.try_begin() else {
            debug!("cycle already in flight; skipping");
            return None;
        };
        Some(self.run_cycle().await)
    }

    async fn run_cycle(&self) -> Snapshot {
        let limit = self.sub_task_timeout;
        let (processes, metrics, tracked) = tokio::join!(
            bounded(limit, "sample", self.sampler.sample()),
            bounded(limit, "metrics", self.metrics.collect()),
            bounded(limit, "tracked", self.tracked.refresh(&self.sampler)),
        );

        let top_processes = select_top(processes.unwrap_or_default(), self.top_n);
        let mut metrics = metrics.unwrap_or_else(SystemMetrics::unavailable);
        metrics.process_samples = top_processes.iter().map(ProcessSample::from).collect();

        Snapshot {
            top_processes,
            metrics,
            tracked_processes: tracked.unwrap_or_default(),
        }
    }
}

async fn bounded<T>(limit: Duration, task: &str, fut: impl Future<Output = T>) -> Option<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(task, timeout_ms = limit.as_millis() as u64, "cycle sub-task timed out");
            None
        }
    }
}

#[cfg(test)]
pub(crate) fn test_monitor(
    runner: Arc<dyn super::runner::CommandRunner>,
    top_n: usize,
) -> Monitor {
    Monitor::new(
        Sampler::new(Arc::clone(&runner), 10_000_000_000),
        MetricsAggregator::new(runner, MetricsStrategy::TableBased),
        Arc::new(TrackedSet::new()),
        top_n,
        Duration::from_secs(5),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::runner::fake::FakeRunner;
    use crate::system::sampler::PS_COLUMNS;

    const TABLE: &str = "\
PID PPID %CPU %MEM COMMAND STAT COMMAND
1 0 0.5 0.1 init Ss /sbin/init
2 1 9.0 1.0 alpha S /usr/bin/alpha
3 1 40.0 2.0 beta R /usr/bin/beta
4 1 9.0 1.0 gamma S /usr/bin/gamma
";

    fn fake_host() -> Arc<FakeRunner> {
        let fake = Arc::new(FakeRunner::default());
        fake.respond(&format!("ps -A -ww -o {PS_COLUMNS}"), TABLE);
        fake.respond(
            "free -b",
            "  total used free\nMem: 10000000000 2500000000 7500000000\n",
        );
        fake.respond("top -b -n 1", "%Cpu(s):  10.0 us,  5.0 sy, 85.0 id\n");
        fake.respond(
            &format!("ps -ww -p 2 -o {PS_COLUMNS}"),
            "PID PPID %CPU %MEM COMMAND STAT COMMAND\n2 1 9.0 1.0 alpha S /usr/bin/alpha\n",
        );
        fake.fail(&format!("ps -ww -p 999 -o {PS_COLUMNS}"), 1);
        fake
    }

    #[tokio::test]
    async fn cycle_composes_snapshot() {
        let monitor = test_monitor(fake_host(), 3);
        monitor.tracked().add(2);
        monitor.tracked().add(999);

        let snapshot = monitor.cycle().await.unwrap();

        let top: Vec<u32> = snapshot.top_processes.iter().map(|p| p.pid).collect();
        assert_eq!(top, vec![3, 2, 4]);
        assert_eq!(snapshot.metrics.total_memory_bytes, 10_000_000_000);
        assert_eq!(snapshot.metrics.used_memory_bytes, 2_500_000_000);
        assert_eq!(snapshot.metrics.cpu_usage_percent, 15.0);

        let samples: Vec<&str> = snapshot
            .metrics
            .process_samples
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(samples, vec!["beta", "alpha", "gamma"]);

        assert_eq!(snapshot.tracked_processes.len(), 1);
        assert_eq!(snapshot.tracked_processes[0].pid, 2);
        // `ps` reported 999 as missing this cycle.
        assert_eq!(monitor.tracked().pids(), vec![2]);
    }

    #[tokio::test]
    async fn failing_host_still_publishes() {
        let monitor = test_monitor(Arc::new(FakeRunner::default()), 10);
        let snapshot = monitor.cycle().await.unwrap();
        assert!(snapshot.top_processes.is_empty());
        assert!(snapshot.tracked_processes.is_empty());
        assert_eq!(snapshot.metrics.cpu_usage_percent, 0.0);
    }

    #[tokio::test]
    async fn single_flight_guard() {
        let monitor = test_monitor(fake_host(), 10);
        let ticket = monitor.try_begin().unwrap();
        assert!(monitor.is_busy());
        assert!(monitor.try_begin().is_none());
        assert!(monitor.cycle().await.is_none());
        drop(ticket);
        assert!(!monitor.is_busy());
        assert!(monitor.cycle().await.is_some());
    }
}
