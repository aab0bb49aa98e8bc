//! Process enumeration via `ps`.
//!
//! A failed enumeration is a degraded sample (empty list), never an error for
//! the caller. Rows are normalized one at a time and bad rows are dropped.

use std::sync::Arc;

use sysinfo::System;
use tracing::{debug, trace, warn};

use super::normalize::{LISTING_TOOL, normalize_row_aligned, stat_column_offset};
use super::platform::IconResolver;
use super::process::Process;
use super::runner::{CommandRunner, ToolError, args, run_tool};

/// Column list handed to `ps -o`.
pub const PS_COLUMNS: &str = "pid,ppid,pcpu,pmem,comm,stat,command";

pub struct Sampler {
    runner: Arc<dyn CommandRunner>,
    total_memory: u64,
    icons: Option<Arc<dyn IconResolver>>,
}

impl Sampler {
    pub fn new(runner: Arc<dyn CommandRunner>, total_memory: u64) -> Self {
        Sampler {
            runner,
            total_memory,
            icons: None,
        }
    }

    pub fn with_icons(mut self, resolver: Arc<dyn IconResolver>) -> Self {
        self.icons = Some(resolver);
        self
    }

    /// Total physical memory in bytes, read once.
    pub fn detect_total_memory() -> u64 {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.total_memory()
    }

    pub fn enumerate_args() -> Vec<String> {
        args(&["-A", "-ww", "-o", PS_COLUMNS])
    }

    pub fn query_args(pid: u32) -> Vec<String> {
        args(&["-ww", "-p", &pid.to_string(), "-o", PS_COLUMNS])
    }

    /// Enumerate every process once.
    pub async fn sample(&self) -> Vec<Process> {
        match run_tool(&self.runner, LISTING_TOOL, Self::enumerate_args()).await {
            Ok(output) => self.parse_table(&output),
            Err(err) => {
                warn!(error = %err, "process enumeration failed; publishing empty list");
                Vec::new()
            }
        }
    }

    /// Re-query a single pid. `Ok(None)` means the process is gone: either
    /// the table has no row for it, or `ps` exited non-zero, which is how it
    /// reports an unknown pid. Any other tool failure is an error and says
    /// nothing about the process.
    pub async fn query_pid(&self, pid: u32) -> Result<Option<Process>, ToolError> {
        match run_tool(&self.runner, LISTING_TOOL, Self::query_args(pid)).await {
            Ok(output) => Ok(self.parse_table(&output).into_iter().find(|p| p.pid == pid)),
            Err(ToolError::Exit { code, .. }) => {
                debug!(pid, ?code, "single process query found no process");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Parse a full `ps` table: first line is the header, blank lines are
    /// ignored, rows that fail to normalize are dropped individually. The
    /// header's `STAT` offset is used to find the state column.
    pub fn parse_table(&self, output: &str) -> Vec<Process> {
        let mut lines = output.lines();
        let stat_offset = lines.next().and_then(stat_column_offset);
        lines
            .filter(|line| !line.trim().is_empty())
            .filter_map(
                |line| match normalize_row_aligned(line, self.total_memory, stat_offset) {
                    Ok(process) => Some(process),
                    Err(err) => {
                        debug!(error = %err, row = line, "dropping malformed process row");
                        None
                    }
                },
            )
            .map(|process| self.enrich(process))
            .collect()
    }

    fn enrich(&self, mut process: Process) -> Process {
        if let Some(icons) = &self.icons {
            process.icon_path = match icons.resolve(&process) {
                Ok(path) => path,
                Err(err) => {
                    trace!(pid = process.pid, error = %err, "icon lookup failed");
                    None
                }
            };
        }
        process
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::PathBuf;

    use super::*;
    use crate::system::runner::fake::FakeRunner;
    use crate::system::state::BaseState;

    const TOTAL: u64 = 8_000_000_000;

    const TABLE: &str = "\
  PID  PPID %CPU %MEM COMMAND         STAT COMMAND
    1     0  0.0  0.1 systemd         Ss   /sbin/init splash
  812     1 25.0  1.5 node            Sl   /usr/bin/node server.js

  913   812  abc  0.5 worker          R+   ./worker --fast
 garbage row
 1024     1  3.0  0.2 bash            Ss+  -bash
";

    fn sampler_with(fake: Arc<FakeRunner>) -> Sampler {
        Sampler::new(fake, TOTAL)
    }

    fn enumerate_line() -> String {
        format!("ps -A -ww -o {PS_COLUMNS}")
    }

    #[test]
    fn parse_skips_header_blank_and_malformed_rows() {
        let sampler = sampler_with(Arc::new(FakeRunner::default()));
        let procs = sampler.parse_table(TABLE);
        let pids: Vec<u32> = procs.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![1, 812, 913, 1024]);

        let names: Vec<&str> = procs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["init", "node", "worker", "bash"]);
        assert_eq!(procs[2].cpu_percent, 0.0);
        assert_eq!(procs[1].memory_bytes, 120_000_000);
    }

    #[test]
    fn malformed_row_does_not_affect_later_rows() {
        let sampler = sampler_with(Arc::new(FakeRunner::default()));
        let table = "PID PPID %CPU %MEM COMM STAT COMMAND\n5 1\n6 1 1.0 1.0 ok S /bin/ok\n";
        let procs = sampler.parse_table(table);
        assert_eq!(procs.len(), 1);
        assert_eq!(procs[0].pid, 6);
        assert_eq!(procs[0].name, "ok");
    }

    #[tokio::test]
    async fn sample_runs_ps_with_expected_columns() {
        let fake = Arc::new(FakeRunner::default());
        fake.respond(&enumerate_line(), TABLE);
        let procs = sampler_with(fake.clone()).sample().await;
        assert_eq!(procs.len(), 4);
        assert_eq!(fake.calls(), vec![enumerate_line()]);
    }

    #[tokio::test]
    async fn failed_enumeration_is_empty_sample() {
        let fake = Arc::new(FakeRunner::default());
        fake.fail(&enumerate_line(), 1);
        assert!(sampler_with(fake).sample().await.is_empty());

        // No canned response at all behaves like a missing binary.
        let missing = Arc::new(FakeRunner::default());
        assert!(sampler_with(missing).sample().await.is_empty());
    }

    #[tokio::test]
    async fn query_pid_matches_requested_pid() {
        let fake = Arc::new(FakeRunner::default());
        fake.respond(
            &format!("ps -ww -p 812 -o {PS_COLUMNS}"),
            "PID PPID %CPU %MEM COMM STAT COMMAND\n812 1 25.0 1.5 node Sl /usr/bin/node\n",
        );
        fake.fail(&format!("ps -ww -p 999 -o {PS_COLUMNS}"), 1);
        let sampler = sampler_with(fake);

        let found = sampler.query_pid(812).await.unwrap();
        assert_eq!(found.map(|p| p.name), Some("node".into()));
        // `ps -p` exits non-zero for a pid that does not exist.
        assert!(sampler.query_pid(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_pid_reports_tool_failures() {
        // No canned response behaves like a missing binary.
        let sampler = sampler_with(Arc::new(FakeRunner::default()));
        assert!(matches!(
            sampler.query_pid(812).await,
            Err(ToolError::Spawn { .. })
        ));
    }

    #[test]
    fn header_alignment_splits_spaced_short_names() {
        let sampler = sampler_with(Arc::new(FakeRunner::default()));
        let table = "\
PID PPID %CPU %MEM COMM       STAT COMMAND
7   1    0.0  0.0  Web X      S    /bin/web --x
8   1    0.0  0.0  foo        Q    /bin/foo
";
        let procs = sampler.parse_table(table);
        assert_eq!(procs.len(), 2);
        assert_eq!(procs[0].state.base, BaseState::Sleeping);
        assert_eq!(procs[0].command, "/bin/web --x");
        assert_eq!(procs[1].state.base, BaseState::Unknown("Q".into()));
    }

    struct FlakyIcons;

    impl IconResolver for FlakyIcons {
        fn resolve(&self, process: &Process) -> io::Result<Option<PathBuf>> {
            match process.name.as_str() {
                "node" => Ok(Some(PathBuf::from("/icons/node.png"))),
                "bash" => Err(io::Error::other("broken icon theme")),
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn icon_failures_degrade_to_no_icon() {
        let sampler =
            sampler_with(Arc::new(FakeRunner::default())).with_icons(Arc::new(FlakyIcons));
        let procs = sampler.parse_table(TABLE);
        assert_eq!(procs.len(), 4);
        let icon = |pid: u32| procs.iter().find(|p| p.pid == pid).unwrap().icon_path.clone();
        assert_eq!(icon(812), Some(PathBuf::from("/icons/node.png")));
        assert_eq!(icon(1024), None);
        assert_eq!(icon(1), None);
    }
}
