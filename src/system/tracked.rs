//! Pinned processes, refreshed every cycle independently of the top list.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use tracing::{info, warn};

use super::process::Process;
use super::sampler::Sampler;

/// The set of pinned pids. Only this type mutates it: explicit add/remove
/// and pruning at the end of [`TrackedSet::refresh`].
#[derive(Debug, Default)]
pub struct TrackedSet {
    pids: Mutex<BTreeSet<u32>>,
}

impl TrackedSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, BTreeSet<u32>> {
        self.pids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Idempotent.
    pub fn add(&self, pid: u32) {
        if self.guard().insert(pid) {
            info!(pid, "tracking process");
        }
    }

    /// Idempotent; removing an absent pid is a no-op.
    pub fn remove(&self, pid: u32) {
        if self.guard().remove(&pid) {
            info!(pid, "stopped tracking process");
        }
    }

    /// Copy of the current membership, in ascending pid order.
    pub fn pids(&self) -> Vec<u32> {
        self.guard().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn prune(&self, vanished: &[u32]) {
        let mut pids = self.guard();
        for pid in vanished {
            pids.remove(pid);
        }
    }

    /// Re-query every pinned pid against a copy of the membership taken
    /// up front. Pids reported gone are removed once the scan is done. A pid
    /// whose query could not be made at all stays pinned and is left out of
    /// this cycle's result.
    pub async fn refresh(&self, sampler: &Sampler) -> Vec<Process> {
        let pinned = self.pids();
        let results = join_all(pinned.iter().map(|&pid| sampler.query_pid(pid))).await;

        let mut live = Vec::with_capacity(pinned.len());
        let mut vanished = Vec::new();
        for (pid, result) in pinned.into_iter().zip(results) {
            match result {
                Ok(Some(process)) => live.push(process),
                Ok(None) => vanished.push(pid),
                Err(err) => warn!(pid, error = %err, "tracked process query failed; keeping pid"),
            }
        }

        if !vanished.is_empty() {
            info!(?vanished, "pruning tracked processes that no longer exist");
            self.prune(&vanished);
        }
        live
    }
}
