use std::path::PathBuf;

use serde::Serialize;

use super::state::ProcessState;

/// One sampled process.
///
/// `memory_bytes` is derived from the `%mem` column times total physical
/// memory, so it approximates resident memory rather than reading RSS.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub pid: u32,
    pub ppid: Option<u32>,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
    pub name: String,
    pub state: ProcessState,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<PathBuf>,
}

/// Rank by CPU descending and keep at most `limit` entries. The sort is
/// stable, so equal loads keep enumeration order.
pub fn select_top(mut processes: Vec<Process>, limit: usize) -> Vec<Process> {
    processes.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
    processes.truncate(limit);
    processes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::state::decode;
    use proptest::prelude::*;

    fn make_process(pid: u32, cpu: f32) -> Process {
        Process {
            pid,
            ppid: Some(1),
            cpu_percent: cpu,
            memory_bytes: 0,
            name: format!("proc_{pid}"),
            state: decode("S").unwrap(),
            command: String::new(),
            icon_path: None,
        }
    }

    #[test]
    fn ranks_by_cpu_descending() {
        let procs = vec![
            make_process(1, 1.0),
            make_process(2, 50.0),
            make_process(3, 12.5),
        ];
        let top = select_top(procs, 10);
        let pids: Vec<u32> = top.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![2, 3, 1]);
    }

    #[test]
    fn truncates_to_limit() {
        let procs = (0..30).map(|i| make_process(i, i as f32)).collect();
        let top = select_top(procs, 20);
        assert_eq!(top.len(), 20);
        assert_eq!(top[0].pid, 29);
        assert_eq!(top[19].pid, 10);
    }

    #[test]
    fn ties_keep_enumeration_order() {
        let procs = vec![
            make_process(7, 3.0),
            make_process(4, 3.0),
            make_process(9, 5.0),
            make_process(1, 3.0),
        ];
        let pids: Vec<u32> = select_top(procs, 10).iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![9, 7, 4, 1]);
    }

    proptest! {
        #[test]
        fn top_n_properties(
            loads in prop::collection::vec(0u8..10, 0..60),
            limit in 0usize..40,
        ) {
            let procs: Vec<Process> = loads
                .iter()
                .enumerate()
                .map(|(i, &load)| make_process(i as u32, f32::from(load)))
                .collect();
            let top = select_top(procs, limit);

            prop_assert_eq!(top.len(), limit.min(loads.len()));
            for pair in top.windows(2) {
                prop_assert!(pair[0].cpu_percent >= pair[1].cpu_percent);
                if pair[0].cpu_percent == pair[1].cpu_percent {
                    // pid encodes the enumeration index
                    prop_assert!(pair[0].pid < pair[1].pid);
                }
            }
        }
    }
}
