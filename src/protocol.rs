//! JSON-lines wire format: requests come in on stdin, snapshots and action
//! results go out on stdout, one object per line, tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::action::{ActionRequest, ActionResponse};
use crate::system::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlRequest {
    Refresh,
    Track { pid: u32 },
    Untrack { pid: u32 },
    Action(ActionRequest),
    Quit,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound<'a> {
    Snapshot(&'a Snapshot),
    ActionResult(&'a ActionResponse),
}

/// Blank lines yield `Ok(None)`.
pub fn parse_request(line: &str) -> Result<Option<ControlRequest>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// One line of output, without the trailing newline.
pub fn encode(message: &Outbound<'_>) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, FailureKind};
    use crate::system::snapshot::SystemMetrics;

    #[test]
    fn parses_every_request_kind() {
        assert_eq!(
            parse_request(r#"{"type":"refresh"}"#).unwrap(),
            Some(ControlRequest::Refresh)
        );
        assert_eq!(
            parse_request(r#"{"type":"track","pid":12}"#).unwrap(),
            Some(ControlRequest::Track { pid: 12 })
        );
        assert_eq!(
            parse_request(r#"{"type":"untrack","pid":12}"#).unwrap(),
            Some(ControlRequest::Untrack { pid: 12 })
        );
        assert_eq!(
            parse_request(r#"{"type":"action","action":"suspend","pid":3}"#).unwrap(),
            Some(ControlRequest::Action(ActionRequest {
                action: Action::Suspend,
                pid: 3
            }))
        );
        assert_eq!(
            parse_request(r#"{"type":"quit"}"#).unwrap(),
            Some(ControlRequest::Quit)
        );
    }

    #[test]
    fn legacy_action_alias() {
        let request = parse_request(r#" {"type":"action","action":"kill","pid":9} "#).unwrap();
        assert_eq!(
            request,
            Some(ControlRequest::Action(ActionRequest {
                action: Action::Terminate,
                pid: 9
            }))
        );
    }

    #[test]
    fn blank_and_malformed_lines() {
        assert_eq!(parse_request("   ").unwrap(), None);
        assert!(parse_request("{not json").is_err());
        assert!(parse_request(r#"{"type":"track"}"#).is_err());
        assert!(parse_request(r#"{"type":"track","pid":-1}"#).is_err());
        assert!(parse_request(r#"{"type":"reboot"}"#).is_err());
    }

    #[test]
    fn action_result_line() {
        let response = ActionResponse::failure(
            ActionRequest {
                action: Action::SetPriority,
                pid: 5,
            },
            FailureKind::NotImplemented,
            "not implemented".to_string(),
        );
        let line = encode(&Outbound::ActionResult(&response)).unwrap();
        assert_eq!(
            line,
            r#"{"type":"actionResult","success":false,"action":"setPriority","pid":5,"errorMessage":"not implemented","errorKind":"notImplemented"}"#
        );
    }

    #[test]
    fn snapshot_line_is_tagged() {
        let snapshot = Snapshot {
            top_processes: Vec::new(),
            metrics: SystemMetrics {
                timestamp: 1,
                ..SystemMetrics::unavailable()
            },
            tracked_processes: Vec::new(),
        };
        let line = encode(&Outbound::Snapshot(&snapshot)).unwrap();
        assert_eq!(
            line,
            r#"{"type":"snapshot","topProcesses":[],"metrics":{"totalMemoryBytes":0,"usedMemoryBytes":0,"cpuUsagePercent":0.0,"timestamp":1,"processSamples":[]},"trackedProcesses":[]}"#
        );
    }
}
