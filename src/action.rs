use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    #[serde(alias = "kill")]
    Terminate,
    #[serde(alias = "pause")]
    Suspend,
    Resume,
    #[serde(alias = "priority")]
    SetPriority,
}

impl Action {
    pub fn verb(self) -> &'static str {
        match self {
            Action::Terminate => "terminate",
            Action::Suspend => "suspend",
            Action::Resume => "resume",
            Action::SetPriority => "setPriority",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: Action,
    pub pid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    PermissionDenied,
    NotFound,
    InvalidPid,
    Unsupported,
    NotImplemented,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub success: bool,
    pub action: Action,
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
}

impl ActionResponse {
    pub fn success(request: ActionRequest) -> Self {
        ActionResponse {
            success: true,
            action: request.action,
            pid: request.pid,
            error_message: None,
            error_kind: None,
        }
    }

    pub fn failure(request: ActionRequest, kind: FailureKind, message: String) -> Self {
        ActionResponse {
            success: false,
            action: request.action,
            pid: request.pid,
            error_message: Some(message),
            error_kind: Some(kind),
        }
    }
}
