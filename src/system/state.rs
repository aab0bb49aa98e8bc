//! Decoding of `ps` STAT codes into a structured process state.
//!
//! The first character selects the base state, every following character is
//! checked independently against the modifier table.

use std::fmt;

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseState {
    Running,
    Sleeping,
    UninterruptibleSleep,
    Zombie,
    Stopped,
    TracingStop,
    Dead,
    WakeKill,
    Waking,
    Parked,
    Idle,
    /// Base letter not present in the table, kept verbatim.
    Unknown(String),
}

impl BaseState {
    fn from_code(code: char) -> Self {
        match code {
            'R' => BaseState::Running,
            'S' => BaseState::Sleeping,
            'D' => BaseState::UninterruptibleSleep,
            'Z' => BaseState::Zombie,
            'T' => BaseState::Stopped,
            't' => BaseState::TracingStop,
            'X' | 'x' => BaseState::Dead,
            'K' => BaseState::WakeKill,
            'W' => BaseState::Waking,
            'P' => BaseState::Parked,
            'I' => BaseState::Idle,
            other => BaseState::Unknown(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            BaseState::Running => "Running",
            BaseState::Sleeping => "Sleeping",
            BaseState::UninterruptibleSleep => "Uninterruptible Sleep",
            BaseState::Zombie => "Zombie",
            BaseState::Stopped => "Stopped",
            BaseState::TracingStop => "Tracing Stop",
            BaseState::Dead => "Dead",
            BaseState::WakeKill => "Wakekill",
            BaseState::Waking => "Waking",
            BaseState::Parked => "Parked",
            BaseState::Idle => "Idle",
            BaseState::Unknown(code) => code,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StateFlag {
    SessionLeader,
    MultiThreaded,
    Foreground,
    HighPriority,
    LowPriority,
}

/// Modifier table, in the order flags are reported.
const MODIFIERS: [(char, StateFlag); 5] = [
    ('s', StateFlag::SessionLeader),
    ('l', StateFlag::MultiThreaded),
    ('+', StateFlag::Foreground),
    ('<', StateFlag::HighPriority),
    ('N', StateFlag::LowPriority),
];

impl StateFlag {
    pub fn label(self) -> &'static str {
        match self {
            StateFlag::SessionLeader => "Session Leader",
            StateFlag::MultiThreaded => "Multi-threaded",
            StateFlag::Foreground => "Foreground",
            StateFlag::HighPriority => "High Priority",
            StateFlag::LowPriority => "Low Priority",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ProcessState {
    pub base: BaseState,
    pub flags: Vec<StateFlag>,
}

impl ProcessState {
    pub fn has(&self, flag: StateFlag) -> bool {
        self.flags.contains(&flag)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base.label())?;
        for flag in &self.flags {
            write!(f, " ({})", flag.label())?;
        }
        Ok(())
    }
}

/// Decode a raw STAT code. Returns `None` only for an empty code, which
/// callers must reject before normalizing a row.
pub fn decode(code: &str) -> Option<ProcessState> {
    let mut chars = code.chars();
    let base = BaseState::from_code(chars.next()?);
    let modifiers = chars.as_str();
    let flags = MODIFIERS
        .iter()
        .filter(|(letter, _)| modifiers.contains(*letter))
        .map(|&(_, flag)| flag)
        .collect();
    Some(ProcessState { base, flags })
}

const BASE_LETTERS: &str = "RSDZTtXxKWPIU";
// Linux procps and BSD ps modifier letters.
const MODIFIER_LETTERS: &str = "sl+<>NLWEXVAJSx";

/// Whether a table token has the shape of a STAT column value: a known base
/// letter or any other uppercase letter, followed only by modifier letters.
/// Used to find the state column when the short-name column contains spaces.
pub fn looks_like_state_code(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) if BASE_LETTERS.contains(first) || first.is_ascii_uppercase() => {
            chars.all(|c| MODIFIER_LETTERS.contains(c))
        }
        _ => false,
    }
}
