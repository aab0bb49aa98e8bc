//! Turns one `ps` table row into a [`Process`].
//!
//! Rows are expected in `pid ppid %cpu %mem comm stat command` order. A row
//! that cannot be normalized yields a [`NormalizeError`] and is skipped by the
//! sampler; it never fails the batch.

use thiserror::Error;

use super::process::Process;
use super::state::{self, looks_like_state_code};

/// Name of the enumeration tool. A derived name equal to this is rejected.
pub const LISTING_TOOL: &str = "ps";

pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("row has {found} columns, expected at least {expected}")]
    MissingColumns { found: usize, expected: usize },
    #[error("invalid pid `{0}`")]
    InvalidPid(String),
    #[error("no state column after short name")]
    MissingState,
}

/// Column slices of one table row, before any coercion.
#[derive(Debug, PartialEq, Eq)]
pub struct RawRow {
    pub pid: String,
    pub ppid: String,
    pub cpu: String,
    pub mem: String,
    pub comm: String,
    pub stat: String,
    pub command: String,
}

const FIXED_COLUMNS: usize = 4;
const REQUIRED_COLUMNS: usize = 6;

/// Byte offset of the `STAT` heading in a table header, if present.
pub fn stat_column_offset(header: &str) -> Option<usize> {
    tokens_with_offsets(header)
        .into_iter()
        .find(|&(_, token)| token == "STAT")
        .map(|(offset, _)| offset)
}

/// Split a row into columns without header alignment. See [`split_row_aligned`].
pub fn split_row(line: &str) -> Result<RawRow, NormalizeError> {
    split_row_aligned(line, None)
}

/// Split a row into columns. The short name may contain spaces ("Web
/// Content"), so the state column is located in two steps: the token that
/// starts exactly at the header's `STAT` offset, when that token has the
/// shape of a state code; otherwise the first state-shaped token after at
/// least one short-name token.
pub fn split_row_aligned(
    line: &str,
    stat_offset: Option<usize>,
) -> Result<RawRow, NormalizeError> {
    let tokens = tokens_with_offsets(line);
    if tokens.len() < REQUIRED_COLUMNS {
        return Err(NormalizeError::MissingColumns {
            found: tokens.len(),
            expected: REQUIRED_COLUMNS,
        });
    }

    let candidates = FIXED_COLUMNS + 1..tokens.len();
    let aligned = stat_offset.and_then(|offset| {
        candidates
            .clone()
            .find(|&i| tokens[i].0 == offset && looks_like_state_code(tokens[i].1))
    });
    let state_idx = aligned
        .or_else(|| candidates.clone().find(|&i| looks_like_state_code(tokens[i].1)))
        .ok_or(NormalizeError::MissingState)?;

    Ok(RawRow {
        pid: tokens[0].1.to_string(),
        ppid: tokens[1].1.to_string(),
        cpu: tokens[2].1.to_string(),
        mem: tokens[3].1.to_string(),
        comm: join_tokens(&tokens[FIXED_COLUMNS..state_idx]),
        stat: tokens[state_idx].1.to_string(),
        command: join_tokens(&tokens[state_idx + 1..]),
    })
}

fn join_tokens(tokens: &[(usize, &str)]) -> String {
    tokens
        .iter()
        .map(|&(_, token)| token)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace-separated tokens with their starting byte offsets.
fn tokens_with_offsets(line: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, c) in line.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                tokens.push((s, &line[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push((s, &line[s..]));
    }
    tokens
}

pub fn normalize_row(line: &str, total_memory: u64) -> Result<Process, NormalizeError> {
    normalize_row_aligned(line, total_memory, None)
}

pub fn normalize_row_aligned(
    line: &str,
    total_memory: u64,
    stat_offset: Option<usize>,
) -> Result<Process, NormalizeError> {
    let row = split_row_aligned(line, stat_offset)?;
    normalize(&row, total_memory)
}

pub fn normalize(row: &RawRow, total_memory: u64) -> Result<Process, NormalizeError> {
    let pid = row
        .pid
        .parse::<u32>()
        .map_err(|_| NormalizeError::InvalidPid(row.pid.clone()))?;
    let state = state::decode(&row.stat).ok_or(NormalizeError::MissingState)?;
    let mem_percent = coerce_percent(&row.mem);

    Ok(Process {
        pid,
        ppid: row.ppid.parse().ok(),
        cpu_percent: coerce_percent(&row.cpu),
        memory_bytes: percent_to_bytes(mem_percent, total_memory),
        name: derive_name(&row.command, &row.comm),
        state,
        command: row.command.clone(),
        icon_path: None,
    })
}

/// Pick a display name. When the command contains a `/`, the first word of
/// its last path segment wins, so `node /srv/app/server.js` is `server.js`.
/// Otherwise the short name without path prefix, then the raw short name. An
/// empty or `.` result becomes [`UNKNOWN_NAME`].
pub fn derive_name(command: &str, comm: &str) -> String {
    let from_command = if command.contains('/') {
        command
            .rsplit('/')
            .next()
            .and_then(|tail| tail.split_whitespace().next())
    } else {
        None
    };

    let candidate = match from_command {
        Some(name) => name,
        None => comm.rsplit('/').next().unwrap_or_default(),
    };

    let candidate = if candidate.is_empty() || candidate == "." || candidate == LISTING_TOOL {
        comm.trim()
    } else {
        candidate
    };

    if candidate.is_empty() || candidate == "." {
        UNKNOWN_NAME.to_string()
    } else {
        candidate.to_string()
    }
}

/// Parse a percentage column. Anything unparsable, negative or non-finite
/// becomes zero. Accepts a comma decimal separator.
pub fn coerce_percent(raw: &str) -> f32 {
    let raw = raw.trim();
    raw.parse::<f32>()
        .or_else(|_| raw.replace(',', ".").parse::<f32>())
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

/// `%mem` of total physical memory, in bytes. An approximation of resident
/// memory, not an RSS read. The percentage is clamped to 0..=100.
pub fn percent_to_bytes(percent: f32, total_memory: u64) -> u64 {
    let percent = f64::from(percent.clamp(0.0, 100.0));
    (percent / 100.0 * total_memory as f64).round() as u64
}
