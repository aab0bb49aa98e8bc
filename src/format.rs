use std::fmt::Write;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::system::process::Process;

pub const CSV_HEADER: &str = "PID,Process Name,CPU (%),Memory (bytes),Status";

const NAME_WIDTH: usize = 24;
const STATE_WIDTH: usize = 28;

pub fn truncate_unicode(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > max_width.saturating_sub(1) {
            result.push('\u{2026}');
            break;
        }
        result.push(ch);
        width += ch_width;
    }
    result
}

/// Truncate, then right-pad to exactly `width` display columns.
pub fn pad_unicode(s: &str, width: usize) -> String {
    let mut out = truncate_unicode(s, width);
    let used = out.width();
    out.extend(std::iter::repeat_n(' ', width.saturating_sub(used)));
    out
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Human-readable process table. `command_width` bounds the last column.
pub fn render_table(processes: &[Process], command_width: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>7}  {}  {:>6}  {:>9}  {}  COMMAND",
        "PID",
        pad_unicode("NAME", NAME_WIDTH),
        "CPU%",
        "MEMORY",
        pad_unicode("STATE", STATE_WIDTH),
    );
    for p in processes {
        let _ = writeln!(
            out,
            "{:>7}  {}  {:>6.1}  {:>9}  {}  {}",
            p.pid,
            pad_unicode(&p.name, NAME_WIDTH),
            p.cpu_percent,
            format_bytes(p.memory_bytes),
            pad_unicode(&p.state.to_string(), STATE_WIDTH),
            truncate_unicode(&p.command, command_width),
        );
    }
    out
}

pub fn render_csv(processes: &[Process]) -> String {
    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');
    for p in processes {
        let _ = writeln!(
            out,
            "{},{},{:.1},{},{}",
            p.pid,
            csv_field(&p.name),
            p.cpu_percent,
            p.memory_bytes,
            csv_field(&p.state.to_string()),
        );
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
