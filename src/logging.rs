use color_eyre::eyre::{Result, eyre};
use tracing_subscriber::filter::LevelFilter;

/// Install the global subscriber. Output goes to stderr; stdout is reserved
/// for the JSON-lines stream.
pub fn init(level: &str, json: bool) -> Result<()> {
    let level = parse_level(level)?;
    let builder = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(level)
        .with_writer(std::io::stderr);

    let installed = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.map_err(|e| eyre!("failed to set tracing subscriber: {e}"))
}

pub fn parse_level(level: &str) -> Result<LevelFilter> {
    level
        .trim()
        .parse()
        .map_err(|_| eyre!("unknown log level `{level}` (expected off, error, warn, info, debug or trace)"))
}
