//! External tool invocation. Everything that shells out goes through
//! [`CommandRunner`] so sampling and metrics parsing can run against canned
//! output in tests.

use std::io;
use std::process::{Command, Stdio};
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program}` exited with {}: {stderr}", exit_label(.code))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("`{program}` worker did not complete")]
    Join { program: String },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

pub trait CommandRunner: Send + Sync {
    /// Run `program` to completion and return its stdout.
    fn run(&self, program: &str, args: &[String]) -> Result<String, ToolError>;
}

/// Runs real binaries from `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

const STDERR_EXCERPT: usize = 200;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String, ToolError> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ToolError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::Exit {
                program: program.to_string(),
                code: output.status.code(),
                stderr: stderr.trim().chars().take(STDERR_EXCERPT).collect(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Run a tool on the blocking pool so the scheduler thread never waits on it.
pub async fn run_tool(
    runner: &Arc<dyn CommandRunner>,
    program: &str,
    args: Vec<String>,
) -> Result<String, ToolError> {
    let runner = Arc::clone(runner);
    let owned_program = program.to_string();
    tokio::task::spawn_blocking(move || runner.run(&owned_program, &args))
        .await
        .unwrap_or_else(|_| {
            Err(ToolError::Join {
                program: program.to_string(),
            })
        })
}

pub fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
