use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use super::invoke::{Invocation, Termination, invoke};
use crate::config::SandboxConfig;

/// How the run stage ended
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RunStatus {
    /// Exited with status zero inside the budget
    Finished,
    /// Exited with a non-zero status inside the budget
    Error,
    /// Budget elapsed before exit; the process group was killed
    TimedOut,
}

pub struct RunReport {
    pub status: RunStatus,
    /// Combined stdout+stderr, wrapper banner lines already stripped
    pub output: String,
}

enum Mode {
    /// Run command nested under the configured confinement wrapper
    Confined(SandboxConfig),
    /// Bare execution, for hosts without the wrapper installed
    Direct,
}

/// Runs compiled submissions under the confinement wrapper when available
///
/// Confinement itself (filesystem, network, syscalls) is the wrapper's job;
/// this only builds the nested command line and enforces the time budget.
pub struct Executor {
    mode: Mode,
}

impl Executor {
    /// Picks the execution mode from config and what the host actually has
    pub fn from_config(sandbox: &SandboxConfig) -> Self {
        if sandbox.command.is_empty() {
            log::warn!("No confinement wrapper configured, submissions run unconfined");
            return Self { mode: Mode::Direct };
        }
        let available = std::process::Command::new("which")
            .arg(&sandbox.command[0])
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false);
        if available {
            log::info!("Using confinement wrapper {}", sandbox.command[0]);
            Self {
                mode: Mode::Confined(sandbox.clone()),
            }
        } else {
            log::warn!(
                "Confinement wrapper {} not found on this host, submissions run unconfined",
                sandbox.command[0]
            );
            Self { mode: Mode::Direct }
        }
    }

    /// Runs the submission in its workspace under the wall-clock budget
    pub async fn execute(
        &self,
        workdir: &Path,
        run_argv: &[String],
        stdin: Option<&[u8]>,
        budget: Duration,
    ) -> Result<RunReport> {
        let argv = match &self.mode {
            Mode::Confined(sandbox) => {
                let mut argv = sandbox.wrapper_command(&workdir.to_string_lossy());
                argv.extend(run_argv.iter().cloned());
                argv
            }
            Mode::Direct => run_argv.to_vec(),
        };

        let outcome = invoke(Invocation {
            argv: &argv,
            workdir,
            stdin,
            capture: workdir.join("run.out"),
            deadline: Some(budget),
        })
        .await?;

        let output = match &self.mode {
            Mode::Confined(sandbox) if sandbox.banner_lines > 0 => {
                strip_banner(&outcome.output, sandbox.banner_lines)
            }
            _ => outcome.output,
        };
        let status = match outcome.termination {
            Termination::Exited(status) if status.success() => RunStatus::Finished,
            Termination::Exited(status) => {
                log::debug!("Submission process exited with {status}");
                RunStatus::Error
            }
            Termination::TimedOut => RunStatus::TimedOut,
        };
        Ok(RunReport { status, output })
    }
}

/// Drops the wrapper's own introductory lines from the captured output
///
/// Counts whole newline-terminated lines only; when the capture holds fewer
/// than `banner_lines` of them, everything present is banner and the program
/// produced nothing yet.
fn strip_banner(output: &str, banner_lines: usize) -> String {
    let mut rest = output;
    for _ in 0..banner_lines {
        match rest.find('\n') {
            Some(i) => rest = &rest[i + 1..],
            None => return String::new(),
        }
    }
    rest.to_string()
}
