mod compile;
mod execute;
mod invoke;
mod normalize;
mod verdict;
mod workspace;

pub use verdict::Verdict;

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{Config, ToolchainConfig};
use execute::{Executor, RunStatus};
use normalize::normalize;
use workspace::Workspace;

static ENTRY_NAME: OnceLock<Regex> = OnceLock::new();

fn entry_name_pattern() -> &'static Regex {
    ENTRY_NAME.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap())
}

/// Validated entry-point name of a submission
///
/// Derived from the uploaded file name and restricted to a safe identifier
/// set, so it can never traverse out of the workspace or smuggle shell
/// metacharacters into toolchain command lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryName(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameError {
    /// File name does not end with the toolchain's source extension
    Extension,
    /// Name contains characters outside `[A-Za-z0-9_-]`
    Identifier,
}

impl EntryName {
    pub fn from_file_name(file_name: &str, extension: &str) -> Result<Self, NameError> {
        let suffix = format!(".{extension}");
        let stem = file_name
            .strip_suffix(&suffix)
            .ok_or(NameError::Extension)?;
        if entry_name_pattern().is_match(stem) {
            Ok(Self(stem.to_string()))
        } else {
            Err(NameError::Identifier)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Explicit time budget that was zero or negative
#[derive(Debug, PartialEq, Eq)]
pub struct NonPositiveTimeLimit(pub i64);

/// Applies the time-budget rule to the optional request field
///
/// An absent or unparseable value falls back to the default; an explicitly
/// non-positive integer is refused.
pub fn resolve_time_limit(
    raw: Option<&str>,
    default_secs: u64,
) -> Result<Duration, NonPositiveTimeLimit> {
    match raw {
        None => Ok(Duration::from_secs(default_secs)),
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(n) if n > 0 => Ok(Duration::from_secs(n as u64)),
            Ok(n) => Err(NonPositiveTimeLimit(n)),
            Err(_) => Ok(Duration::from_secs(default_secs)),
        },
    }
}

/// One validated submission, ready for judging
pub struct Submission {
    pub entry: EntryName,
    pub source: Vec<u8>,
    pub stdin: Option<Vec<u8>>,
    pub expected: Vec<u8>,
    pub time_limit: Duration,
}

/// Terminal result record for one submission
///
/// `compile_output` and `runtime_output` are always present; a stage that
/// never ran contributes an empty string.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JudgeReport {
    pub status: Verdict,
    pub compile_output: String,
    pub runtime_output: String,
}

impl JudgeReport {
    /// Failure record for the service itself, keeping whatever compile
    /// diagnostics were captured before the failure
    fn internal_error(compile_output: String) -> Self {
        Self {
            status: Verdict::InternalError,
            compile_output,
            runtime_output: String::new(),
        }
    }
}

/// The judging pipeline, shared across all requests
///
/// Stages run strictly in order for each submission: stage source in a fresh
/// workspace, compile, execute under confinement and budget, normalize both
/// outputs, compare. Each submission gets its own workspace, so concurrent
/// runs never touch each other's files.
pub struct Judge {
    toolchain: ToolchainConfig,
    executor: Executor,
    workspace_root: Option<PathBuf>,
    compile_time_limit: Option<Duration>,
}

impl Judge {
    pub fn new(config: &Config) -> Self {
        Self {
            toolchain: config.toolchain.clone(),
            executor: Executor::from_config(&config.sandbox),
            workspace_root: config.workspace_root.clone(),
            compile_time_limit: config
                .limits
                .compile_time_limit_secs
                .map(Duration::from_secs),
        }
    }

    /// Judges one submission through to a terminal report
    ///
    /// Infrastructure failures (workspace, staging, process launch) surface
    /// as `InternalError` so callers can tell a broken service apart from a
    /// wrong program.
    pub async fn run(&self, submission: Submission) -> JudgeReport {
        let entry = submission.entry.clone();
        match self.try_run(submission).await {
            Ok(report) => {
                log::info!("Submission {} judged: {}", entry.as_str(), report.status);
                report
            }
            Err(e) => {
                log::error!("Judging {} failed internally: {e:#}", entry.as_str());
                JudgeReport::internal_error(String::new())
            }
        }
    }

    async fn try_run(&self, submission: Submission) -> Result<JudgeReport> {
        log::debug!("Judging submission {}", submission.entry.as_str());
        let workspace = Workspace::acquire(self.workspace_root.as_deref())?;
        workspace.stage(
            &self.toolchain.source_file_name(submission.entry.as_str()),
            &submission.source,
        )?;

        let compiled = compile::compile(
            &self.toolchain,
            workspace.path(),
            submission.entry.as_str(),
            self.compile_time_limit,
        )
        .await?;
        if !compiled.success {
            return Ok(JudgeReport {
                status: Verdict::CompileError,
                compile_output: compiled.output,
                runtime_output: String::new(),
            });
        }

        let run = match self
            .executor
            .execute(
                workspace.path(),
                &self.toolchain.run_command(submission.entry.as_str()),
                submission.stdin.as_deref(),
                submission.time_limit,
            )
            .await
        {
            Ok(run) => run,
            Err(e) => {
                log::error!(
                    "Executing {} failed internally: {e:#}",
                    submission.entry.as_str()
                );
                return Ok(JudgeReport::internal_error(compiled.output));
            }
        };

        let status = match run.status {
            RunStatus::TimedOut => Verdict::TimedOut,
            RunStatus::Error => Verdict::RuntimeError,
            RunStatus::Finished => {
                let expected = String::from_utf8_lossy(&submission.expected);
                verdict::decide(&normalize(&run.output), &normalize(&expected))
            }
        };
        Ok(JudgeReport {
            status,
            compile_output: compiled.output,
            runtime_output: run.output,
        })
    }
}
