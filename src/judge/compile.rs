use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use super::invoke::{Invocation, Termination, invoke};
use crate::config::ToolchainConfig;

/// Outcome of the compile stage
pub struct CompileReport {
    /// True iff the compiler exited with status zero
    pub success: bool,
    /// Combined compiler stdout+stderr
    pub output: String,
}

/// Compiles the staged source inside the workspace
///
/// Compilation runs without a deadline unless one is configured. A configured
/// deadline that fires counts as a failed compile, with a note appended to
/// whatever the compiler managed to print.
pub async fn compile(
    toolchain: &ToolchainConfig,
    workdir: &Path,
    entry: &str,
    time_limit: Option<Duration>,
) -> Result<CompileReport> {
    let argv = toolchain.compile_command(entry);
    let outcome = invoke(Invocation {
        argv: &argv,
        workdir,
        stdin: None,
        capture: workdir.join("compile.out"),
        deadline: time_limit,
    })
    .await?;

    match outcome.termination {
        Termination::Exited(status) => Ok(CompileReport {
            success: status.success(),
            output: outcome.output,
        }),
        Termination::TimedOut => {
            log::warn!("Compilation of {entry} exceeded its time limit");
            let mut output = outcome.output;
            output.push_str("\ncompilation terminated: time limit exceeded\n");
            Ok(CompileReport {
                success: false,
                output,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::workspace::Workspace;

    fn sh_toolchain() -> ToolchainConfig {
        ToolchainConfig {
            name: "shell".to_string(),
            source_extension: "sh".to_string(),
            compile: vec![
                "/bin/sh".to_string(),
                "-n".to_string(),
                "%SOURCE%".to_string(),
            ],
            run: vec!["/bin/sh".to_string(), "%SOURCE%".to_string()],
        }
    }

    #[tokio::test]
    async fn test_clean_source_compiles() {
        let ws = Workspace::acquire(None).unwrap();
        ws.stage("prog.sh", b"echo hi\n").unwrap();
        let report = compile(&sh_toolchain(), ws.path(), "prog", None)
            .await
            .unwrap();
        assert!(report.success);
    }

    #[tokio::test]
    async fn test_broken_source_reports_diagnostics() {
        let ws = Workspace::acquire(None).unwrap();
        ws.stage("prog.sh", b"fi\n").unwrap();
        let report = compile(&sh_toolchain(), ws.path(), "prog", None)
            .await
            .unwrap();
        assert!(!report.success);
        assert!(!report.output.is_empty());
    }

    #[tokio::test]
    async fn test_configured_deadline_fails_the_compile() {
        let toolchain = ToolchainConfig {
            compile: vec!["sleep".to_string(), "30".to_string()],
            ..sh_toolchain()
        };
        let ws = Workspace::acquire(None).unwrap();
        ws.stage("prog.sh", b"echo hi\n").unwrap();
        let report = compile(
            &toolchain,
            ws.path(),
            "prog",
            Some(Duration::from_millis(300)),
        )
        .await
        .unwrap();
        assert!(!report.success);
        assert!(report.output.contains("time limit exceeded"));
    }
}
