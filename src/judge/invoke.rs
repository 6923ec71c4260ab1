use std::fs;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// One subprocess launch with combined output capture
///
/// stdout and stderr share a single capture file so their interleaving is
/// preserved and whatever was written survives even when the process is
/// killed mid-stream.
pub struct Invocation<'a> {
    pub argv: &'a [String],
    pub workdir: &'a Path,
    /// Payload fed to the child's stdin; stdin is `/dev/null` when absent
    pub stdin: Option<&'a [u8]>,
    /// File the combined stdout+stderr stream is written to
    pub capture: PathBuf,
    /// Wall-clock budget; the run is unbounded when absent
    pub deadline: Option<Duration>,
}

/// How the subprocess stopped
///
/// `Exited` means the process reported its exit status before any deadline
/// fired, `TimedOut` means the deadline fired first and the whole process
/// group was killed. When both race to the same instant the exit wins; the
/// wait branch is polled ahead of the cancellation branch.
pub enum Termination {
    Exited(ExitStatus),
    TimedOut,
}

pub struct InvocationOutcome {
    /// Combined stdout+stderr, decoded lossily
    pub output: String,
    pub termination: Termination,
}

/// Runs one subprocess to completion or until its deadline fires
///
/// The child is placed in its own process group so a deadline kill reaches
/// anything it spawned. The child is always reaped before this returns; no
/// process from the invocation outlives it.
pub async fn invoke(inv: Invocation<'_>) -> Result<InvocationOutcome> {
    if inv.argv.is_empty() {
        bail!("Empty command");
    }

    let capture_file = fs::File::create(&inv.capture)
        .map_err(|e| anyhow!("Failed to create capture file: {}", e))?;

    let mut cmd = tokio::process::Command::new(&inv.argv[0]);
    cmd.args(&inv.argv[1..])
        .stdin(if inv.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::from(capture_file.try_clone()?))
        .stderr(Stdio::from(capture_file))
        .current_dir(inv.workdir)
        .process_group(0)
        .kill_on_drop(true);

    log::debug!("Invoking {:?} in {}", inv.argv, inv.workdir.display());
    let mut child = cmd
        .spawn()
        .map_err(|e| anyhow!("Failed to spawn {}: {}", inv.argv[0], e))?;
    let pid = child.id();
    let stdin_pipe = child.stdin.take();

    let termination = match inv.deadline {
        None => {
            feed_stdin(stdin_pipe, inv.stdin).await?;
            let status = child
                .wait()
                .await
                .map_err(|e| anyhow!("Failed to wait for {}: {}", inv.argv[0], e))?;
            Termination::Exited(status)
        }
        Some(budget) => {
            let cancel = CancellationToken::new();
            let timer = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(budget).await;
                    cancel.cancel();
                })
            };

            let mut wait_fut = std::pin::pin!(async {
                feed_stdin(stdin_pipe, inv.stdin).await?;
                child
                    .wait()
                    .await
                    .map_err(|e| anyhow!("Failed to wait for {}: {}", inv.argv[0], e))
            });
            let termination = tokio::select! {
                biased;
                status = &mut wait_fut => Termination::Exited(status?),
                _ = cancel.cancelled() => {
                    // process_group(0) above makes the child's pid its pgid
                    if let Some(pid) = pid {
                        unsafe { libc::killpg(pid as i32, libc::SIGKILL) };
                    }
                    let _ = wait_fut.await;
                    Termination::TimedOut
                }
            };
            timer.abort();
            termination
        }
    };

    let captured = fs::read(&inv.capture)
        .map_err(|e| anyhow!("Failed to read capture file: {}", e))?;
    Ok(InvocationOutcome {
        output: String::from_utf8_lossy(&captured).into_owned(),
        termination,
    })
}

/// Writes the stdin payload and closes the pipe so the child sees EOF
///
/// A child that exits without draining its stdin closes the read end; the
/// resulting broken pipe is its business, not an invocation failure.
async fn feed_stdin(
    pipe: Option<tokio::process::ChildStdin>,
    payload: Option<&[u8]>,
) -> Result<()> {
    let (Some(pipe), Some(payload)) = (pipe, payload) else {
        return Ok(());
    };
    let mut writer = tokio::io::BufWriter::new(pipe);
    let delivered = async {
        writer.write_all(payload).await?;
        writer.flush().await
    }
    .await;
    match delivered {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(anyhow!("Failed to write stdin payload: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::judge::workspace::Workspace;

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_captures_both_streams_in_order() {
        let ws = Workspace::acquire(None).unwrap();
        let outcome = invoke(Invocation {
            argv: &sh("echo one; echo two 1>&2; echo three"),
            workdir: ws.path(),
            stdin: None,
            capture: ws.path().join("cap.out"),
            deadline: None,
        })
        .await
        .unwrap();
        assert_eq!(outcome.output, "one\ntwo\nthree\n");
        assert!(matches!(outcome.termination, Termination::Exited(st) if st.success()));
    }

    #[tokio::test]
    async fn test_nonzero_exit_reported() {
        let ws = Workspace::acquire(None).unwrap();
        let outcome = invoke(Invocation {
            argv: &sh("exit 3"),
            workdir: ws.path(),
            stdin: None,
            capture: ws.path().join("cap.out"),
            deadline: None,
        })
        .await
        .unwrap();
        match outcome.termination {
            Termination::Exited(st) => assert_eq!(st.code(), Some(3)),
            Termination::TimedOut => panic!("should not time out"),
        }
    }

    #[tokio::test]
    async fn test_stdin_payload_delivered() {
        let ws = Workspace::acquire(None).unwrap();
        let outcome = invoke(Invocation {
            argv: &sh("cat"),
            workdir: ws.path(),
            stdin: Some(b"ping\npong\n"),
            capture: ws.path().join("cap.out"),
            deadline: Some(Duration::from_secs(5)),
        })
        .await
        .unwrap();
        assert_eq!(outcome.output, "ping\npong\n");
    }

    #[tokio::test]
    async fn test_exit_without_draining_stdin_is_not_an_error() {
        let ws = Workspace::acquire(None).unwrap();
        let payload = vec![b'x'; 1 << 20];
        let outcome = invoke(Invocation {
            argv: &sh("exit 0"),
            workdir: ws.path(),
            stdin: Some(&payload),
            capture: ws.path().join("cap.out"),
            deadline: Some(Duration::from_secs(5)),
        })
        .await
        .unwrap();
        assert!(matches!(outcome.termination, Termination::Exited(st) if st.success()));
    }

    #[tokio::test]
    async fn test_deadline_fires_and_keeps_partial_output() {
        let ws = Workspace::acquire(None).unwrap();
        let start = Instant::now();
        let outcome = invoke(Invocation {
            argv: &sh("echo started; sleep 30"),
            workdir: ws.path(),
            stdin: None,
            capture: ws.path().join("cap.out"),
            deadline: Some(Duration::from_millis(400)),
        })
        .await
        .unwrap();
        assert!(matches!(outcome.termination, Termination::TimedOut));
        assert_eq!(outcome.output, "started\n");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_fast_exit_beats_generous_deadline() {
        let ws = Workspace::acquire(None).unwrap();
        let outcome = invoke(Invocation {
            argv: &sh("echo done"),
            workdir: ws.path(),
            stdin: None,
            capture: ws.path().join("cap.out"),
            deadline: Some(Duration::from_secs(30)),
        })
        .await
        .unwrap();
        assert!(matches!(outcome.termination, Termination::Exited(_)));
        assert_eq!(outcome.output, "done\n");
    }

    #[tokio::test]
    async fn test_runs_in_given_working_directory() {
        let ws = Workspace::acquire(None).unwrap();
        ws.stage("marker.txt", b"here").unwrap();
        let outcome = invoke(Invocation {
            argv: &sh("cat marker.txt"),
            workdir: ws.path(),
            stdin: None,
            capture: ws.path().join("cap.out"),
            deadline: None,
        })
        .await
        .unwrap();
        assert_eq!(outcome.output, "here");
    }
}
