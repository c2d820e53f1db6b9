//! Command executor - runs one external program to completion
//!
//! stdout and stderr are merged into a single pipe, so the combined output
//! keeps the interleaving the program produced. The wait polls the child and
//! the [`RunContext`]; an interrupted run kills the child and returns.

use crate::cancel::{Interrupt, RunContext};
use crate::diag::{Diagnostic, Diagnostics};
use crate::error::{Error, Result};
use crate::types::ProgramSpec;
use std::ffi::OsString;
use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to keep draining output once the child is gone
const DRAIN_GRACE: Duration = Duration::from_millis(500);

type SharedBuf = Arc<Mutex<Vec<u8>>>;

/// Run `program` with exactly `env` and report the outcome
///
/// Always yields a warning carrying the combined output. A failed run adds
/// an error whose detail repeats the command and the output.
pub fn run(ctx: &RunContext, program: &ProgramSpec, env: &[(OsString, OsString)]) -> Diagnostics {
    let command = program.display();
    log::debug!("Running {command}");

    let (output, outcome) = execute(ctx, program, env, &command);
    let text = String::from_utf8_lossy(&output);

    let mut diags = Diagnostics::new();
    diags.push(Diagnostic::warning(
        format!("Output of {command} ({} bytes)", output.len()),
        text.clone(),
    ));

    if let Err(err) = outcome {
        log::debug!("{err}");
        let mut diag = Diagnostic::from(err);
        let cause = if diag.detail.is_empty() {
            diag.summary.clone()
        } else {
            format!("{}: {}", diag.summary, diag.detail)
        };
        diag.detail = format!(
            "{cause}\n\ncommand: {command}\n\noutput ({} bytes):\n{text}",
            output.len()
        );
        diags.push(diag);
    }
    diags
}

fn execute(
    ctx: &RunContext,
    program: &ProgramSpec,
    env: &[(OsString, OsString)],
    command: &str,
) -> (Vec<u8>, Result<()>) {
    let spawn_error = |source| Error::Spawn {
        command: command.to_string(),
        source,
    };

    let (reader, writer) = match io::pipe() {
        Ok(pipe) => pipe,
        Err(e) => return (Vec::new(), Err(spawn_error(e))),
    };
    let writer_err = match writer.try_clone() {
        Ok(w) => w,
        Err(e) => return (Vec::new(), Err(spawn_error(e))),
    };

    let mut cmd = Command::new(program.program());
    cmd.args(program.args())
        .env_clear()
        .envs(env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(writer_err);
    let spawned = cmd.spawn();
    // The command holds our copies of the write end; the reader only sees
    // EOF once they are gone.
    drop(cmd);

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => return (Vec::new(), Err(spawn_error(e))),
    };

    let buf = SharedBuf::default();
    let done = spawn_reader(reader, Arc::clone(&buf));

    let outcome = wait(ctx, &mut child, command);
    drain(&done);

    let output = std::mem::take(&mut *buf.lock().unwrap_or_else(PoisonError::into_inner));
    (output, outcome)
}

fn spawn_reader(mut reader: io::PipeReader, buf: SharedBuf) -> Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => buf
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    log::debug!("Output pipe read failed: {e}");
                    break;
                }
            }
        }
        let _ = tx.send(());
    });
    rx
}

/// Wait for the reader to hit EOF, at most [`DRAIN_GRACE`].
///
/// The child has already exited or been killed here, but background
/// processes it started may still hold the pipe open.
fn drain(done: &Receiver<()>) {
    if done.recv_timeout(DRAIN_GRACE).is_err() {
        log::debug!("Output pipe still open after {DRAIN_GRACE:?}, not waiting further");
    }
}

fn wait(ctx: &RunContext, child: &mut Child, command: &str) -> Result<()> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                log::debug!("{command} exited with {status}");
                if status.success() {
                    return Ok(());
                }
                return Err(Error::ExitStatus {
                    command: command.to_string(),
                    status: status.to_string(),
                });
            }
            Ok(None) => {}
            Err(source) => {
                kill(child);
                return Err(Error::Wait {
                    command: command.to_string(),
                    source,
                });
            }
        }

        if let Some(interrupt) = ctx.interrupted() {
            log::debug!("Killing {command}: {interrupt:?}");
            kill(child);
            let command = command.to_string();
            return Err(match interrupt {
                Interrupt::Cancelled => Error::Cancelled { command },
                Interrupt::TimedOut(after) => Error::TimedOut { command, after },
            });
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("Failed to kill child {}: {e}", child.id());
    }
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::diag::Severity;
    use crate::types::Verb;
    use std::time::Instant;

    fn sh(script: &str) -> ProgramSpec {
        ProgramSpec::new(
            Verb::Create,
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        )
        .unwrap()
    }

    fn host_env() -> Vec<(OsString, OsString)> {
        std::env::vars_os().collect()
    }

    #[test]
    fn test_success_reports_combined_output() {
        let diags = run(
            &RunContext::background(),
            &sh("echo out; echo err >&2"),
            &host_env(),
        );

        assert!(!diags.has_error());
        assert_eq!(diags.len(), 1);
        let warning = diags.iter().next().unwrap();
        assert_eq!(warning.severity, Severity::Warning);
        assert_eq!(warning.detail, "out\nerr\n");
        assert!(warning.summary.contains("(8 bytes)"));
        assert!(warning.summary.contains("sh -c"));
    }

    #[test]
    fn test_non_zero_exit() {
        let diags = run(
            &RunContext::background(),
            &sh("echo failing; exit 7"),
            &host_env(),
        );

        assert!(diags.has_error());
        assert_eq!(diags.warnings().count(), 1);
        let errors: Vec<_> = diags.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].summary.contains("exit status: 7"));
        assert!(errors[0].detail.contains("failing"));
        assert!(errors[0].detail.contains("command: sh -c"));
    }

    #[test]
    fn test_spawn_failure() {
        let program = ProgramSpec::new(
            Verb::Read,
            vec!["/nonexistent/custom-provider-test-binary".to_string()],
        )
        .unwrap();
        let diags = run(&RunContext::background(), &program, &host_env());

        assert!(diags.has_error());
        let warning = diags.warnings().next().unwrap();
        assert!(warning.summary.contains("(0 bytes)"));
        let error = diags.errors().next().unwrap();
        assert!(error.summary.starts_with("error starting"));
    }

    #[test]
    fn test_environment_is_exact() {
        let env = vec![
            (OsString::from("PATH"), OsString::from("/usr/bin:/bin")),
            (OsString::from("EXT_MARKER"), OsString::from("present")),
        ];
        let diags = run(
            &RunContext::background(),
            &sh("printf '%s|%s' \"$EXT_MARKER\" \"${HOME:-unset}\""),
            &env,
        );
        assert!(!diags.has_error());
        assert_eq!(diags.iter().next().unwrap().detail, "present|unset");
    }

    #[test]
    fn test_timeout_kills_program() {
        let ctx = RunContext::background().with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        let diags = run(&ctx, &sh("echo started; exec sleep 30"), &host_env());

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(diags.has_error());
        let error = diags.errors().next().unwrap();
        assert!(error.summary.contains("timed out"));
        assert!(error.detail.contains("started"));
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let token = CancelToken::new();
        let ctx = RunContext::background().with_token(token.clone());
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            token.cancel();
        });

        let started = Instant::now();
        let diags = run(&ctx, &sh("exec sleep 30"), &host_env());
        canceller.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(diags.errors().next().unwrap().summary.contains("cancelled"));
    }

    #[test]
    fn test_background_process_does_not_hang() {
        let started = Instant::now();
        let diags = run(
            &RunContext::background(),
            &sh("sleep 30 & echo spawned"),
            &host_env(),
        );

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!diags.has_error());
        assert!(diags.iter().next().unwrap().detail.contains("spawned"));
    }

    #[test]
    fn test_background_process_with_deadline_does_not_hang() {
        let ctx = RunContext::background().with_timeout(Duration::from_secs(20));
        let started = Instant::now();
        let diags = run(&ctx, &sh("sleep 30 & echo spawned"), &host_env());

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!diags.has_error());
    }

    #[test]
    fn test_large_output_is_fully_drained() {
        let diags = run(
            &RunContext::background(),
            &sh("i=0; while [ $i -lt 2000 ]; do echo 0123456789012345678901234567890123456789; i=$((i+1)); done"),
            &host_env(),
        );

        assert!(!diags.has_error());
        assert_eq!(diags.iter().next().unwrap().detail.len(), 2000 * 41);
    }
}
