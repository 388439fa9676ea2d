// Build coordination: run the external compiler once and classify the outcome

use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{CompilerCommand, RunnerConfig};
use crate::error::{RunnerError, RunnerResult};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Outcome of the single compiler run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildResult {
    pub success: bool,
    /// None when the compiler was killed
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Monotonic duration of the compiler run
    pub elapsed_ms: u64,
}

impl BuildResult {
    /// Both captured streams, stdout first.
    pub fn diagnostics(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end_matches('\n'), self.stderr),
        }
    }
}

/// Spawns the compiler against the synthesized program.
///
/// There is no re-entrancy guard here: calling [`BuildCoordinator::build`]
/// twice compiles twice. [`crate::runtime::runner::ActionRunner`] is the
/// component that makes the build happen at most once.
#[derive(Debug, Clone)]
pub struct BuildCoordinator {
    compiler: CompilerCommand,
    source_path: PathBuf,
    binary_path: PathBuf,
    timeout: Duration,
}

impl BuildCoordinator {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            compiler: config.compiler.clone(),
            source_path: config.source_path.clone(),
            binary_path: config.binary_path.clone(),
            timeout: config.build_timeout,
        }
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Run the compiler to completion.
    ///
    /// `Ok` carries both successful and failed compilations; `Err` is reserved
    /// for infrastructure problems such as a missing compiler binary.
    pub fn build(&self) -> RunnerResult<BuildResult> {
        let args = self
            .compiler
            .resolve_args(&self.source_path, &self.binary_path);
        info!(
            program = %self.compiler.program,
            args = ?args,
            "starting compilation"
        );

        let started_at = Utc::now();
        let start = Instant::now();

        let mut cmd = Command::new(&self.compiler.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group so a timeout also reaches compiler subprocesses
        // that inherited the pipes
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .map_err(|source| RunnerError::CompilerSpawn {
                program: self.compiler.program.clone(),
                source,
            })?;

        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let waited = wait_with_deadline(&mut child, self.timeout);

        // Readers finish once the child (and its pipe ends) are gone.
        let stdout = collect(stdout_reader);
        let mut stderr = collect(stderr_reader);

        let elapsed = start.elapsed();
        let finished_at = Utc::now();

        let status = waited.map_err(|e| RunnerError::io(&self.compiler.program, e))?;
        let timed_out = status.is_none();
        if timed_out {
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&format!(
                "compiler killed after exceeding build timeout of {}s\n",
                self.timeout.as_secs_f64()
            ));
        }

        let exit_code = status.and_then(|s| s.code());
        let success = status.map(|s| s.success()).unwrap_or(false);

        let result = BuildResult {
            success,
            exit_code,
            stdout,
            stderr,
            timed_out,
            started_at,
            finished_at,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        };

        if result.success {
            info!(
                elapsed_ms = result.elapsed_ms,
                binary = %self.binary_path.display(),
                "finished compilation"
            );
        } else {
            warn!(
                elapsed_ms = result.elapsed_ms,
                exit_code = ?result.exit_code,
                timed_out,
                "compilation failed"
            );
            self.discard_partial_artifact();
        }

        Ok(result)
    }

    fn discard_partial_artifact(&self) {
        match fs::remove_file(&self.binary_path) {
            Ok(()) => debug!(path = %self.binary_path.display(), "removed partial artifact"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.binary_path.display(),
                error = %e,
                "failed to remove partial artifact"
            ),
        }
    }
}

/// True iff `path` is a regular file the runner may execute.
pub fn verify_artifact(path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Poll the child until it exits or the deadline passes.
/// Returns `Ok(None)` when the child had to be killed. A timeout too large to
/// represent as an `Instant` means no deadline.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {
                let pause = match deadline {
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            terminate(child);
                            return Ok(None);
                        }
                        POLL_INTERVAL.min(deadline - now)
                    }
                    None => POLL_INTERVAL,
                };
                thread::sleep(pause);
            }
            Err(e) => {
                terminate(child);
                return Err(e);
            }
        }
    }
}

/// Kill the child's whole process group, then reap the child.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        // The group id equals the child's pid (see `process_group(0)`)
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: kill(2) takes no pointers; a negative pid addresses the group.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn collect(reader: thread::JoinHandle<Vec<u8>>) -> String {
    let bytes = reader.join().unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}
