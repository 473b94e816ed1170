//! Probe process management
//!
//! Spawns the probe and hands its stdout back one line at a time. The child
//! is spawned with `kill_on_drop`, so dropping [`ProbeLines`] at any point
//! (early failure, timeout, cancelled future) terminates and reaps it.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

use super::RunSpec;
use crate::common::{Error, Result};

/// How long to wait for stderr to close once the probe has exited or been
/// killed; a leftover grandchild may keep it open indefinitely
const STDERR_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// How the probe process ended
#[derive(Debug, Clone, Default)]
pub struct ProbeExit {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub success: bool,
    /// Last lines the probe wrote to stderr
    pub stderr_tail: Vec<String>,
}

type StderrTail = Arc<Mutex<VecDeque<String>>>;

/// Lazily produced stdout lines of a running probe
pub struct ProbeLines {
    binary: PathBuf,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_tail: StderrTail,
    stderr_task: Option<JoinHandle<()>>,
    buf: Vec<u8>,
}

/// Resolve the probe binary
///
/// Bare names are looked up on `PATH`; anything with a directory component
/// is used as given.
pub fn resolve_binary(binary: &Path) -> Result<PathBuf> {
    if binary.components().count() > 1 || binary.is_absolute() {
        if !binary.exists() {
            return Err(Error::launch(binary, "no such file"));
        }
        return Ok(binary.to_path_buf());
    }
    which::which(binary).map_err(|e| Error::launch(binary, e))
}

/// Drop a trailing `\n` or `\r\n`
pub(crate) fn trim_line_ending(line: &mut Vec<u8>) {
    if line.ends_with(b"\n") {
        line.pop();
    }
    if line.ends_with(b"\r") {
        line.pop();
    }
}

/// Launch the probe for one run
pub fn launch(spec: &RunSpec, stderr_tail_lines: usize) -> Result<ProbeLines> {
    let binary = resolve_binary(&spec.binary)?;
    let args = spec.args();

    tracing::debug!(variant = %spec.name, binary = %binary.display(), ?args, "launching probe");

    let mut child = Command::new(&binary)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::launch(&binary, e))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Internal("Failed to get probe stdout".to_string()))?;

    // Drained concurrently so a chatty probe cannot block on a full pipe
    let stderr_tail: StderrTail = Arc::new(Mutex::new(VecDeque::with_capacity(stderr_tail_lines)));
    let stderr_task = child.stderr.take().map(|stderr| {
        let tail = Arc::clone(&stderr_tail);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).split(b'\n');
            while let Ok(Some(mut line)) = lines.next_segment().await {
                if stderr_tail_lines == 0 {
                    continue;
                }
                trim_line_ending(&mut line);
                if let Ok(mut tail) = tail.lock() {
                    if tail.len() == stderr_tail_lines {
                        tail.pop_front();
                    }
                    tail.push_back(String::from_utf8_lossy(&line).into_owned());
                }
            }
        })
    });

    Ok(ProbeLines {
        binary,
        child,
        stdout: BufReader::new(stdout),
        stderr_tail,
        stderr_task,
        buf: Vec::new(),
    })
}

impl ProbeLines {
    /// Wait for the next stdout line
    ///
    /// Returns `Ok(None)` once the probe closes stdout. The line terminator
    /// is stripped; the bytes are otherwise handed back untouched, and a
    /// final line without a terminator is still returned.
    pub async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.buf.clear();
        let read = self.stdout.read_until(b'\n', &mut self.buf).await?;
        if read == 0 {
            return Ok(None);
        }
        trim_line_ending(&mut self.buf);
        Ok(Some(self.buf.clone()))
    }

    /// Wait for the probe to exit after its output was drained
    pub async fn finish(mut self) -> Result<ProbeExit> {
        let status = self.child.wait().await?;
        let stderr_tail = self.collect_stderr().await;
        tracing::debug!(binary = %self.binary.display(), code = ?status.code(), "probe exited");
        Ok(ProbeExit {
            code: status.code(),
            success: status.success(),
            stderr_tail,
        })
    }

    /// Terminate the probe without waiting for its output
    pub async fn kill(mut self) -> ProbeExit {
        if let Err(e) = self.child.kill().await {
            tracing::warn!(binary = %self.binary.display(), "failed to kill probe: {}", e);
        }
        let code = self.child.try_wait().ok().flatten().and_then(|s| s.code());
        let stderr_tail = self.collect_stderr().await;
        ProbeExit {
            code,
            success: false,
            stderr_tail,
        }
    }

    /// Stderr lines read so far, after giving the reader a short grace period
    async fn collect_stderr(&mut self) -> Vec<String> {
        if let Some(mut task) = self.stderr_task.take() {
            if tokio::time::timeout(STDERR_DRAIN_GRACE, &mut task).await.is_err() {
                tracing::debug!(binary = %self.binary.display(), "stderr still open, not waiting for it");
                task.abort();
            }
        }
        self.stderr_tail
            .lock()
            .map(|tail| tail.iter().cloned().collect())
            .unwrap_or_default()
    }
}
