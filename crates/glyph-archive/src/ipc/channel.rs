//! # Module Channel
//!
//! One subprocess per call: write the request to stdin, close it, collect
//! stdout and stderr, wait with a deadline.
//!
//! Stdin is fed and both output pipes are drained on helper threads, so a
//! module that floods stdout before reading its input cannot wedge the
//! caller. The helpers report back over channels and the whole call, pipe
//! collection included, shares one deadline: a module that exits but leaves
//! a background process holding its pipes still times out. On timeout the
//! child is killed and the helpers are detached; anything they collect is
//! discarded.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use super::messages::{ModuleReply, ModuleRequest, MAX_IPC_PAYLOAD_BYTES};
use crate::domain::errors::IpcError;

/// Request/response channel to an external module executable.
#[derive(Debug, Clone)]
pub struct ModuleChannel {
    executable: PathBuf,
}

impl ModuleChannel {
    /// Bind to `executable`, which must exist.
    pub fn new(executable: impl Into<PathBuf>) -> Result<Self, IpcError> {
        let executable = executable.into();
        if !executable.is_file() {
            return Err(IpcError::ExecutableNotFound { path: executable });
        }
        Ok(Self { executable })
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Run one request through a fresh module process.
    ///
    /// An `{"error": ...}` reply is returned as `ModuleReply::Error`; only
    /// transport failures are errors here.
    pub fn call(&self, request: &ModuleRequest, timeout: Duration) -> Result<ModuleReply, IpcError> {
        let body = serde_json::to_vec(request)?;
        if body.len() > MAX_IPC_PAYLOAD_BYTES {
            return Err(IpcError::PayloadTooLarge {
                size: body.len(),
                limit: MAX_IPC_PAYLOAD_BYTES,
            });
        }

        let command = request.command();
        tracing::debug!(
            module = %self.executable.display(),
            command,
            size = body.len(),
            "calling module"
        );

        let started = Instant::now();
        let mut child = Command::new(&self.executable)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| IpcError::Spawn {
                path: self.executable.clone(),
                source,
            })?;

        let deadline = started + timeout;
        let writer = child.stdin.take().map(|mut stdin| {
            report(move || {
                // Dropping `stdin` at the end of the closure closes the pipe.
                match stdin.write_all(&body).and_then(|_| stdin.flush()) {
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                }
            })
        });
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match child.wait_timeout(timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.timed_out(command, started, "module timed out; killed"));
            }
        };

        // The child has exited, but a process it left behind may still hold
        // the pipes open. Collection is bounded by the same deadline.
        let collected = collect_output(writer, stdout, stderr, deadline)?;
        let Some((stdout, stderr)) = collected else {
            return Err(self.timed_out(
                command,
                started,
                "module exited but its pipes stayed open past the deadline",
            ));
        };

        if !status.success() {
            return Err(IpcError::NonZeroExit {
                path: self.executable.clone(),
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        let raw = String::from_utf8(stdout).map_err(|e| IpcError::MalformedResponse {
            raw: String::from_utf8_lossy(e.as_bytes()).into_owned(),
            reason: "stdout is not UTF-8".to_string(),
        })?;

        let reply = ModuleReply::parse(&raw)?;
        tracing::debug!(
            command,
            ok = matches!(reply, ModuleReply::Result(_)),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "module replied"
        );
        Ok(reply)
    }

    fn timed_out(&self, command: &str, started: Instant, message: &'static str) -> IpcError {
        let elapsed = started.elapsed();
        tracing::warn!(
            module = %self.executable.display(),
            command,
            elapsed_ms = elapsed.as_millis() as u64,
            "{}",
            message
        );
        IpcError::Timeout {
            path: self.executable.clone(),
            elapsed,
        }
    }

    /// `call`, then unwrap the result payload.
    pub fn call_for_result(
        &self,
        request: &ModuleRequest,
        timeout: Duration,
    ) -> Result<String, IpcError> {
        self.call(request, timeout)?.into_result(request.command())
    }
}

/// Run `work` on a detached thread that sends its outcome back.
fn report<T, F>(work: F) -> Receiver<io::Result<T>>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    thread::spawn(move || {
        // The receiver is gone once the call has timed out.
        let _ = tx.send(work());
    });
    rx
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<io::Result<Vec<u8>>> {
    report(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

type Pending<T> = Option<Receiver<io::Result<T>>>;

/// Gather the writer outcome and both output buffers, or `None` once
/// `deadline` passes.
fn collect_output(
    writer: Pending<()>,
    stdout: Pending<Vec<u8>>,
    stderr: Pending<Vec<u8>>,
    deadline: Instant,
) -> io::Result<Option<(Vec<u8>, Vec<u8>)>> {
    if let Some(rx) = writer {
        if collect(rx, deadline)?.is_none() {
            return Ok(None);
        }
    }
    let mut outputs = [Vec::new(), Vec::new()];
    for (slot, pending) in outputs.iter_mut().zip([stdout, stderr]) {
        if let Some(rx) = pending {
            match collect(rx, deadline)? {
                Some(bytes) => *slot = bytes,
                None => return Ok(None),
            }
        }
    }
    let [stdout, stderr] = outputs;
    Ok(Some((stdout, stderr)))
}

/// Wait for a helper until `deadline`. `Ok(None)` means the deadline passed.
fn collect<T>(rx: Receiver<io::Result<T>>, deadline: Instant) -> io::Result<Option<T>> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(outcome) => outcome.map(Some),
        Err(RecvTimeoutError::Timeout) => Ok(None),
        Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
            io::ErrorKind::Other,
            "module pipe thread panicked",
        )),
    }
}
