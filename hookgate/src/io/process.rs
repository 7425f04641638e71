//! Child processes for validation commands: shell invocation, deadline, and
//! capped output capture.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Up to `limit` bytes of one output stream, plus how much was dropped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CapturedStream {
    pub bytes: Vec<u8>,
    pub dropped: usize,
}

impl CapturedStream {
    fn append_to(&self, label: &str, buf: &mut String) {
        let text = String::from_utf8_lossy(&self.bytes);
        if !text.trim().is_empty() {
            if !buf.is_empty() && !buf.ends_with('\n') {
                buf.push('\n');
            }
            buf.push_str(&text);
        }
        if self.dropped > 0 {
            buf.push_str(&format!("\n[{label} truncated {} bytes]\n", self.dropped));
        }
    }
}

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: CapturedStream,
    pub stderr: CapturedStream,
    pub timed_out: bool,
}

impl CommandOutput {
    /// stdout then stderr, lossily decoded, with truncation notices.
    pub fn combined_text(&self) -> String {
        let mut buf = String::new();
        self.stdout.append_to("stdout", &mut buf);
        self.stderr.append_to("stderr", &mut buf);
        buf
    }
}

/// `sh -c <command>` in `workdir`, in its own process group on Unix.
pub fn shell_command(command: &str, workdir: &Path) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(workdir);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd
}

/// Run `cmd` until it exits or `timeout` elapses, whichever is first.
///
/// Both pipes are drained on background threads so a chatty command cannot
/// stall on a full pipe; each keeps at most `output_limit_bytes`. On timeout
/// the command's whole process group is killed.
#[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64, output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().context("spawn command")?;
    debug!(pid = child.id(), "command spawned");

    let stdout = capture_in_background(child.stdout.take(), output_limit_bytes)
        .context("capture stdout")?;
    let stderr = capture_in_background(child.stderr.take(), output_limit_bytes)
        .context("capture stderr")?;

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!(pid = child.id(), "command exceeded its timeout, killing");
            (terminate(&mut child)?, true)
        }
    };

    let stdout = finish_capture(stdout).context("collect stdout")?;
    let stderr = finish_capture(stderr).context("collect stderr")?;
    debug!(
        exit_code = ?status.code(),
        timed_out,
        stdout_dropped = stdout.dropped,
        stderr_dropped = stderr.dropped,
        "command finished"
    );

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn capture_in_background<R>(
    stream: Option<R>,
    limit: usize,
) -> Result<JoinHandle<io::Result<CapturedStream>>>
where
    R: Read + Send + 'static,
{
    let stream = stream.ok_or_else(|| anyhow!("stream was not piped"))?;
    Ok(thread::spawn(move || capture(stream, limit)))
}

fn finish_capture(handle: JoinHandle<io::Result<CapturedStream>>) -> Result<CapturedStream> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
        .context("read output")
}

/// Keep the first `limit` bytes and count the rest while draining to EOF.
fn capture<R: Read>(mut reader: R, limit: usize) -> io::Result<CapturedStream> {
    let mut bytes = Vec::new();
    reader.by_ref().take(limit as u64).read_to_end(&mut bytes)?;
    let dropped = io::copy(&mut reader, &mut io::sink())?;
    Ok(CapturedStream {
        bytes,
        dropped: dropped as usize,
    })
}

fn terminate(child: &mut Child) -> Result<ExitStatus> {
    #[cfg(unix)]
    kill_process_group(child.id());
    if let Err(err) = child.kill() {
        // Already reaped by the group kill.
        debug!(err = %err, "kill after group kill");
    }
    child.wait().context("wait for killed command")
}

/// Kill every process in the group led by `pid` (the shell and its children).
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let result = Command::new("kill")
        .args(["-KILL", "--", &format!("-{pid}")])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(err) = result {
        warn!(pid, err = %err, "failed to kill process group");
    }
}
