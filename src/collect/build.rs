use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::error::CollectionError;

/// Captured result of a finished build command.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    /// stdout followed by stderr.
    pub output: String,
    pub duration: Duration,
}

/// Run the build command in `root` and capture its diagnostics.
///
/// Both pipes are drained on reader threads so a chatty build cannot fill
/// a pipe buffer and stall. If the command exceeds `timeout` it is killed
/// and reaped, and [`CollectionError::Timeout`] is returned.
pub fn run_build(
    command: &[String],
    root: &Path,
    timeout: Duration,
) -> Result<BuildOutput, CollectionError> {
    let (program, args) = command.split_first().ok_or(CollectionError::EmptyCommand)?;
    let command_line = command.join(" ");
    let start = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Plain output is easier to parse
        .env("NO_COLOR", "1")
        .env("FORCE_COLOR", "0");

    debug!(command = %command_line, root = %root.display(), "starting build");
    let mut child = cmd.spawn().map_err(|source| CollectionError::Spawn {
        command: command_line.clone(),
        source,
    })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait(); // Reap the zombie
            warn!(command = %command_line, ?timeout, "build timed out");
            // Reader threads are left to finish on their own: grandchildren
            // may still hold the pipes open.
            return Err(CollectionError::Timeout {
                command: command_line,
                timeout,
            });
        }
        Err(source) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CollectionError::Spawn {
                command: command_line,
                source,
            });
        }
    };

    let mut output = collect(stdout);
    let err_output = collect(stderr);
    if !err_output.is_empty() {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&err_output);
    }

    let duration = start.elapsed();
    debug!(
        exit_code = ?status.code(),
        bytes = output.len(),
        ms = duration.as_millis() as u64,
        "build finished"
    );

    Ok(BuildOutput {
        exit_code: status.code(),
        success: status.success(),
        output,
        duration,
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}
