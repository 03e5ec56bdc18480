//! Runs the external downloader (yt-dlp by default) as a child process.
//!
//! The command line is `<program> [leading args..] -f <format> -o <output> <url>`.
//! stdout and stderr are captured. On unix the child leads its own process
//! group, and the whole group is killed if the timeout elapses or the calling
//! future is dropped, so wrappers like `uv run yt-dlp` take their workers down
//! with them.

use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    pub program: String,
    pub leading_args: Vec<String>,
    pub format: String,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("failed to start downloader: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to wait for downloader: {0}")]
    Wait(#[source] std::io::Error),

    #[error("{}", failure_message(*status, stderr))]
    Failed { status: ExitStatus, stderr: String },

    #[error("downloader timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

impl DownloadError {
    /// Whether the downloader ran and reported failure, as opposed to never
    /// running properly.
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::TimedOut(_))
    }
}

fn failure_message(status: ExitStatus, stderr: &str) -> String {
    let stderr = stderr.trim_end();
    if stderr.is_empty() {
        format!("downloader exited with {status}")
    } else {
        stderr.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct Downloader {
    config: DownloaderConfig,
}

impl Downloader {
    pub fn new(config: DownloaderConfig) -> Self {
        Self { config }
    }

    pub fn args(&self, url: &str, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self
            .config
            .leading_args
            .iter()
            .map(OsString::from)
            .collect();
        args.push("-f".into());
        args.push(self.config.format.clone().into());
        args.push("-o".into());
        args.push(output.as_os_str().to_owned());
        args.push(url.into());
        args
    }

    /// Run the downloader until it exits, writing the video to `output`.
    pub async fn fetch(&self, url: &str, output: &Path) -> Result<(), DownloadError> {
        let started = Instant::now();
        let mut command = Command::new(&self.config.program);
        command
            .args(self.args(url, output))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        debug!(program = %self.config.program, ?output, %url, "Spawning downloader");
        let child = command.spawn().map_err(DownloadError::Spawn)?;
        let mut group = ProcessGroup::of(&child);

        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await
        {
            Ok(result) => {
                // the leader has been reaped, its pgid may be reused from here on
                group.disarm();
                result.map_err(DownloadError::Wait)?
            }
            Err(_) => {
                warn!(%url, timeout_secs = self.config.timeout.as_secs(), "Downloader timed out");
                group.kill();
                return Err(DownloadError::TimedOut(self.config.timeout));
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(%url, status = %output.status, elapsed_ms, "Downloader failed");
            return Err(DownloadError::Failed {
                status: output.status,
                stderr,
            });
        }

        info!(%url, elapsed_ms, "Downloader finished");
        Ok(())
    }
}

/// Kills the downloader's process group on drop unless disarmed.
struct ProcessGroup {
    pgid: Option<i32>,
}

impl ProcessGroup {
    fn of(child: &tokio::process::Child) -> Self {
        #[cfg(unix)]
        let pgid = child.id().and_then(|pid| i32::try_from(pid).ok());
        #[cfg(not(unix))]
        let pgid = {
            let _ = child;
            None
        };
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }

    fn kill(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        #[cfg(unix)]
        {
            // SAFETY: kill(2) takes plain integers and touches no memory of ours
            let ret = unsafe { libc::kill(-pgid, libc::SIGKILL) };
            debug!(pgid, ret, "Killed downloader process group");
        }
        #[cfg(not(unix))]
        let _ = pgid;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}
