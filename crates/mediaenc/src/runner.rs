use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Flags that switch ffmpeg into its machine-readable progress protocol.
const PROGRESS_FLAGS: [&str; 5] = ["-progress", "pipe:1", "-nostats", "-v", "error"];

/// Accumulated view of the `key=value` progress stream. Pure state machine,
/// fed one line at a time; the process plumbing lives in `PipedRunner`.
#[derive(Debug, Default)]
pub struct ProgressState {
    out_time_us: u64,
    fps: f64,
    speed: f64,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one progress line. Returns true on a `progress=continue|end`
    /// marker, which is the cue to refresh the display.
    pub fn ingest(&mut self, line: &str) -> bool {
        let Some((key, value)) = line.trim().split_once('=') else {
            return false;
        };
        match (key.trim(), value.trim()) {
            ("out_time_us", v) => {
                if let Ok(us) = v.parse::<u64>() {
                    // the stream occasionally rewinds on stream restarts;
                    // keep the high-water mark so percent never regresses
                    self.out_time_us = self.out_time_us.max(us);
                }
                false
            }
            ("fps", v) => {
                self.fps = v.parse().unwrap_or(self.fps);
                false
            }
            ("speed", v) => {
                self.speed = v.trim_end_matches('x').parse().unwrap_or(self.speed);
                false
            }
            ("progress", "continue") | ("progress", "end") => true,
            _ => false,
        }
    }

    pub fn out_time_secs(&self) -> f64 {
        self.out_time_us as f64 / 1_000_000.0
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Percent complete, clamped to [0, 100]. Zero when the total duration
    /// is unknown.
    pub fn percent(&self, total_duration: f64) -> f64 {
        if total_duration <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs() / total_duration * 100.0).min(100.0)
    }

    /// Remaining seconds, extrapolated from elapsed wall time assuming
    /// constant throughput. `None` until any progress has been made.
    pub fn eta_secs(&self, elapsed: Duration, total_duration: f64) -> Option<f64> {
        let pct = self.percent(total_duration);
        if pct <= 0.0 {
            return None;
        }
        Some(elapsed.as_secs_f64() * (100.0 - pct) / pct)
    }
}

/// Result of one engine invocation.
#[derive(Debug)]
pub struct RunOutcome {
    pub success: bool,
    /// Full diagnostic text captured from stderr, surfaced verbatim on
    /// failure.
    pub stderr: String,
    pub elapsed: Duration,
}

/// Seam between the executor and the real engine. Production uses
/// `PipedRunner`; tests substitute a scripted stub.
pub trait JobRunner {
    fn run(
        &self,
        args: &[String],
        total_duration: f64,
    ) -> impl std::future::Future<Output = Result<RunOutcome>> + Send;
}

/// Spawns ffmpeg with progress reporting piped to stdout and renders a
/// live progress bar while the encode runs.
pub struct PipedRunner {
    ffmpeg_bin: PathBuf,
}

impl PipedRunner {
    pub fn new(ffmpeg_bin: PathBuf) -> Self {
        Self { ffmpeg_bin }
    }

    fn progress_bar() -> ProgressBar {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template(
                "[{bar:20}] {pos:>3}% | Time: {elapsed_precise} | {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#."),
        );
        bar
    }
}

impl JobRunner for PipedRunner {
    async fn run(&self, args: &[String], total_duration: f64) -> Result<RunOutcome> {
        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.args(args);
        cmd.args(PROGRESS_FLAGS);
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        debug!("Spawning: {} {}", self.ffmpeg_bin.display(), args.join(" "));
        let start = Instant::now();
        let mut child = cmd.spawn().with_context(|| {
            format!("Failed to spawn engine process: {}", self.ffmpeg_bin.display())
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Failed to capture engine stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("Failed to capture engine stderr"))?;

        // Drain stderr concurrently so a chatty engine can't fill the pipe
        // buffer and stall itself.
        let stderr_handle = tokio::spawn(async move {
            let mut captured = String::new();
            let reader = BufReader::new(stderr);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                captured.push_str(&line);
                captured.push('\n');
            }
            captured
        });

        let bar = Self::progress_bar();
        let mut state = ProgressState::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await.context("Failed to read progress stream")? {
            if state.ingest(&line) {
                let pct = state.percent(total_duration);
                bar.set_position(pct as u64);
                let eta = match state.eta_secs(start.elapsed(), total_duration) {
                    Some(secs) => format_hms(secs),
                    None => "--:--:--".to_string(),
                };
                bar.set_message(format!(
                    "ETA: {} | FPS: {:3.0} | {:.2}x",
                    eta,
                    state.fps(),
                    state.speed()
                ));
            }
        }

        let status = child.wait().await.context("Failed to wait for engine process")?;
        let captured = stderr_handle.await.context("Failed to read engine stderr")?;
        let elapsed = start.elapsed();

        if status.success() {
            bar.set_position(100);
            bar.finish_with_message(format!("done in {}", format_hms(elapsed.as_secs_f64())));
        } else {
            bar.abandon_with_message("failed".to_string());
        }

        Ok(RunOutcome {
            success: status.success(),
            stderr: captured,
            elapsed,
        })
    }
}

/// `HH:MM:SS` rendering of a second count.
pub fn format_hms(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
