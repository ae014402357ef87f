use std::time::Duration;

use anyhow::Result;
use humansize::{format_size, DECIMAL};
use log::{error, info, warn};

use crate::command::encode_args;
use crate::job::Job;
use crate::runner::JobRunner;

/// Aggregate outcome of a queue run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EncodeStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Input bytes of successfully encoded jobs only.
    pub total_input_bytes: u64,
    /// Output bytes of successfully encoded jobs only.
    pub total_output_bytes: u64,
}

impl EncodeStats {
    pub fn saved_bytes(&self) -> i64 {
        self.total_input_bytes as i64 - self.total_output_bytes as i64
    }

    /// Output size as a percentage of input size.
    pub fn size_ratio_percent(&self) -> f64 {
        if self.total_input_bytes == 0 {
            return 0.0;
        }
        self.total_output_bytes as f64 / self.total_input_bytes as f64 * 100.0
    }

    /// Human-readable summary, shown when more than one job ran.
    pub fn summary(&self) -> String {
        format!(
            "{} job(s) done, {} failed | in: {} | out: {} | saved: {} ({:.1}% of original)",
            self.succeeded,
            self.failed,
            format_size(self.total_input_bytes, DECIMAL),
            format_size(self.total_output_bytes, DECIMAL),
            format_size(self.saved_bytes().unsigned_abs(), DECIMAL),
            self.size_ratio_percent(),
        )
    }
}

/// Drives jobs through the runner one at a time, in queue order. Failures
/// are isolated: a failed job surfaces its engine diagnostics and the run
/// moves on to the next job.
pub struct Executor<R> {
    runner: R,
    cooldown: Duration,
    zscale_available: bool,
}

impl<R: JobRunner> Executor<R> {
    pub fn new(runner: R, cooldown: Duration, zscale_available: bool) -> Self {
        Self {
            runner,
            cooldown,
            zscale_available,
        }
    }

    pub async fn execute(&self, jobs: &[Job]) -> Result<EncodeStats> {
        let mut stats = EncodeStats::default();

        for (i, job) in jobs.iter().enumerate() {
            println!(
                "\nProcessing {}/{}: {}",
                i + 1,
                jobs.len(),
                job.input_path.display()
            );
            stats.attempted += 1;

            let args = encode_args(job, self.zscale_available);
            let outcome = self.runner.run(&args, job.duration_seconds).await?;

            if outcome.success {
                stats.succeeded += 1;
                self.record_sizes(job, &mut stats);
                info!(
                    "Completed {} in {:.0}s",
                    job.output_path.display(),
                    outcome.elapsed.as_secs_f64()
                );
            } else {
                stats.failed += 1;
                error!("Encode failed for {}", job.input_path.display());
                // the engine's own error text is the diagnosis; show it as-is
                if !outcome.stderr.is_empty() {
                    println!("Engine error log:\n{}", outcome.stderr);
                }
            }

            if i < jobs.len() - 1 && !self.cooldown.is_zero() {
                println!("Cooling down {}s...", self.cooldown.as_secs());
                tokio::time::sleep(self.cooldown).await;
            }
        }

        if stats.attempted > 1 {
            println!("\n{}", stats.summary());
        }
        Ok(stats)
    }

    fn record_sizes(&self, job: &Job, stats: &mut EncodeStats) {
        let in_size = match std::fs::metadata(&job.input_path) {
            Ok(m) => m.len(),
            Err(_) => return,
        };
        let Ok(out_meta) = std::fs::metadata(&job.output_path) else {
            warn!("Output missing after success: {}", job.output_path.display());
            return;
        };
        let out_size = out_meta.len();
        stats.total_input_bytes += in_size;
        stats.total_output_bytes += out_size;
        println!(
            "  Original: {} | Encoded: {} | Ratio: {:.1}%",
            format_size(in_size, DECIMAL),
            format_size(out_size, DECIMAL),
            out_size as f64 / in_size as f64 * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioMode;
    use crate::presets::PresetCatalog;
    use crate::runner::{JobRunner, RunOutcome};
    use std::io::Write;
    use std::path::Path;
    use std::sync::Mutex;

    /// Scripted runner: fails any invocation whose input path contains a
    /// marker string, records the argv of every call.
    struct StubRunner {
        fail_marker: &'static str,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl StubRunner {
        fn new(fail_marker: &'static str) -> Self {
            Self {
                fail_marker,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl JobRunner for StubRunner {
        async fn run(&self, args: &[String], _total_duration: f64) -> Result<RunOutcome> {
            self.calls.lock().unwrap().push(args.to_vec());
            let fails = args.iter().any(|a| a.contains(self.fail_marker));
            if !fails {
                // materialize the output so size recording has a file to stat
                if let Some(out) = args.last() {
                    let _ = std::fs::write(out, b"encoded");
                }
            }
            Ok(RunOutcome {
                success: !fails,
                stderr: if fails { "boom".to_string() } else { String::new() },
                elapsed: Duration::from_millis(1),
            })
        }
    }

    fn job_for(dir: &Path, name: &str) -> Job {
        let input = dir.join(name);
        let mut f = std::fs::File::create(&input).unwrap();
        f.write_all(&vec![0u8; 1000]).unwrap();
        let preset = PresetCatalog::builtin().get("0").unwrap().clone();
        Job {
            output_path: Job::output_path_for(&input, &preset, dir),
            input_path: input,
            duration_seconds: 60.0,
            is_hdr: false,
            crop: None,
            selected_audio: vec![],
            selected_subtitles: vec![],
            audio_mode: AudioMode::Copy,
            preset,
        }
    }

    #[tokio::test]
    async fn failed_job_does_not_stop_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![
            job_for(dir.path(), "one.mkv"),
            job_for(dir.path(), "broken.mkv"),
            job_for(dir.path(), "three.mkv"),
        ];
        let runner = StubRunner::new("broken");
        let executor = Executor::new(runner, Duration::ZERO, true);

        let stats = executor.execute(&jobs).await.unwrap();
        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
        // only the two successful jobs contribute sizes
        assert_eq!(stats.total_input_bytes, 2000);
        assert_eq!(stats.total_output_bytes, 14);
        assert_eq!(executor.runner.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn empty_queue_yields_empty_stats() {
        let runner = StubRunner::new("never");
        let executor = Executor::new(runner, Duration::ZERO, true);
        let stats = executor.execute(&[]).await.unwrap();
        assert_eq!(stats, EncodeStats::default());
    }

    #[test]
    fn ratio_guards_divide_by_zero() {
        let stats = EncodeStats::default();
        assert_eq!(stats.size_ratio_percent(), 0.0);
    }

    #[test]
    fn savings_math() {
        let stats = EncodeStats {
            attempted: 2,
            succeeded: 2,
            failed: 0,
            total_input_bytes: 10_000_000_000,
            total_output_bytes: 4_000_000_000,
        };
        assert_eq!(stats.saved_bytes(), 6_000_000_000);
        assert!((stats.size_ratio_percent() - 40.0).abs() < 1e-9);
    }
}
