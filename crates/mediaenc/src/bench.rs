use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use tokio::process::Command;

use crate::command::{
    bench_ssim_args, bench_vmaf_args, sample_clip_args, trial_encode_args, SAMPLE_SECONDS,
};
use crate::presets::Preset;
use crate::quality::{self, Metric};
use crate::runner::JobRunner;

/// Reference clips smaller than this are treated as a failed extraction.
const MIN_SAMPLE_BYTES: u64 = 1024 * 1024;

/// The sample is assumed to run at cinema frame rate for throughput math.
const ASSUMED_SAMPLE_FPS: f64 = 24.0;

/// One preset's benchmark outcome. Transient; never persisted.
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub preset: Preset,
    pub measured_fps: f64,
    pub vmaf_score: Option<f64>,
    pub ssim_score: Option<f64>,
    pub estimated_total_bytes: u64,
}

impl BenchmarkResult {
    /// Quality per gigabyte, for the ranking table.
    pub fn efficiency(&self) -> f64 {
        let gb = self.estimated_total_bytes as f64 / 1e9;
        match self.vmaf_score {
            Some(vmaf) if gb > 0.0 => vmaf / gb,
            _ => 0.0,
        }
    }
}

/// Encoding throughput implied by the trial's wall time.
pub fn throughput_fps(elapsed: Duration) -> f64 {
    if elapsed.is_zero() {
        return 0.0;
    }
    SAMPLE_SECONDS as f64 * ASSUMED_SAMPLE_FPS / elapsed.as_secs_f64()
}

/// Extrapolate a full-file size from the trial output: video scaled by the
/// duration ratio, plus the preset's audio bitrate over the whole runtime.
pub fn estimate_total_size(sample_video_bytes: u64, duration: f64, audio_kbps: u32) -> u64 {
    let video = sample_video_bytes as f64 / SAMPLE_SECONDS as f64 * duration;
    let audio = audio_kbps as f64 * 1000.0 / 8.0 * duration;
    (video + audio) as u64
}

/// Best quality first; unmeasured results sink to the bottom.
pub fn sort_results(results: &mut [BenchmarkResult]) {
    results.sort_by(|a, b| {
        b.vmaf_score
            .unwrap_or(0.0)
            .partial_cmp(&a.vmaf_score.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Runs short trial encodes across candidate presets and ranks them by
/// measured quality.
pub struct BenchmarkEngine<R> {
    runner: R,
    ffmpeg_bin: PathBuf,
    libvmaf_available: bool,
}

impl<R: JobRunner> BenchmarkEngine<R> {
    pub fn new(runner: R, ffmpeg_bin: PathBuf, libvmaf_available: bool) -> Self {
        Self {
            runner,
            ffmpeg_bin,
            libvmaf_available,
        }
    }

    pub async fn run(
        &self,
        input: &Path,
        duration: f64,
        presets: &[Preset],
    ) -> Result<Vec<BenchmarkResult>> {
        let work_dir = input.parent().unwrap_or_else(|| Path::new("."));
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let short_stem: String = stem.chars().take(10).collect();
        let reference = work_dir.join(format!("bench_ref_{}.mkv", short_stem));

        println!("Extracting {}s reference sample...", SAMPLE_SECONDS);
        self.extract_reference(input, duration, &reference).await?;

        let mut results = Vec::new();
        for preset in presets {
            println!("\n--- Testing: {} ---", preset.name);
            match self.trial(preset, &reference, duration, work_dir).await {
                Ok(result) => results.push(result),
                Err(e) => warn!("Trial failed for {}: {:#}", preset.name, e),
            }
        }

        if let Err(e) = std::fs::remove_file(&reference) {
            warn!("Could not remove reference clip {}: {}", reference.display(), e);
        }

        sort_results(&mut results);
        Ok(results)
    }

    async fn extract_reference(&self, input: &Path, duration: f64, reference: &Path) -> Result<()> {
        let start = duration / 2.0;
        let args = sample_clip_args(input, start, reference);
        let output = Command::new(&self.ffmpeg_bin)
            .args(&args)
            .output()
            .await
            .context("Failed to run reference extraction")?;

        let size = std::fs::metadata(reference).map(|m| m.len()).unwrap_or(0);
        if !output.status.success() || size < MIN_SAMPLE_BYTES {
            let _ = std::fs::remove_file(reference);
            bail!(
                "Reference extraction produced no usable sample from {}",
                input.display()
            );
        }
        Ok(())
    }

    async fn trial(
        &self,
        preset: &Preset,
        reference: &Path,
        duration: f64,
        work_dir: &Path,
    ) -> Result<BenchmarkResult> {
        let out_file = work_dir.join(format!("bench_res_{}.mkv", preset.name.replace(' ', "_")));

        let args = trial_encode_args(preset, reference, &out_file);
        let outcome = self.runner.run(&args, SAMPLE_SECONDS as f64).await?;
        let out_size = std::fs::metadata(&out_file).map(|m| m.len()).unwrap_or(0);
        if !outcome.success || out_size == 0 {
            let _ = std::fs::remove_file(&out_file);
            bail!("trial encode produced no output");
        }

        let (vmaf_score, ssim_score) = if preset.is_video_copy() {
            // a stream copy is bit-identical video; scoring it wastes time
            (Some(100.0), Some(1.0))
        } else {
            (
                self.measure_vmaf(preset, &out_file, reference).await,
                self.measure_ssim(preset, &out_file, reference).await,
            )
        };

        let result = BenchmarkResult {
            preset: preset.clone(),
            measured_fps: throughput_fps(outcome.elapsed),
            vmaf_score,
            ssim_score,
            estimated_total_bytes: estimate_total_size(
                out_size,
                duration,
                preset.audio_bitrate_kbps(),
            ),
        };
        info!(
            "{}: {:.0} fps, vmaf {:?}, ~{} bytes",
            preset.name, result.measured_fps, result.vmaf_score, result.estimated_total_bytes
        );

        if let Err(e) = std::fs::remove_file(&out_file) {
            warn!("Could not remove trial output {}: {}", out_file.display(), e);
        }
        Ok(result)
    }

    async fn measure_vmaf(&self, preset: &Preset, distorted: &Path, reference: &Path) -> Option<f64> {
        if !self.libvmaf_available {
            return None;
        }
        println!("Computing VMAF...");
        let log_path = distorted.with_extension("json");
        let model = quality::vmaf_model_for(preset);
        let args = bench_vmaf_args(distorted, reference, preset, model, &log_path);
        let status = Command::new(&self.ffmpeg_bin).args(&args).output().await.ok()?;
        if !status.status.success() {
            warn!("VMAF run failed for {}", preset.name);
        }
        let score = quality::read_vmaf_score(&log_path).ok();
        let _ = std::fs::remove_file(&log_path);
        score
    }

    async fn measure_ssim(&self, preset: &Preset, distorted: &Path, reference: &Path) -> Option<f64> {
        println!("Computing SSIM...");
        let args = bench_ssim_args(distorted, reference, preset);
        let output = Command::new(&self.ffmpeg_bin).args(&args).output().await.ok()?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        quality::parse_metric_mean(&stderr, Metric::Ssim)
    }
}
