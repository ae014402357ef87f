//! Builders for the ffmpeg argument vectors. Everything here is pure: the
//! functions turn a job or benchmark request into a `Vec<String>` and never
//! touch the process table, which keeps the full command shapes testable.

use std::path::Path;

use crate::audio::{resolve_action, AudioAction};
use crate::crop::CropSpec;
use crate::job::Job;
use crate::presets::Preset;

/// Benchmark sample length in seconds.
pub const SAMPLE_SECONDS: u32 = 45;

const TONEMAP_CHAIN: &str = "scale=1920:-2,zscale=t=bt709:p=bt709:m=bt709:r=tv,format=p010le";
const LANCZOS_CHAIN: &str = "scale=1920:-2:flags=lanczos,format=p010le";

/// Video filter chain for a job, or `None` when no filter graph should run.
/// Pure-copy presets never get a chain; cropping a copied stream is
/// meaningless.
pub fn video_filter_chain(job: &Job, zscale_available: bool) -> Option<String> {
    if job.preset.is_video_copy() {
        return None;
    }

    let mut chain: Vec<String> = Vec::new();
    if let Some(crop) = &job.crop {
        chain.push(crop.filter());
    }

    if job.preset.targets_1080p() {
        // Downscaling HDR to an SDR 1080p target needs tone-mapping; fall
        // back to a plain lanczos scale when zscale isn't compiled in.
        if job.is_hdr && zscale_available {
            chain.push(TONEMAP_CHAIN.to_string());
        } else {
            chain.push(LANCZOS_CHAIN.to_string());
        }
    } else if job.preset.kind == crate::presets::PresetKind::Gpu {
        chain.push("format=p010le".to_string());
    }

    if chain.is_empty() {
        None
    } else {
        Some(chain.join(","))
    }
}

/// Complete argument vector for one job's encode run. The runner appends
/// the progress-protocol flags itself.
pub fn encode_args(job: &Job, zscale_available: bool) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        job.input_path.to_string_lossy().into_owned(),
        "-map".to_string(),
        "0:v:0".to_string(),
    ];
    args.extend(job.preset.video_opts.iter().cloned());

    if let Some(chain) = video_filter_chain(job, zscale_available) {
        args.push("-vf".to_string());
        args.push(chain);
    }

    for (a_idx, track) in job.selected_audio.iter().enumerate() {
        args.push("-map".to_string());
        args.push(format!("0:{}", track.index));
        match resolve_action(job.audio_mode, track, &job.preset) {
            AudioAction::Copy => {
                args.push(format!("-c:a:{}", a_idx));
                args.push("copy".to_string());
            }
            AudioAction::Transcode {
                codec,
                bitrate,
                downmix,
            } => {
                args.push(format!("-c:a:{}", a_idx));
                args.push(codec.to_string());
                args.push(format!("-b:a:{}", a_idx));
                args.push(bitrate);
                if downmix {
                    args.push(format!("-ac:a:{}", a_idx));
                    args.push("2".to_string());
                }
            }
        }
    }

    for track in &job.selected_subtitles {
        args.push("-map".to_string());
        args.push(format!("0:{}", track.index));
    }
    if !job.selected_subtitles.is_empty() {
        args.push("-c:s".to_string());
        args.push("copy".to_string());
    }

    args.push(job.output_path.to_string_lossy().into_owned());
    args
}

/// Stream-copy a video-only sample from the temporal midpoint. Used as the
/// benchmark reference clip.
pub fn sample_clip_args(input: &Path, start_secs: f64, out: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-flags2".to_string(),
        "+ignorecrop".to_string(),
        "-ss".to_string(),
        start_secs.to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-t".to_string(),
        SAMPLE_SECONDS.to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-an".to_string(),
        "-sn".to_string(),
        out.to_string_lossy().into_owned(),
    ]
}

/// Filter chain for a benchmark trial. Only the scale/format adjustments
/// the preset implies; crop is deliberately skipped in benchmark mode.
fn trial_filter_chain(preset: &Preset) -> Option<String> {
    if preset.is_video_copy() {
        return None;
    }
    if preset.targets_1080p() {
        if preset.wants_10bit() {
            Some(LANCZOS_CHAIN.to_string())
        } else {
            Some("scale=1920:-2:flags=lanczos".to_string())
        }
    } else if preset.kind == crate::presets::PresetKind::Gpu {
        Some("format=p010le".to_string())
    } else {
        None
    }
}

/// Encode the benchmark sample with one candidate preset.
pub fn trial_encode_args(preset: &Preset, sample: &Path, out: &Path) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-flags2".to_string(),
        "+ignorecrop".to_string(),
        "-i".to_string(),
        sample.to_string_lossy().into_owned(),
        "-map".to_string(),
        "0:v:0".to_string(),
    ];
    args.extend(preset.video_opts.iter().cloned());
    if let Some(chain) = trial_filter_chain(preset) {
        args.push("-vf".to_string());
        args.push(chain);
    }
    args.push(out.to_string_lossy().into_owned());
    args
}

/// Pre-processing applied to the reference side of a metric comparison so
/// it matches what the trial encode did to the picture. `"[1:v]"` when
/// nothing needs adjusting.
fn reference_chain(preset: &Preset) -> String {
    let mut chain = String::from("[1:v]");
    if preset.wants_10bit() {
        chain.push_str("format=yuv420p10le,");
    }
    if preset.targets_1080p() {
        chain.push_str("scale=1920:-2:flags=lanczos,");
    }
    chain.trim_end_matches(',').to_string()
}

fn metric_common_input(distorted: &Path, reference: &Path) -> Vec<String> {
    vec![
        "-flags2".to_string(),
        "+ignorecrop".to_string(),
        "-i".to_string(),
        distorted.to_string_lossy().into_owned(),
        "-flags2".to_string(),
        "+ignorecrop".to_string(),
        "-i".to_string(),
        reference.to_string_lossy().into_owned(),
    ]
}

/// VMAF comparison of a trial encode against the benchmark sample.
pub fn bench_vmaf_args(
    distorted: &Path,
    reference: &Path,
    preset: &Preset,
    model: &str,
    log_path: &Path,
) -> Vec<String> {
    let chain = reference_chain(preset);
    let vmaf = format!(
        "libvmaf=model=version={}:n_subsample=10:log_fmt=json:log_path={}",
        model,
        log_path.display()
    );
    let filter = if chain == "[1:v]" {
        format!("[0:v][1:v]{}", vmaf)
    } else {
        format!("{}[ref];[0:v][ref]{}", chain, vmaf)
    };

    let mut args = metric_common_input(distorted, reference);
    args.extend([
        "-filter_complex".to_string(),
        filter,
        "-f".to_string(),
        "null".to_string(),
        "-".to_string(),
    ]);
    args
}

/// SSIM comparison of a trial encode against the benchmark sample. The
/// score lands on stderr.
pub fn bench_ssim_args(distorted: &Path, reference: &Path, preset: &Preset) -> Vec<String> {
    let chain = reference_chain(preset);
    let filter = if chain == "[1:v]" {
        "[0:v][1:v]ssim".to_string()
    } else {
        format!("{}[ref];[0:v][ref]ssim", chain)
    };

    let mut args = metric_common_input(distorted, reference);
    args.extend([
        "-filter_complex".to_string(),
        filter,
        "-f".to_string(),
        "null".to_string(),
        "-".to_string(),
    ]);
    args
}

/// Optional centered crop of the reference when the two files differ in
/// resolution, plus the labels the metric filter should compare.
fn comparison_labels(ref_crop: Option<CropSpec>) -> (String, String, String) {
    match ref_crop {
        Some(crop) => (
            format!("[0:v]{}[ref_cropped];", crop.filter()),
            "[ref_cropped]".to_string(),
            "[1:v]".to_string(),
        ),
        None => (String::new(), "[0:v]".to_string(), "[1:v]".to_string()),
    }
}

/// Stand-alone quality check: VMAF of a distorted file against a reference.
pub fn quality_vmaf_args(
    reference: &Path,
    distorted: &Path,
    ref_crop: Option<CropSpec>,
    model: &str,
    log_path: &Path,
) -> Vec<String> {
    let (prologue, ref_label, dist_label) = comparison_labels(ref_crop);
    let filter = format!(
        "{}{}{}libvmaf=model=version={}:n_subsample=10:log_fmt=json:log_path={}",
        prologue,
        dist_label,
        ref_label,
        model,
        log_path.display()
    );
    quality_args(reference, distorted, filter)
}

/// Stand-alone quality check: SSIM of a distorted file against a reference.
pub fn quality_ssim_args(
    reference: &Path,
    distorted: &Path,
    ref_crop: Option<CropSpec>,
    stats_file: &Path,
) -> Vec<String> {
    let (prologue, ref_label, dist_label) = comparison_labels(ref_crop);
    let filter = format!(
        "{}{}{}ssim=stats_file={}",
        prologue,
        dist_label,
        ref_label,
        stats_file.display()
    );
    quality_args(reference, distorted, filter)
}

fn quality_args(reference: &Path, distorted: &Path, filter: String) -> Vec<String> {
    vec![
        "-i".to_string(),
        reference.to_string_lossy().into_owned(),
        "-i".to_string(),
        distorted.to_string_lossy().into_owned(),
        "-filter_complex".to_string(),
        filter,
        "-f".to_string(),
        "null".to_string(),
        "-".to_string(),
    ]
}
