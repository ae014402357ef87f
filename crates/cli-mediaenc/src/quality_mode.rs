use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mediaenc::command::{quality_ssim_args, quality_vmaf_args};
use mediaenc::crop::CropSpec;
use mediaenc::ffprobe;
use mediaenc::quality::{self, Metric, VMAF_MODEL_4K, VMAF_MODEL_HD};
use tokio::process::Command;

use crate::prompt;
use crate::AppContext;

/// Quality-check mode: score an encoded file against its source.
pub async fn run(ctx: &AppContext) -> Result<()> {
    println!("\n=== VIDEO QUALITY ANALYSIS ===");

    let Some(reference) = ask_file("\n1. Drop the REFERENCE file (original/remux) (q=back): ")?
    else {
        return Ok(());
    };
    let Some(distorted) = ask_file("\n2. Drop the DISTORTED file (encoded) (q=back): ")? else {
        return Ok(());
    };

    println!("\n[ Alignment options ]");
    println!("If the encode kept the black bars, force a 1:1 comparison.");
    let force_one_to_one = prompt::confirm("Force 1:1 comparison (disable auto-crop)? [y/N]: ")?;

    let ref_crop = if force_one_to_one {
        println!("Auto-crop disabled (1:1 mode).");
        None
    } else {
        alignment_crop(ctx, &reference, &distorted).await
    };
    if ref_crop.is_some() {
        println!("Resolution mismatch detected; applying centered crop to the reference.");
    }

    println!("\n3. Pick a metric (q=back):");
    println!(" [1] VMAF");
    println!(" [2] SSIM");
    let metric_choice = prompt::ask("> ")?;
    if prompt::is_back(&metric_choice) {
        return Ok(());
    }

    let parent = distorted.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let stem = distorted
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (metric, score) = match metric_choice.as_str() {
        "1" => {
            if !ctx.toolchain.libvmaf_available {
                println!("libvmaf filter is not available in this engine build.");
                return Ok(());
            }
            println!("\nPick VMAF model:");
            println!(" [1] 4K HDR");
            println!(" [2] 1080p SDR");
            let model = if prompt::ask("> ")? == "1" {
                VMAF_MODEL_4K
            } else {
                VMAF_MODEL_HD
            };

            let json_report = parent.join(format!("vmaf_report_{}.json", stem));
            let args = quality_vmaf_args(&reference, &distorted, ref_crop, model, &json_report);
            println!("\nRunning VMAF analysis...");
            run_engine(ctx, &args).await?;
            (Metric::Vmaf, quality::read_vmaf_score(&json_report).ok())
        }
        "2" => {
            let stats_file = parent.join(format!("quality_log_{}.txt", stem));
            let args = quality_ssim_args(&reference, &distorted, ref_crop, &stats_file);
            println!("\nRunning SSIM analysis...");
            let stderr = run_engine(ctx, &args).await?;
            (Metric::Ssim, quality::parse_metric_mean(&stderr, Metric::Ssim))
        }
        _ => {
            println!("Invalid choice.");
            return Ok(());
        }
    };

    println!("{}", "-".repeat(40));
    match score {
        Some(s) => {
            let verdict = metric.verdict(s);
            println!("{} score: {}", metric.name(), s);
            println!("Rating:   {}", verdict.rating);
            println!("Notes:    {}", verdict.note);
        }
        None => println!("{} score could not be determined.", metric.name()),
    }
    println!("{}", "-".repeat(40));
    Ok(())
}

fn ask_file(message: &str) -> Result<Option<PathBuf>> {
    let raw = prompt::ask(message)?;
    if prompt::is_back(&raw) {
        return Ok(None);
    }
    let path = prompt::clean_path(&raw);
    if !path.exists() {
        println!("File not found.");
        return Ok(None);
    }
    Ok(Some(path))
}

/// Centered crop of the reference when it is larger than the distorted
/// file, so cropped-then-encoded output lines up frame for frame.
async fn alignment_crop(ctx: &AppContext, reference: &Path, distorted: &Path) -> Option<CropSpec> {
    let (ref_w, ref_h) = resolution(ctx, reference).await?;
    let (dist_w, dist_h) = resolution(ctx, distorted).await?;
    if ref_w == 0 || dist_w == 0 {
        return None;
    }
    if ref_h > dist_h || ref_w > dist_w {
        Some(CropSpec {
            width: dist_w,
            height: dist_h,
            x: (ref_w.saturating_sub(dist_w)) / 2,
            y: (ref_h.saturating_sub(dist_h)) / 2,
        })
    } else {
        None
    }
}

async fn resolution(ctx: &AppContext, path: &Path) -> Option<(u32, u32)> {
    let probe = ffprobe::probe_file(&ctx.config.ffprobe_bin, path).await.ok()?;
    let stream = probe.video_stream()?;
    Some((stream.width.unwrap_or(0), stream.height.unwrap_or(0)))
}

async fn run_engine(ctx: &AppContext, args: &[String]) -> Result<String> {
    let output = Command::new(&ctx.config.ffmpeg_bin)
        .args(args)
        .output()
        .await
        .context("Failed to run quality analysis")?;
    Ok(String::from_utf8_lossy(&output.stderr).into_owned())
}
