use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::warn;
use mediaenc::audio::{resolve_action, AudioMode};
use mediaenc::crop::{CropDetector, CropSpec};
use mediaenc::executor::Executor;
use mediaenc::ffprobe::{self, ProbeData};
use mediaenc::job::{Job, Queue};
use mediaenc::presets::Preset;
use mediaenc::runner::PipedRunner;
use mediaenc::tracks::{resolve_selection, TrackChoice, TrackKind, TrackSelection};
use walkdir::WalkDir;

use crate::prompt;
use crate::AppContext;

const MEDIA_EXTENSIONS: [&str; 4] = ["mkv", "mp4", "mov", "avi"];

/// The encode wizard. `direct_file`/`direct_preset` come from the
/// benchmark handoff and skip the corresponding prompts.
pub async fn mode_encode(
    ctx: &AppContext,
    direct_file: Option<PathBuf>,
    direct_preset: Option<Preset>,
) -> Result<()> {
    if ctx.toolchain.zscale_available {
        println!("zscale filter detected: HDR tone-mapping available.");
    } else {
        println!("zscale filter NOT detected: HDR downscales will look washed out.");
    }

    let preset = match direct_preset {
        Some(p) => {
            println!("\nPreset selected from benchmark: {}", p.name);
            p
        }
        None => match choose_preset(ctx)? {
            Some(p) => p,
            None => return Ok(()),
        },
    };

    let files = match direct_file {
        Some(f) => vec![f],
        None => {
            let raw = prompt::ask("\nDrop a file or folder (q=back): ")?;
            if prompt::is_back(&raw) {
                return Ok(());
            }
            collect_media_files(&prompt::clean_path(&raw))
        }
    };
    if files.is_empty() {
        println!("No media files found.");
        return Ok(());
    }

    let Some(jobs) = build_jobs(ctx, &files, &preset).await? else {
        // user backed out of a per-file prompt: abort the whole build
        return Ok(());
    };
    if jobs.is_empty() {
        println!("No jobs configured.");
        return Ok(());
    }

    print_plan(&jobs);

    loop {
        let choice = prompt::ask("\n[1] Start  [2] Export queue  [q] Cancel: ")?;
        if prompt::is_back(&choice) {
            return Ok(());
        }
        match choice.as_str() {
            "1" => return run_jobs(ctx, &jobs).await,
            "2" => {
                let dest = prompt::ask("Export path (e.g. queue.json): ")?;
                if prompt::is_back(&dest) || dest.is_empty() {
                    continue;
                }
                let mut queue = Queue::new();
                queue.add(jobs.clone());
                match queue.export(Path::new(&dest)) {
                    Ok(()) => {
                        println!("Queue exported to {}.", dest);
                        return Ok(());
                    }
                    Err(e) => println!("Export failed: {}", e),
                }
            }
            _ => println!("Invalid choice."),
        }
    }
}

fn choose_preset(ctx: &AppContext) -> Result<Option<Preset>> {
    println!("\nSelect a preset (q=back):");
    for p in ctx.catalog.iter() {
        println!(" [{}] {}", p.id, p.name);
    }
    let choice = prompt::ask("> ")?;
    if prompt::is_back(&choice) {
        return Ok(None);
    }
    match ctx.catalog.get(&choice) {
        Some(p) => Ok(Some(p.clone())),
        None => {
            println!("Unknown preset.");
            Ok(None)
        }
    }
}

/// Expand a file or directory into a sorted list of media files.
/// Resource-fork droppings from macOS copies are skipped.
pub fn collect_media_files(path: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if path.is_file() {
        files.push(path.to_path_buf());
    } else if path.is_dir() {
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with("._") {
                continue;
            }
            let is_media = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| MEDIA_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false);
            if is_media {
                files.push(entry.path().to_path_buf());
            }
        }
    }
    files.sort();
    files
}

/// Configure one job per file interactively. `Ok(None)` means the user
/// backed out; no jobs from this session survive.
async fn build_jobs(
    ctx: &AppContext,
    files: &[PathBuf],
    preset: &Preset,
) -> Result<Option<Vec<Job>>> {
    let mut jobs = Vec::new();

    for (idx, file) in files.iter().enumerate() {
        println!(
            "\n=== Configuring file {}/{}: {} ===",
            idx + 1,
            files.len(),
            file.display()
        );

        let probe = match ffprobe::probe_file(&ctx.config.ffprobe_bin, file).await {
            Ok(p) => p,
            Err(e) => {
                warn!("Probe failed, skipping {}: {:#}", file.display(), e);
                continue;
            }
        };
        let duration = probe.duration_secs();
        let is_hdr = probe.is_hdr();
        if is_hdr {
            println!("HDR content detected.");
        }

        let crop = match resolve_crop(ctx, file, &probe, preset, duration).await? {
            CropResolution::Crop(c) => Some(c),
            CropResolution::NoCrop => None,
            CropResolution::Back => return Ok(None),
        };

        println!("\nChoose audio strategy:");
        println!(" [1] Passthrough (1:1 copy) - default");
        println!(" [2] Convert to EAC3 (smart surround, 7.1 support)");
        println!(" [3] Convert to AAC stereo (space saver)");
        let audio_mode = match prompt::ask("> ")?.as_str() {
            "2" => AudioMode::SmartSurround,
            "3" => AudioMode::Stereo,
            _ => AudioMode::Copy,
        };

        let Some(selected_audio) = select_tracks(ctx, &probe, TrackKind::Audio)? else {
            return Ok(None);
        };
        let Some(selected_subtitles) = select_tracks(ctx, &probe, TrackKind::Subtitle)? else {
            return Ok(None);
        };

        jobs.push(Job {
            input_path: file.clone(),
            output_path: Job::output_path_for(file, preset, &ctx.config.output_dir),
            duration_seconds: duration,
            is_hdr,
            crop,
            selected_audio,
            selected_subtitles,
            audio_mode,
            preset: preset.clone(),
        });
    }

    Ok(Some(jobs))
}

enum CropResolution {
    Crop(CropSpec),
    NoCrop,
    Back,
}

async fn resolve_crop(
    ctx: &AppContext,
    file: &Path,
    probe: &ProbeData,
    preset: &Preset,
    duration: f64,
) -> Result<CropResolution> {
    if preset.is_video_copy() {
        println!("Remux mode: auto-crop disabled (video copy).");
        return Ok(CropResolution::NoCrop);
    }

    let (orig_w, orig_h) = probe
        .video_stream()
        .map(|s| (s.width.unwrap_or(0), s.height.unwrap_or(0)))
        .unwrap_or((0, 0));

    println!("Analyzing black bars...");
    let detector = CropDetector::new(ctx.config.ffmpeg_bin.clone());
    let detected = detector
        .detect(file, duration, orig_w, orig_h)
        .await
        .unwrap_or_else(|e| {
            warn!("Crop detection failed for {}: {:#}", file.display(), e);
            None
        });

    match detected {
        Some(crop) => {
            println!("  Detected crop: {}", crop);
            let answer = prompt::ask("  Confirm? [Enter=yes, n=manual, q=back]: ")?;
            if prompt::is_back(&answer) {
                return Ok(CropResolution::Back);
            }
            if answer.eq_ignore_ascii_case("n") {
                let manual = prompt::ask("  Manual crop (e.g. 3840:1608:0:276) or Enter for none: ")?;
                return Ok(parse_manual_crop(&manual, orig_w, orig_h));
            }
            Ok(CropResolution::Crop(crop))
        }
        None => {
            println!("  No automatic crop found.");
            let manual = prompt::ask("  Manual crop or Enter for full frame (q=back): ")?;
            if prompt::is_back(&manual) {
                return Ok(CropResolution::Back);
            }
            Ok(parse_manual_crop(&manual, orig_w, orig_h))
        }
    }
}

fn parse_manual_crop(input: &str, orig_w: u32, orig_h: u32) -> CropResolution {
    if input.is_empty() {
        return CropResolution::NoCrop;
    }
    match input.parse::<CropSpec>() {
        Ok(crop) if orig_w == 0 || crop.fits(orig_w, orig_h) => CropResolution::Crop(crop),
        Ok(crop) => {
            println!("  Crop {} does not fit a {}x{} frame; ignoring.", crop, orig_w, orig_h);
            CropResolution::NoCrop
        }
        Err(e) => {
            println!("  Invalid crop ({}); using full frame.", e);
            CropResolution::NoCrop
        }
    }
}

/// List candidates, read a selection, resolve it. `Ok(None)` when the
/// user backs out.
fn select_tracks(
    ctx: &AppContext,
    probe: &ProbeData,
    kind: TrackKind,
) -> Result<Option<Vec<TrackSelection>>> {
    let candidates: Vec<TrackSelection> = probe
        .streams_of_type(kind.codec_type())
        .map(TrackSelection::from_stream)
        .collect();
    if candidates.is_empty() {
        println!("No {} tracks found.", kind.codec_type());
        return Ok(Some(Vec::new()));
    }

    println!("\n--- {} selection ---", kind.codec_type().to_uppercase());
    let streams: Vec<_> = probe.streams_of_type(kind.codec_type()).collect();
    for (pos, (track, stream)) in candidates.iter().zip(&streams).enumerate() {
        let mut line = format!("[{}] {} ({})", pos + 1, track.language.to_uppercase(), track.codec);
        if kind == TrackKind::Audio {
            line.push_str(&format!(" {}ch", track.channels));
        }
        if let Some(title) = stream.title() {
            line.push_str(&format!(" - {}", title));
        }
        println!("{}", line);
    }

    let default_hint = match kind {
        TrackKind::Audio => format!("default {}", ctx.config.preferred_audio_language.to_uppercase()),
        TrackKind::Subtitle => "none".to_string(),
    };
    let raw = prompt::ask(&format!(
        "Pick tracks (e.g. 1,3 or Enter for {}, q=back): ",
        default_hint
    ))?;

    match resolve_selection(&candidates, &raw, kind, &ctx.config.preferred_audio_language) {
        TrackChoice::Cancelled => Ok(None),
        TrackChoice::Selected(sel) => Ok(Some(sel)),
    }
}

/// Pre-start summary: what will happen to every stream of every job.
pub fn print_plan(jobs: &[Job]) {
    println!("\n=== ENCODE PLAN ===");
    for job in jobs {
        println!("File: {}", job.input_path.display());
        println!("Video: {}", job.preset.name);
        if let Some(crop) = &job.crop {
            println!("Crop: {}", crop);
        }
        println!("Audio:");
        for track in &job.selected_audio {
            let action = resolve_action(job.audio_mode, track, &job.preset);
            println!(
                "  - [{}] {} ({}ch): {}",
                track.language.to_uppercase(),
                track.codec,
                track.channels,
                action.describe()
            );
        }
        println!("Subtitles:");
        if job.selected_subtitles.is_empty() {
            println!("  - none");
        } else {
            for track in &job.selected_subtitles {
                println!("  - [{}] {}: copy", track.language.to_uppercase(), track.codec);
            }
        }
        println!("---");
    }
}

/// Hand a job list to the executor with the production runner.
pub async fn run_jobs(ctx: &AppContext, jobs: &[Job]) -> Result<()> {
    std::fs::create_dir_all(&ctx.config.output_dir).with_context(|| {
        format!("Failed to create output directory: {}", ctx.config.output_dir.display())
    })?;
    let runner = PipedRunner::new(ctx.config.ffmpeg_bin.clone());
    let executor = Executor::new(
        runner,
        Duration::from_secs(ctx.config.cooldown_secs),
        ctx.toolchain.zscale_available,
    );
    executor.execute(jobs).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_and_sorts_media_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mkv", "a.mp4", "notes.txt", "._junk.mkv", "c.MOV"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let files = collect_media_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.mp4", "b.mkv", "c.MOV"]);
    }

    #[test]
    fn single_file_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("movie.mkv");
        std::fs::write(&file, b"x").unwrap();
        assert_eq!(collect_media_files(&file), vec![file]);
    }

    #[test]
    fn manual_crop_validation() {
        assert!(matches!(parse_manual_crop("", 1920, 1080), CropResolution::NoCrop));
        assert!(matches!(
            parse_manual_crop("1920:800:0:140", 1920, 1080),
            CropResolution::Crop(_)
        ));
        // out of frame
        assert!(matches!(
            parse_manual_crop("1920:1200:0:0", 1920, 1080),
            CropResolution::NoCrop
        ));
        assert!(matches!(parse_manual_crop("garbage", 1920, 1080), CropResolution::NoCrop));
    }
}
