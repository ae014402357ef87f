use anyhow::Result;
use humansize::{format_size, DECIMAL};
use mediaenc::bench::{BenchmarkEngine, BenchmarkResult};
use mediaenc::ffprobe;
use mediaenc::quality::Metric;
use mediaenc::runner::PipedRunner;

use crate::prompt;
use crate::wizard;
use crate::AppContext;

/// Benchmark mode: trial-encode a midpoint sample with several presets
/// and rank them, with an optional handoff into the encode wizard.
pub async fn run(ctx: &AppContext) -> Result<()> {
    println!("\n=== PRESET BENCHMARK (45s sample, video only) ===");

    let raw = prompt::ask("\nDrop the video file (q=back): ")?;
    if prompt::is_back(&raw) {
        return Ok(());
    }
    let input = prompt::clean_path(&raw);
    if !input.exists() {
        println!("File not found.");
        return Ok(());
    }

    let probe = match ffprobe::probe_file(&ctx.config.ffprobe_bin, &input).await {
        Ok(p) => p,
        Err(e) => {
            println!("Probe failed: {:#}", e);
            return Ok(());
        }
    };
    let duration = probe.duration_secs();

    loop {
        println!("\nPick presets to compare (e.g. 1,3,4):");
        for p in ctx.catalog.iter() {
            println!(" [{}] {}", p.id, p.name);
        }
        let sel = prompt::ask("> ")?;
        if prompt::is_back(&sel) {
            return Ok(());
        }
        let presets: Vec<_> = sel
            .replace(',', " ")
            .split_whitespace()
            .filter_map(|id| ctx.catalog.get(id).cloned())
            .collect();
        if presets.is_empty() {
            println!("No valid preset selected.");
            continue;
        }

        let engine = BenchmarkEngine::new(
            PipedRunner::new(ctx.config.ffmpeg_bin.clone()),
            ctx.config.ffmpeg_bin.clone(),
            ctx.toolchain.libvmaf_available,
        );
        let results = match engine.run(&input, duration, &presets).await {
            Ok(r) => r,
            Err(e) => {
                println!("Benchmark failed: {:#}", e);
                return Ok(());
            }
        };
        if results.is_empty() {
            println!("Every trial failed.");
            continue;
        }

        print_results(&results);

        println!("\nWhat next?");
        println!(" [1] Repeat (same file, other presets)");
        println!(" [2] Proceed to encode with a tested preset");
        println!(" [q] Back to main menu");
        match prompt::ask("> ")?.as_str() {
            "1" => continue,
            "2" => {
                let preset = if results.len() == 1 {
                    results[0].preset.clone()
                } else {
                    let pick = prompt::ask("Which preset? (rank number): ")?;
                    match pick.parse::<usize>().ok().and_then(|n| results.get(n.wrapping_sub(1))) {
                        Some(r) => r.preset.clone(),
                        None => {
                            println!("Invalid selection.");
                            return Ok(());
                        }
                    }
                };
                wizard::mode_encode(ctx, Some(input), Some(preset)).await?;
                return Ok(());
            }
            _ => return Ok(()),
        }
    }
}

fn print_results(results: &[BenchmarkResult]) {
    println!("\n=== BENCHMARK RESULTS ===");
    println!(
        "{:<4} {:<34} | {:>5} | {:<11} | {:>6} | {:>6} | {:>5} | SIZE",
        "", "PRESET", "VMAF", "RATING", "SSIM", "FPS", "EFF"
    );
    println!("{}", "-".repeat(96));
    for (i, r) in results.iter().enumerate() {
        let (vmaf, rating) = match r.vmaf_score {
            Some(v) => (format!("{:.1}", v), Metric::Vmaf.verdict(v).rating),
            None => ("N/A".to_string(), "N/A"),
        };
        let ssim = r
            .ssim_score
            .map(|s| format!("{:.4}", s))
            .unwrap_or_else(|| "N/A".to_string());
        println!(
            "[{}] {:<34} | {:>5} | {:<11} | {:>6} | {:>6.0} | {:>5.2} | {}",
            i + 1,
            r.preset.name,
            vmaf,
            rating,
            ssim,
            r.measured_fps,
            r.efficiency(),
            format_size(r.estimated_total_bytes, DECIMAL),
        );
    }
    println!("{}", "-".repeat(96));
}
