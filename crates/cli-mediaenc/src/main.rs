use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use mediaenc::config::EncoderConfig;
use mediaenc::presets::PresetCatalog;
use mediaenc::toolchain::Toolchain;

mod bench_mode;
mod import_mode;
mod prompt;
mod quality_mode;
mod wizard;

/// Interactive media transcoding front-end
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Everything the mode drivers need, loaded once at startup.
pub struct AppContext {
    pub config: EncoderConfig,
    pub catalog: PresetCatalog,
    pub toolchain: Toolchain,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp_secs().init();

    let config = EncoderConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    let catalog = match &config.preset_file {
        Some(path) => PresetCatalog::load(path).context("Failed to load preset catalog")?,
        None => PresetCatalog::builtin(),
    };
    if catalog.is_empty() {
        anyhow::bail!("Preset catalog is empty");
    }

    // missing tools are fatal, missing optional filters are not
    let toolchain = Toolchain::detect(&config.ffmpeg_bin, &config.ffprobe_bin)
        .await
        .context("Required external tools are missing")?;

    info!("Output directory: {}", config.output_dir.display());
    let ctx = AppContext {
        config,
        catalog,
        toolchain,
    };

    println!("=== MEDIAENC ===");
    loop {
        println!("\nWhat do you want to do?");
        println!(" [1] Encode (CPU/GPU)");
        println!(" [2] Quality check (VMAF / SSIM)");
        println!(" [3] Benchmark presets");
        println!(" [4] Import queue");
        println!(" [q] Quit");

        let choice = prompt::ask("> ")?.to_lowercase();
        match choice.as_str() {
            "1" => wizard::mode_encode(&ctx, None, None).await?,
            "2" => quality_mode::run(&ctx).await?,
            "3" => bench_mode::run(&ctx).await?,
            "4" => import_mode::run(&ctx).await?,
            "q" => return Ok(()),
            _ => println!("Invalid choice."),
        }
    }
}
