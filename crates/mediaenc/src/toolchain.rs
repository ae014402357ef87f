use std::path::Path;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use tokio::process::Command;

/// What the external engine installation can do. Probed once at startup.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// First line of `ffmpeg -version`.
    pub ffmpeg_version: String,
    /// zscale is needed for proper HDR-to-SDR tone-mapping.
    pub zscale_available: bool,
    /// libvmaf is needed for the benchmark and quality-check modes.
    pub libvmaf_available: bool,
}

impl Toolchain {
    /// Verify both external tools respond and record optional filter
    /// availability. Missing tools are fatal; missing filters are not.
    pub async fn detect(ffmpeg_bin: &Path, ffprobe_bin: &Path) -> Result<Self> {
        let ffmpeg_version = version_line(ffmpeg_bin).await.with_context(|| {
            format!("ffmpeg not found or not executable: {}", ffmpeg_bin.display())
        })?;
        version_line(ffprobe_bin).await.with_context(|| {
            format!("ffprobe not found or not executable: {}", ffprobe_bin.display())
        })?;

        let filters = Command::new(ffmpeg_bin)
            .arg("-hide_banner")
            .arg("-filters")
            .output()
            .await
            .context("Failed to query engine filters")?;
        let filter_list = String::from_utf8_lossy(&filters.stdout);
        let zscale_available = filter_list.contains(" zscale ");
        let libvmaf_available = filter_list.contains("libvmaf");

        info!("Engine: {}", ffmpeg_version);
        if !zscale_available {
            warn!("zscale filter unavailable; HDR downscales will use lanczos only");
        }
        if !libvmaf_available {
            warn!("libvmaf filter unavailable; VMAF scoring disabled");
        }

        Ok(Self {
            ffmpeg_version,
            zscale_available,
            libvmaf_available,
        })
    }
}

async fn version_line(bin: &Path) -> Result<String> {
    let output = Command::new(bin)
        .arg("-version")
        .output()
        .await
        .with_context(|| format!("Failed to execute: {}", bin.display()))?;
    if !output.status.success() {
        bail!("{} -version exited non-zero", bin.display());
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().to_string())
}
