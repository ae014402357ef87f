use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Height delta below which a detected crop is treated as noise.
const NOISE_THRESHOLD_PX: u32 = 10;

/// Fractions of the duration at which samples are taken. Three points guard
/// against a single dark scene faking a letterbox.
const SAMPLE_POINTS: [f64; 3] = [0.20, 0.50, 0.75];

/// A rectangular sub-region of the original frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropSpec {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl CropSpec {
    /// The ffmpeg filter fragment for this crop.
    pub fn filter(&self) -> String {
        format!("crop={}", self)
    }

    /// Check the crop fits inside the source frame.
    pub fn fits(&self, orig_width: u32, orig_height: u32) -> bool {
        self.width + self.x <= orig_width && self.height + self.y <= orig_height
    }
}

impl fmt::Display for CropSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

impl FromStr for CropSpec {
    type Err = anyhow::Error;

    /// Parse `W:H:X:Y`, with or without a leading `crop=`. Used for manual
    /// crop entry in the wizard.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().strip_prefix("crop=").unwrap_or(s.trim());
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 4 {
            anyhow::bail!("Expected W:H:X:Y, got: {}", s);
        }
        let nums: Vec<u32> = parts
            .iter()
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .with_context(|| format!("Invalid crop geometry: {}", s))?;
        Ok(CropSpec {
            width: nums[0],
            height: nums[1],
            x: nums[2],
            y: nums[3],
        })
    }
}

/// Black-bar detector. Samples the file at three temporal offsets and
/// consolidates the cropdetect observations into a single decision.
pub struct CropDetector {
    ffmpeg_bin: PathBuf,
}

impl CropDetector {
    pub fn new(ffmpeg_bin: PathBuf) -> Self {
        Self { ffmpeg_bin }
    }

    /// Detect symmetric vertical letterboxing. Returns `Ok(None)` when no
    /// trustworthy crop was found; the caller uses the full frame.
    pub async fn detect(
        &self,
        input: &Path,
        duration: f64,
        orig_width: u32,
        orig_height: u32,
    ) -> Result<Option<CropSpec>> {
        if orig_width == 0 {
            return Ok(None);
        }

        let mut observations = Vec::new();

        for fraction in SAMPLE_POINTS {
            let ts = duration * fraction;
            // Decode a short burst, skipping the first 20 frames so the
            // cropdetect filter has settled before we trust its output.
            let output = Command::new(&self.ffmpeg_bin)
                .arg("-hide_banner")
                .arg("-y")
                .arg("-ss")
                .arg(ts.to_string())
                .arg("-i")
                .arg(input)
                .arg("-frames:v")
                .arg("40")
                .arg("-vf")
                .arg(r"select=gte(n\,20),cropdetect=0.1:2:0")
                .arg("-f")
                .arg("null")
                .arg("-")
                .output()
                .await
                .with_context(|| format!("Failed to run cropdetect on: {}", input.display()))?;

            let stderr = String::from_utf8_lossy(&output.stderr);
            for line in stderr.lines() {
                if let Some(obs) = parse_crop_line(line) {
                    if accept_observation(&obs, orig_width, orig_height) {
                        observations.push(obs);
                    }
                }
            }
        }

        let Some(spec) = consolidate(&observations, orig_width) else {
            debug!("No crop consensus for {}", input.display());
            return Ok(None);
        };
        if !spec.fits(orig_width, orig_height) {
            warn!("Discarding out-of-frame crop {} for {}", spec, input.display());
            return Ok(None);
        }
        Ok(Some(spec))
    }
}

/// Extract a `crop=W:H:X:Y` observation from one cropdetect stderr line.
pub fn parse_crop_line(line: &str) -> Option<CropSpec> {
    let raw = line.trim().rsplit("crop=").next()?;
    if raw == line.trim() && !line.contains("crop=") {
        return None;
    }
    raw.parse().ok()
}

/// Only symmetric vertical letterboxing is trusted: full width, zero x
/// offset, and a height delta large enough to not be detector noise.
fn accept_observation(obs: &CropSpec, orig_width: u32, orig_height: u32) -> bool {
    obs.width == orig_width
        && obs.x == 0
        && orig_height.abs_diff(obs.height) > NOISE_THRESHOLD_PX
}

/// Mode of a slice, or `None` when the slice is empty or the top count is
/// tied between distinct values.
pub fn mode(values: &[u32]) -> Option<u32> {
    let mut counts: Vec<(u32, usize)> = Vec::new();
    for &v in values {
        match counts.iter_mut().find(|(c, _)| *c == v) {
            Some((_, n)) => *n += 1,
            None => counts.push((v, 1)),
        }
    }
    let best = counts.iter().map(|&(_, n)| n).max()?;
    let mut top = counts.iter().filter(|&&(_, n)| n == best);
    let candidate = top.next()?.0;
    if top.next().is_some() {
        return None; // no unique mode
    }
    Some(candidate)
}

/// Consolidate surviving observations: mode of heights, then mode of y
/// offsets among observations sharing that height. When either mode fails,
/// the most recent observation wins. `None` only when there are no
/// observations at all.
pub fn consolidate(observations: &[CropSpec], orig_width: u32) -> Option<CropSpec> {
    let last = *observations.last()?;

    let heights: Vec<u32> = observations.iter().map(|o| o.height).collect();
    let Some(final_h) = mode(&heights) else {
        return Some(last);
    };

    let ys: Vec<u32> = observations
        .iter()
        .filter(|o| o.height == final_h)
        .map(|o| o.y)
        .collect();
    let Some(final_y) = mode(&ys) else {
        return Some(last);
    };

    Some(CropSpec {
        width: orig_width,
        height: final_h,
        x: 0,
        y: final_y,
    })
}
