use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the interactive encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Path to the ffmpeg binary.
    pub ffmpeg_bin: PathBuf,
    /// Path to the ffprobe binary.
    pub ffprobe_bin: PathBuf,
    /// Directory where encoded files are written.
    pub output_dir: PathBuf,
    /// Language tag preferred when defaulting the audio track selection.
    pub preferred_audio_language: String,
    /// Pause between queued jobs, in seconds. Lets the machine cool down
    /// between sustained back-to-back encodes.
    pub cooldown_secs: u64,
    /// Optional TOML file replacing the built-in preset catalog.
    pub preset_file: Option<PathBuf>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            output_dir: default_output_dir(),
            preferred_audio_language: "eng".to_string(),
            cooldown_secs: 5,
            preset_file: None,
        }
    }
}

fn default_output_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => Path::new(&home).join("Movies"),
        None => PathBuf::from("Movies"),
    }
}

impl EncoderConfig {
    /// Load configuration from a file, or return defaults if path is None
    /// or the file doesn't exist. TOML is selected by extension, anything
    /// else is parsed as JSON.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(config_path) = path else {
            return Ok(Self::default());
        };
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))
        }
    }
}
