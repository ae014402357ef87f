use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use tokio::process::Command;

/// Complete ffprobe output for one container.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeData {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(default)]
    pub format: ProbeFormat,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeFormat {
    pub duration: Option<String>,
}

/// Stream-level metadata from ffprobe. Immutable; produced fresh per probe.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeStream {
    pub index: i64,
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub channels: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub color_transfer: Option<String>,
    pub color_primaries: Option<String>,
    pub tags: Option<HashMap<String, String>>,
}

impl ProbeStream {
    pub fn is_video(&self) -> bool {
        self.codec_type.as_deref() == Some("video")
    }

    /// Lowercased language tag, "und" when untagged.
    pub fn language(&self) -> String {
        self.tags
            .as_ref()
            .and_then(|t| t.get("language"))
            .map(|l| l.to_lowercase())
            .unwrap_or_else(|| "und".to_string())
    }

    pub fn title(&self) -> Option<&str> {
        self.tags.as_ref().and_then(|t| t.get("title")).map(|s| s.as_str())
    }

    /// Check if this video stream carries HDR content. PQ and HLG transfer
    /// functions qualify on their own, as do BT.2020 primaries.
    pub fn is_hdr(&self) -> bool {
        if let Some(transfer) = &self.color_transfer {
            let t = transfer.to_lowercase();
            if t.contains("smpte2084") || t.contains("st2084") {
                return true;
            }
            if t.contains("arib-std-b67") || t.contains("hlg") {
                return true;
            }
        }
        if let Some(primaries) = &self.color_primaries {
            if primaries.to_lowercase().contains("bt2020") {
                return true;
            }
        }
        false
    }
}

impl ProbeData {
    /// Container duration in seconds; 0.0 when ffprobe reported none.
    pub fn duration_secs(&self) -> f64 {
        self.format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    /// First video stream in container order, if any.
    pub fn video_stream(&self) -> Option<&ProbeStream> {
        self.streams.iter().find(|s| s.is_video())
    }

    /// Only the first video stream decides the HDR classification.
    pub fn is_hdr(&self) -> bool {
        self.video_stream().map(|s| s.is_hdr()).unwrap_or(false)
    }

    /// Streams of the given elementary type, in container order.
    pub fn streams_of_type<'a>(&'a self, codec_type: &'a str) -> impl Iterator<Item = &'a ProbeStream> {
        self.streams
            .iter()
            .filter(move |s| s.codec_type.as_deref() == Some(codec_type))
    }
}

/// Run ffprobe and parse the JSON output. A failure here means the file
/// has no usable metadata; callers skip the file and move on.
pub async fn probe_file(ffprobe_bin: &Path, file_path: &Path) -> Result<ProbeData> {
    if !file_path.exists() {
        anyhow::bail!("File does not exist: {}", file_path.display());
    }

    debug!("Probing: {}", file_path.display());

    let output = Command::new(ffprobe_bin)
        .arg("-v")
        .arg("quiet")
        .arg("-print_format")
        .arg("json")
        .arg("-show_streams")
        .arg("-show_format")
        .arg(file_path)
        .output()
        .await
        .with_context(|| format!("Failed to execute ffprobe for: {}", file_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "ffprobe failed (exit code {}) for {}: {}",
            output.status.code().unwrap_or(-1),
            file_path.display(),
            stderr
        );
    }

    let json_str =
        String::from_utf8(output.stdout).context("ffprobe output is not valid UTF-8")?;

    let data: ProbeData = serde_json::from_str(&json_str)
        .with_context(|| format!("Failed to parse ffprobe JSON for: {}", file_path.display()))?;

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_stream(transfer: Option<&str>, primaries: Option<&str>) -> ProbeStream {
        ProbeStream {
            index: 0,
            codec_type: Some("video".to_string()),
            codec_name: Some("hevc".to_string()),
            width: Some(3840),
            height: Some(2160),
            color_transfer: transfer.map(|s| s.to_string()),
            color_primaries: primaries.map(|s| s.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn hdr_by_transfer_alone() {
        let s = video_stream(Some("smpte2084"), Some("bt709"));
        assert!(s.is_hdr());
    }

    #[test]
    fn hdr_by_primaries_alone() {
        let s = video_stream(Some("bt709"), Some("bt2020"));
        assert!(s.is_hdr());
    }

    #[test]
    fn sdr_when_both_bt709() {
        let s = video_stream(Some("bt709"), Some("bt709"));
        assert!(!s.is_hdr());
    }

    #[test]
    fn hlg_is_hdr() {
        let s = video_stream(Some("arib-std-b67"), None);
        assert!(s.is_hdr());
    }

    #[test]
    fn only_first_video_stream_decides() {
        let data = ProbeData {
            streams: vec![
                video_stream(Some("bt709"), Some("bt709")),
                video_stream(Some("smpte2084"), Some("bt2020")),
            ],
            format: ProbeFormat::default(),
        };
        assert!(!data.is_hdr());
    }

    #[test]
    fn duration_parses_and_defaults() {
        let data = ProbeData {
            streams: vec![],
            format: ProbeFormat {
                duration: Some("7285.219000".to_string()),
            },
        };
        assert!((data.duration_secs() - 7285.219).abs() < 1e-6);

        let missing = ProbeData {
            streams: vec![],
            format: ProbeFormat::default(),
        };
        assert_eq!(missing.duration_secs(), 0.0);
    }

    #[test]
    fn parses_real_ffprobe_json() {
        let json = r#"{
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264",
                 "width": 1920, "height": 1080,
                 "color_transfer": "bt709", "color_primaries": "bt709"},
                {"index": 1, "codec_type": "audio", "codec_name": "dts",
                 "channels": 6, "tags": {"language": "ENG", "title": "Surround"}},
                {"index": 2, "codec_type": "subtitle", "codec_name": "subrip",
                 "tags": {"language": "ita"}}
            ],
            "format": {"duration": "5400.041000"}
        }"#;
        let data: ProbeData = serde_json::from_str(json).unwrap();
        assert_eq!(data.streams.len(), 3);
        assert_eq!(data.streams_of_type("audio").count(), 1);
        let audio = data.streams_of_type("audio").next().unwrap();
        assert_eq!(audio.language(), "eng");
        assert_eq!(audio.channels, Some(6));
        assert_eq!(audio.title(), Some("Surround"));
        assert!(!data.is_hdr());
    }

    #[test]
    fn untagged_stream_is_und() {
        let s = ProbeStream::default();
        assert_eq!(s.language(), "und");
    }
}
