use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// How a preset drives the video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetKind {
    /// Stream-copy the video; only audio/subtitles are reworked.
    Copy,
    /// Hardware encoder.
    Gpu,
    /// Software encoder.
    Cpu,
}

/// A named bundle of encoder parameters. The `video_opts` fragments are
/// opaque: they are passed to ffmpeg verbatim, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub kind: PresetKind,
    pub video_opts: Vec<String>,
    /// Fallback bitrate for the AC3 transcode path in copy mode.
    pub audio_bitrate: String,
    /// Audio codecs eligible for stream copy without re-encoding.
    pub passthrough: Vec<String>,
}

impl Preset {
    pub fn is_video_copy(&self) -> bool {
        matches!(self.kind, PresetKind::Copy)
    }

    /// Preset name with characters that are not valid in a file name
    /// stripped out.
    pub fn sanitized_name(&self) -> String {
        self.name.replace(['/', ':'], "-")
    }

    /// Whether the preset targets a 1080p output. Drives the scale filter
    /// and, for HDR sources, tone-mapping.
    pub fn targets_1080p(&self) -> bool {
        self.name.contains("1080p") || self.video_opts.iter().any(|o| o.contains("1080p"))
    }

    /// Whether the preset encodes into a 10-bit pixel format.
    pub fn wants_10bit(&self) -> bool {
        self.video_opts.iter().any(|o| o == "p010le")
    }

    pub fn audio_bitrate_kbps(&self) -> u32 {
        self.audio_bitrate
            .trim_end_matches('k')
            .parse()
            .unwrap_or(320)
    }
}

/// Immutable catalog of presets, loaded once at startup and passed by
/// reference to everything that needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetCatalog {
    presets: BTreeMap<String, Preset>,
}

impl PresetCatalog {
    /// The built-in catalog.
    pub fn builtin() -> Self {
        let full_passthrough: Vec<String> = [
            "aac", "ac3", "eac3", "dtshd", "dts", "mp3", "opus", "truehd", "flac",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let presets = [
            Preset {
                id: "0".into(),
                name: "Remux (Video Copy - Audio-Sub Only)".into(),
                kind: PresetKind::Copy,
                video_opts: args(&["-c:v", "copy"]),
                audio_bitrate: "320k".into(),
                passthrough: full_passthrough.clone(),
            },
            Preset {
                id: "1".into(),
                name: "4K VideoToolbox (CQ 65)".into(),
                kind: PresetKind::Gpu,
                video_opts: args(&[
                    "-c:v", "hevc_videotoolbox",
                    "-profile:v", "main10",
                    "-pix_fmt", "p010le",
                    "-fps_mode", "vfr",
                    "-color_range", "tv",
                    "-color_primaries", "bt2020",
                    "-color_trc", "smpte2084",
                    "-colorspace", "bt2020nc",
                    "-q:v", "65",
                ]),
                audio_bitrate: "320k".into(),
                passthrough: full_passthrough.clone(),
            },
            Preset {
                id: "2".into(),
                name: "1080p VideoToolbox (CQ 65)".into(),
                kind: PresetKind::Gpu,
                video_opts: args(&[
                    "-c:v", "hevc_videotoolbox",
                    "-profile:v", "main10",
                    "-pix_fmt", "p010le",
                    "-fps_mode", "vfr",
                    "-color_range", "tv",
                    "-color_primaries", "bt709",
                    "-color_trc", "bt709",
                    "-colorspace", "bt709",
                    "-q:v", "65",
                ]),
                audio_bitrate: "256k".into(),
                passthrough: args(&["aac", "ac3", "eac3", "dtshd", "dts", "mp3", "truehd"]),
            },
            Preset {
                id: "3".into(),
                name: "4K CPU x265 (Medium - CRF 18)".into(),
                kind: PresetKind::Cpu,
                video_opts: args(&[
                    "-c:v", "libx265",
                    "-preset", "medium",
                    "-crf", "18",
                    "-profile:v", "main10",
                    "-pix_fmt", "yuv420p10le",
                    "-x265-params", "sao=0:aq-mode=2:hdr10_opt=1:repeat-headers=1",
                    "-color_range", "tv",
                    "-color_primaries", "bt2020",
                    "-color_trc", "smpte2084",
                    "-colorspace", "bt2020nc",
                    "-tag:v", "hvc1",
                ]),
                audio_bitrate: "320k".into(),
                passthrough: full_passthrough.clone(),
            },
            Preset {
                id: "4".into(),
                name: "4K High Bitrate VBR (24Mbps)".into(),
                kind: PresetKind::Gpu,
                video_opts: args(&[
                    "-c:v", "hevc_videotoolbox",
                    "-profile:v", "main10",
                    "-pix_fmt", "p010le",
                    "-fps_mode", "vfr",
                    "-color_range", "tv",
                    "-color_primaries", "bt2020",
                    "-color_trc", "smpte2084",
                    "-colorspace", "bt2020nc",
                    "-tag:v", "hvc1",
                    "-b:v", "24000k",
                    "-maxrate", "35000k",
                    "-bufsize", "35000k",
                ]),
                audio_bitrate: "320k".into(),
                passthrough: full_passthrough,
            },
        ];

        Self {
            presets: presets.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Load a catalog from a TOML file. Replaces the built-in table
    /// wholesale; presets are never merged.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read preset file: {}", path.display()))?;
        let catalog: PresetCatalog = toml::from_str(&content)
            .with_context(|| format!("Failed to parse preset file: {}", path.display()))?;
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<&Preset> {
        self.presets.get(id)
    }

    /// Presets in id order, for menu display.
    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.values()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

fn args(a: &[&str]) -> Vec<String> {
    a.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_shape() {
        let cat = PresetCatalog::builtin();
        assert_eq!(cat.len(), 5);
        assert!(cat.get("0").unwrap().is_video_copy());
        assert!(!cat.get("1").unwrap().is_video_copy());
        assert_eq!(cat.get("2").unwrap().audio_bitrate_kbps(), 256);
    }

    #[test]
    fn sanitized_name_strips_path_chars() {
        let mut p = PresetCatalog::builtin().get("1").unwrap().clone();
        p.name = "4K/HDR: test".into();
        assert_eq!(p.sanitized_name(), "4K-HDR- test");
    }

    #[test]
    fn target_resolution_from_name() {
        let cat = PresetCatalog::builtin();
        assert!(cat.get("2").unwrap().targets_1080p());
        assert!(!cat.get("1").unwrap().targets_1080p());
        assert!(cat.get("1").unwrap().wants_10bit());
        assert!(!cat.get("3").unwrap().wants_10bit()); // yuv420p10le, not p010le
    }

    #[test]
    fn catalog_roundtrips_through_toml() {
        let cat = PresetCatalog::builtin();
        let text = toml::to_string(&cat).unwrap();
        let back: PresetCatalog = toml::from_str(&text).unwrap();
        assert_eq!(back.get("3").unwrap(), cat.get("3").unwrap());
    }
}
