use std::fmt;

use serde::{Deserialize, Serialize};

use crate::presets::Preset;
use crate::tracks::TrackSelection;

/// Per-job audio handling strategy, chosen by the user during job
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    /// Defer to the preset's passthrough list.
    Copy,
    /// Keep efficient surround codecs, re-encode bulky ones to EAC3.
    SmartSurround,
    /// Downmix everything to stereo AAC.
    Stereo,
}

impl fmt::Display for AudioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AudioMode::Copy => "Copy (preset passthrough)",
            AudioMode::SmartSurround => "Smart surround (EAC3 640k)",
            AudioMode::Stereo => "Stereo AAC 256k",
        };
        f.write_str(label)
    }
}

/// What happens to one audio track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioAction {
    Copy,
    Transcode {
        codec: &'static str,
        bitrate: String,
        /// Downmix to two channels with `-ac 2`.
        downmix: bool,
    },
}

impl AudioAction {
    /// Short label for the plan summary.
    pub fn describe(&self) -> String {
        match self {
            AudioAction::Copy => "copy".to_string(),
            AudioAction::Transcode {
                codec,
                bitrate,
                downmix,
            } => {
                if *downmix {
                    format!("{} {} stereo", codec, bitrate)
                } else {
                    format!("{} {}", codec, bitrate)
                }
            }
        }
    }
}

/// Decide the action for one audio track. This single table is the only
/// place the audio strategy is interpreted; the command builder and the
/// plan summary both go through it so they can never disagree.
pub fn resolve_action(mode: AudioMode, track: &TrackSelection, preset: &Preset) -> AudioAction {
    match mode {
        AudioMode::Copy => {
            if preset.passthrough.iter().any(|c| c == &track.codec) {
                AudioAction::Copy
            } else {
                AudioAction::Transcode {
                    codec: "ac3",
                    bitrate: preset.audio_bitrate.clone(),
                    downmix: false,
                }
            }
        }
        AudioMode::SmartSurround => {
            if track.codec == "ac3" || track.codec == "eac3" {
                AudioAction::Copy
            } else if track.channels <= 2 {
                // Stereo tracks gain nothing from a surround re-encode.
                AudioAction::Copy
            } else {
                AudioAction::Transcode {
                    codec: "eac3",
                    bitrate: "640k".to_string(),
                    downmix: false,
                }
            }
        }
        AudioMode::Stereo => AudioAction::Transcode {
            codec: "aac",
            bitrate: "256k".to_string(),
            downmix: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::PresetCatalog;
    use proptest::prelude::*;

    fn track(codec: &str, channels: u32) -> TrackSelection {
        TrackSelection {
            index: 1,
            language: "eng".to_string(),
            codec: codec.to_string(),
            channels,
        }
    }

    fn preset(id: &str) -> Preset {
        PresetCatalog::builtin().get(id).unwrap().clone()
    }

    #[test]
    fn copy_mode_honors_passthrough_list() {
        let p = preset("0");
        assert_eq!(resolve_action(AudioMode::Copy, &track("dts", 6), &p), AudioAction::Copy);
        assert_eq!(
            resolve_action(AudioMode::Copy, &track("pcm_s24le", 6), &p),
            AudioAction::Transcode {
                codec: "ac3",
                bitrate: "320k".to_string(),
                downmix: false,
            }
        );
    }

    #[test]
    fn copy_mode_uses_preset_bitrate_for_fallback() {
        // the 1080p preset carries a 256k audio bitrate
        let p = preset("2");
        let action = resolve_action(AudioMode::Copy, &track("pcm_s16le", 2), &p);
        assert_eq!(
            action,
            AudioAction::Transcode {
                codec: "ac3",
                bitrate: "256k".to_string(),
                downmix: false,
            }
        );
    }

    #[test]
    fn smart_surround_keeps_dolby_codecs() {
        let p = preset("1");
        assert_eq!(
            resolve_action(AudioMode::SmartSurround, &track("ac3", 6), &p),
            AudioAction::Copy
        );
        assert_eq!(
            resolve_action(AudioMode::SmartSurround, &track("eac3", 8), &p),
            AudioAction::Copy
        );
    }

    #[test]
    fn smart_surround_reencodes_bulky_surround() {
        let p = preset("1");
        assert_eq!(
            resolve_action(AudioMode::SmartSurround, &track("truehd", 8), &p),
            AudioAction::Transcode {
                codec: "eac3",
                bitrate: "640k".to_string(),
                downmix: false,
            }
        );
    }

    #[test]
    fn stereo_mode_always_downmixes() {
        let p = preset("1");
        let action = resolve_action(AudioMode::Stereo, &track("truehd", 8), &p);
        let AudioAction::Transcode { codec, downmix, .. } = action else {
            panic!("stereo mode must transcode");
        };
        assert_eq!(codec, "aac");
        assert!(downmix);
    }

    proptest! {
        /// Tracks with two channels or fewer are never re-encoded in smart
        /// surround mode, whatever their codec.
        #[test]
        fn stereo_bypass_holds_for_any_codec(
            codec in "[a-z0-9_]{2,10}",
            channels in 0u32..=2,
        ) {
            let p = preset("1");
            let action = resolve_action(
                AudioMode::SmartSurround,
                &track(&codec, channels),
                &p,
            );
            prop_assert_eq!(action, AudioAction::Copy);
        }

        /// Copy mode never transcodes a codec the preset passes through.
        #[test]
        fn passthrough_codecs_are_never_transcoded(
            idx in 0usize..9,
            channels in 1u32..=8,
        ) {
            let p = preset("0");
            let codec = p.passthrough[idx].clone();
            let action = resolve_action(AudioMode::Copy, &track(&codec, channels), &p);
            prop_assert_eq!(action, AudioAction::Copy);
        }
    }
}
