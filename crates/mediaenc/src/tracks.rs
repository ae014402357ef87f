use serde::{Deserialize, Serialize};

use crate::ffprobe::ProbeStream;

/// Resolved binding of a display position to an absolute container stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSelection {
    /// Absolute stream index within the container.
    pub index: i64,
    pub language: String,
    pub codec: String,
    pub channels: u32,
}

impl TrackSelection {
    pub fn from_stream(stream: &ProbeStream) -> Self {
        Self {
            index: stream.index,
            language: stream.language(),
            codec: stream
                .codec_name
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            // Assume stereo when the container doesn't say; only audio
            // streams carry a channel count.
            channels: stream.channels.unwrap_or(2),
        }
    }
}

/// Outcome of a selection prompt. `Cancelled` (the user typed `q`) is
/// distinct from selecting nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackChoice {
    Selected(Vec<TrackSelection>),
    Cancelled,
}

/// Elementary stream kind a selection applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Subtitle,
}

impl TrackKind {
    pub fn codec_type(&self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Subtitle => "subtitle",
        }
    }
}

/// Resolve a raw selection string against the candidate list.
///
/// Candidates are addressed by 1-based display position, not container
/// index. Empty input applies the default rule: for audio, the first
/// track matching the preferred language, or position 1 if none match;
/// for subtitles, nothing. Any unparseable or out-of-range token discards the
/// entire input and applies the default instead; partial selections are
/// never honored, so a typo can't silently change the track set.
pub fn resolve_selection(
    candidates: &[TrackSelection],
    raw_input: &str,
    kind: TrackKind,
    preferred_language: &str,
) -> TrackChoice {
    let input = raw_input.trim();
    if input.eq_ignore_ascii_case("q") {
        return TrackChoice::Cancelled;
    }
    if candidates.is_empty() {
        return TrackChoice::Selected(Vec::new());
    }
    if input.is_empty() {
        return TrackChoice::Selected(default_selection(candidates, kind, preferred_language));
    }

    match parse_positions(input, candidates.len()) {
        Some(positions) => TrackChoice::Selected(
            positions
                .into_iter()
                .map(|p| candidates[p - 1].clone())
                .collect(),
        ),
        None => TrackChoice::Selected(default_selection(candidates, kind, preferred_language)),
    }
}

fn default_selection(
    candidates: &[TrackSelection],
    kind: TrackKind,
    preferred_language: &str,
) -> Vec<TrackSelection> {
    match kind {
        TrackKind::Subtitle => Vec::new(),
        TrackKind::Audio => {
            let track = candidates
                .iter()
                .find(|c| c.language == preferred_language)
                .unwrap_or(&candidates[0]);
            vec![track.clone()]
        }
    }
}

/// Parse a comma/space-separated list of 1-based positions. `None` on any
/// bad token.
fn parse_positions(input: &str, candidate_count: usize) -> Option<Vec<usize>> {
    let mut positions = Vec::new();
    for token in input.replace(',', " ").split_whitespace() {
        let p: usize = token.parse().ok()?;
        if p == 0 || p > candidate_count {
            return None;
        }
        positions.push(p);
    }
    if positions.is_empty() {
        return None;
    }
    Some(positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(index: i64, lang: &str, codec: &str, channels: u32) -> TrackSelection {
        TrackSelection {
            index,
            language: lang.to_string(),
            codec: codec.to_string(),
            channels,
        }
    }

    fn candidates() -> Vec<TrackSelection> {
        vec![
            track(1, "jpn", "dts", 6),
            track(2, "eng", "ac3", 6),
            track(3, "eng", "aac", 2),
        ]
    }

    #[test]
    fn explicit_positions_map_to_absolute_indices() {
        let choice = resolve_selection(&candidates(), "1,3", TrackKind::Audio, "eng");
        let TrackChoice::Selected(sel) = choice else { panic!() };
        assert_eq!(sel.iter().map(|t| t.index).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn space_separated_positions_work() {
        let choice = resolve_selection(&candidates(), "2 3", TrackKind::Audio, "eng");
        let TrackChoice::Selected(sel) = choice else { panic!() };
        assert_eq!(sel.len(), 2);
    }

    #[test]
    fn empty_input_defaults_to_first_preferred_language_track() {
        // two eng tracks: only the first one is the default, not both
        let choice = resolve_selection(&candidates(), "", TrackKind::Audio, "eng");
        let TrackChoice::Selected(sel) = choice else { panic!() };
        assert_eq!(sel.iter().map(|t| t.index).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn no_language_match_defaults_to_first_track() {
        let choice = resolve_selection(&candidates(), "", TrackKind::Audio, "ita");
        let TrackChoice::Selected(sel) = choice else { panic!() };
        assert_eq!(sel.iter().map(|t| t.index).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn subtitles_default_to_none() {
        let choice = resolve_selection(&candidates(), "", TrackKind::Subtitle, "eng");
        assert_eq!(choice, TrackChoice::Selected(Vec::new()));
    }

    #[test]
    fn bad_token_discards_entire_input() {
        // "2,x" must not become just track 2
        let choice = resolve_selection(&candidates(), "2,x", TrackKind::Audio, "eng");
        let TrackChoice::Selected(sel) = choice else { panic!() };
        assert_eq!(sel.iter().map(|t| t.index).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn out_of_range_discards_entire_input() {
        let choice = resolve_selection(&candidates(), "1,9", TrackKind::Audio, "eng");
        let TrackChoice::Selected(sel) = choice else { panic!() };
        assert_eq!(sel.iter().map(|t| t.index).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn q_cancels() {
        assert_eq!(
            resolve_selection(&candidates(), "q", TrackKind::Audio, "eng"),
            TrackChoice::Cancelled
        );
        assert_eq!(
            resolve_selection(&candidates(), " Q ", TrackKind::Subtitle, "eng"),
            TrackChoice::Cancelled
        );
    }

    #[test]
    fn no_candidates_selects_nothing() {
        assert_eq!(
            resolve_selection(&[], "", TrackKind::Audio, "eng"),
            TrackChoice::Selected(Vec::new())
        );
    }

    #[test]
    fn from_stream_fills_defaults() {
        let stream = ProbeStream {
            index: 4,
            codec_type: Some("audio".into()),
            codec_name: None,
            channels: None,
            ..Default::default()
        };
        let t = TrackSelection::from_stream(&stream);
        assert_eq!(t.index, 4);
        assert_eq!(t.codec, "unknown");
        assert_eq!(t.channels, 2);
        assert_eq!(t.language, "und");
    }
}
