use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

use crate::presets::Preset;

pub const VMAF_MODEL_4K: &str = "vmaf_4k_v0.6.1";
pub const VMAF_MODEL_HD: &str = "vmaf_v0.6.1";

/// The 4K model is trained for living-room viewing distance; use it for
/// any preset that advertises a 4K target.
pub fn vmaf_model_for(preset: &Preset) -> &'static str {
    if preset.name.contains("4K") {
        VMAF_MODEL_4K
    } else {
        VMAF_MODEL_HD
    }
}

/// Quality metrics understood by the verdict table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Vmaf,
    Ssim,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Vmaf => "VMAF",
            Metric::Ssim => "SSIM",
        }
    }

    /// Map a score to a human rating and a one-line interpretation.
    pub fn verdict(&self, score: f64) -> Verdict {
        match self {
            Metric::Vmaf => {
                if score >= 95.0 {
                    Verdict::new("EXCELLENT", "Indistinguishable (transparent)")
                } else if score >= 93.0 {
                    Verdict::new("GREAT", "Imperceptible differences")
                } else if score >= 90.0 {
                    Verdict::new("GOOD", "High quality")
                } else if score >= 80.0 {
                    Verdict::new("ACCEPTABLE", "Visible differences")
                } else {
                    Verdict::new("POOR", "Obvious artifacts")
                }
            }
            Metric::Ssim => {
                if score >= 0.99 {
                    Verdict::new("EXCELLENT", "Identical")
                } else if score >= 0.98 {
                    Verdict::new("GOOD", "High fidelity")
                } else if score >= 0.95 {
                    Verdict::new("ACCEPTABLE", "Decent")
                } else {
                    Verdict::new("POOR", "Diverged")
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub rating: &'static str,
    pub note: &'static str,
}

impl Verdict {
    fn new(rating: &'static str, note: &'static str) -> Self {
        Self { rating, note }
    }
}

/// Extract the mean score the engine prints for `metric` from its textual
/// output. Scans last-to-first since the summary line comes after the
/// per-frame noise, matching `all:`/`mean:`/`average:` tokens.
pub fn parse_metric_mean(output: &str, metric: Metric) -> Option<f64> {
    // the pattern is static; a bad compile would be a bug, not input error
    let pattern = Regex::new(r"(?i)(?:all|mean|average)[:\s]+([0-9.]+)").ok()?;
    for line in output.lines().rev() {
        if !line.contains(metric.name()) {
            continue;
        }
        if let Some(caps) = pattern.captures(line) {
            if let Ok(score) = caps[1].parse() {
                return Some(score);
            }
        }
    }
    None
}

#[derive(Deserialize)]
struct VmafLog {
    pooled_metrics: Option<VmafPooled>,
}

#[derive(Deserialize)]
struct VmafPooled {
    vmaf: Option<VmafMetric>,
}

#[derive(Deserialize)]
struct VmafMetric {
    mean: Option<f64>,
}

/// Pull `pooled_metrics.vmaf.mean` out of a libvmaf JSON report.
pub fn parse_vmaf_json(text: &str) -> Option<f64> {
    let log: VmafLog = serde_json::from_str(text).ok()?;
    log.pooled_metrics?.vmaf?.mean
}

/// Read and parse a libvmaf JSON report file.
pub fn read_vmaf_score(path: &Path) -> Result<f64> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read VMAF report: {}", path.display()))?;
    parse_vmaf_json(&text)
        .with_context(|| format!("No pooled VMAF mean in report: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::PresetCatalog;

    #[test]
    fn model_follows_preset_target() {
        let cat = PresetCatalog::builtin();
        assert_eq!(vmaf_model_for(cat.get("1").unwrap()), VMAF_MODEL_4K);
        assert_eq!(vmaf_model_for(cat.get("2").unwrap()), VMAF_MODEL_HD);
    }

    #[test]
    fn parses_ssim_summary_line() {
        let stderr = "\
frame=1080 fps=251 q=-0.0 size=N/A\n\
[Parsed_ssim_0 @ 0x6000] SSIM Y:0.987654 (19.08db) U:0.991 V:0.992 All:0.988123 (19.25db)\n";
        let score = parse_metric_mean(stderr, Metric::Ssim).unwrap();
        assert!((score - 0.988123).abs() < 1e-9);
    }

    #[test]
    fn last_matching_line_wins() {
        let stderr = "SSIM All:0.5\nsome noise\nSSIM mean: 0.991\n";
        assert_eq!(parse_metric_mean(stderr, Metric::Ssim), Some(0.991));
    }

    #[test]
    fn missing_metric_yields_none() {
        assert_eq!(parse_metric_mean("no scores here", Metric::Ssim), None);
        assert_eq!(parse_metric_mean("SSIM but no number", Metric::Ssim), None);
    }

    #[test]
    fn parses_vmaf_pooled_mean() {
        let json = r#"{
            "frames": [],
            "pooled_metrics": {"vmaf": {"min": 88.1, "max": 99.2, "mean": 96.53}}
        }"#;
        assert_eq!(parse_vmaf_json(json), Some(96.53));
        assert_eq!(parse_vmaf_json("{}"), None);
        assert_eq!(parse_vmaf_json("not json"), None);
    }

    #[test]
    fn vmaf_verdict_thresholds() {
        assert_eq!(Metric::Vmaf.verdict(96.0).rating, "EXCELLENT");
        assert_eq!(Metric::Vmaf.verdict(94.0).rating, "GREAT");
        assert_eq!(Metric::Vmaf.verdict(91.5).rating, "GOOD");
        assert_eq!(Metric::Vmaf.verdict(85.0).rating, "ACCEPTABLE");
        assert_eq!(Metric::Vmaf.verdict(60.0).rating, "POOR");
    }

    #[test]
    fn ssim_verdict_thresholds() {
        assert_eq!(Metric::Ssim.verdict(0.995).rating, "EXCELLENT");
        assert_eq!(Metric::Ssim.verdict(0.985).rating, "GOOD");
        assert_eq!(Metric::Ssim.verdict(0.96).rating, "ACCEPTABLE");
        assert_eq!(Metric::Ssim.verdict(0.90).rating, "POOR");
    }
}
