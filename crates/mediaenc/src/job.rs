use std::path::{Path, PathBuf};

use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::AudioMode;
use crate::crop::CropSpec;
use crate::presets::{Preset, PresetCatalog};
use crate::tracks::TrackSelection;

/// Version tag written into exported queue files.
const QUEUE_FORMAT_VERSION: u32 = 1;

/// One unit of work, immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub duration_seconds: f64,
    pub is_hdr: bool,
    pub crop: Option<CropSpec>,
    pub selected_audio: Vec<TrackSelection>,
    pub selected_subtitles: Vec<TrackSelection>,
    pub audio_mode: AudioMode,
    pub preset: Preset,
}

impl Job {
    /// Derive the output path from the input stem and the sanitized preset
    /// name. Collisions are not resolved; last write wins.
    pub fn output_path_for(input: &Path, preset: &Preset, output_dir: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        output_dir.join(format!("{}_enc_{}.mkv", stem, preset.sanitized_name()))
    }
}

/// Errors raised while importing a queue file. Any of these leaves the
/// in-memory queue exactly as it was.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to read queue file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write queue file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed queue file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("queue file {path} has unsupported version {found} (expected {expected})")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
    #[error("queue file {path} references unknown preset id {preset_id:?}")]
    UnknownPreset { path: PathBuf, preset_id: String },
}

/// Flat on-disk representation of a `Job`. Paths are plain strings and the
/// preset is referenced by id, rehydrated from the catalog on import.
#[derive(Debug, Serialize, Deserialize)]
struct JobRecord {
    input: String,
    output: String,
    duration_seconds: f64,
    is_hdr: bool,
    crop: Option<CropSpec>,
    selected_audio: Vec<TrackSelection>,
    selected_subtitles: Vec<TrackSelection>,
    audio_mode: AudioMode,
    preset_id: String,
}

impl JobRecord {
    fn from_job(job: &Job) -> Self {
        Self {
            input: job.input_path.to_string_lossy().into_owned(),
            output: job.output_path.to_string_lossy().into_owned(),
            duration_seconds: job.duration_seconds,
            is_hdr: job.is_hdr,
            crop: job.crop,
            selected_audio: job.selected_audio.clone(),
            selected_subtitles: job.selected_subtitles.clone(),
            audio_mode: job.audio_mode,
            preset_id: job.preset.id.clone(),
        }
    }

    fn into_job(self, preset: Preset) -> Job {
        Job {
            input_path: PathBuf::from(self.input),
            output_path: PathBuf::from(self.output),
            duration_seconds: self.duration_seconds,
            is_hdr: self.is_hdr,
            crop: self.crop,
            selected_audio: self.selected_audio,
            selected_subtitles: self.selected_subtitles,
            audio_mode: self.audio_mode,
            preset,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct QueueFile {
    version: u32,
    exported_at: String,
    jobs: Vec<JobRecord>,
}

/// Ordered job list. Insertion order is execution order; merge appends to
/// the tail, nothing reorders or deduplicates.
#[derive(Debug, Default)]
pub struct Queue {
    jobs: Vec<Job>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, jobs: Vec<Job>) {
        self.jobs.extend(jobs);
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Serialize the queue to `path` as a versioned JSON document.
    pub fn export(&self, path: &Path) -> Result<(), QueueError> {
        let file = QueueFile {
            version: QUEUE_FORMAT_VERSION,
            exported_at: Utc::now().to_rfc3339(),
            jobs: self.jobs.iter().map(JobRecord::from_job).collect(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| QueueError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| QueueError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Exported {} job(s) to {}", self.jobs.len(), path.display());
        Ok(())
    }

    /// Import `path` and append its jobs to the tail. The whole file is
    /// validated before anything is appended, so a failed merge leaves the
    /// queue untouched.
    pub fn merge(&mut self, path: &Path, catalog: &PresetCatalog) -> Result<usize, QueueError> {
        let content = std::fs::read_to_string(path).map_err(|source| QueueError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: QueueFile =
            serde_json::from_str(&content).map_err(|source| QueueError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        if file.version != QUEUE_FORMAT_VERSION {
            return Err(QueueError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: file.version,
                expected: QUEUE_FORMAT_VERSION,
            });
        }

        let mut imported = Vec::with_capacity(file.jobs.len());
        for record in file.jobs {
            let preset = catalog
                .get(&record.preset_id)
                .cloned()
                .ok_or_else(|| QueueError::UnknownPreset {
                    path: path.to_path_buf(),
                    preset_id: record.preset_id.clone(),
                })?;
            imported.push(record.into_job(preset));
        }

        let count = imported.len();
        self.jobs.extend(imported);
        info!("Merged {} job(s) from {}", count, path.display());
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job(catalog: &PresetCatalog, input: &str, preset_id: &str) -> Job {
        let preset = catalog.get(preset_id).unwrap().clone();
        Job {
            input_path: PathBuf::from(input),
            output_path: Job::output_path_for(Path::new(input), &preset, Path::new("/tmp/out")),
            duration_seconds: 5400.0,
            is_hdr: true,
            crop: Some(CropSpec {
                width: 3840,
                height: 1608,
                x: 0,
                y: 276,
            }),
            selected_audio: vec![TrackSelection {
                index: 1,
                language: "eng".to_string(),
                codec: "truehd".to_string(),
                channels: 8,
            }],
            selected_subtitles: vec![],
            audio_mode: AudioMode::SmartSurround,
            preset,
        }
    }

    #[test]
    fn output_path_uses_stem_and_sanitized_preset_name() {
        let catalog = PresetCatalog::builtin();
        let preset = catalog.get("1").unwrap();
        let out = Job::output_path_for(
            Path::new("/media/Movie (2021).mkv"),
            preset,
            Path::new("/tmp/out"),
        );
        assert_eq!(
            out,
            PathBuf::from("/tmp/out/Movie (2021)_enc_4K VideoToolbox (CQ 65).mkv")
        );
    }

    #[test]
    fn export_then_merge_roundtrips_every_field() {
        let catalog = PresetCatalog::builtin();
        let mut queue = Queue::new();
        queue.add(vec![
            sample_job(&catalog, "/media/a.mkv", "1"),
            sample_job(&catalog, "/media/b.mkv", "3"),
        ]);

        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        queue.export(file.path()).unwrap();

        let mut restored = Queue::new();
        let count = restored.merge(file.path(), &catalog).unwrap();
        assert_eq!(count, 2);
        assert_eq!(restored.jobs(), queue.jobs());
    }

    #[test]
    fn merge_appends_to_tail_without_dedup() {
        let catalog = PresetCatalog::builtin();
        let mut queue = Queue::new();
        queue.add(vec![sample_job(&catalog, "/media/a.mkv", "1")]);

        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        queue.export(file.path()).unwrap();

        // merging our own export duplicates the job at the tail
        queue.merge(file.path(), &catalog).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.jobs()[0], queue.jobs()[1]);
    }

    #[test]
    fn malformed_file_leaves_queue_untouched() {
        let catalog = PresetCatalog::builtin();
        let mut queue = Queue::new();
        queue.add(vec![sample_job(&catalog, "/media/a.mkv", "1")]);

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        use std::io::Write;
        write!(file, "{{not json").unwrap();

        let err = queue.merge(file.path(), &catalog).unwrap_err();
        assert!(matches!(err, QueueError::Malformed { .. }));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn unknown_preset_leaves_queue_untouched() {
        let catalog = PresetCatalog::builtin();
        let mut queue = Queue::new();
        queue.add(vec![sample_job(&catalog, "/media/a.mkv", "1")]);

        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        queue.export(file.path()).unwrap();

        let text = std::fs::read_to_string(file.path())
            .unwrap()
            .replace("\"preset_id\": \"1\"", "\"preset_id\": \"99\"");
        std::fs::write(file.path(), text).unwrap();

        let err = queue.merge(file.path(), &catalog).unwrap_err();
        assert!(matches!(err, QueueError::UnknownPreset { .. }));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let catalog = PresetCatalog::builtin();
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        use std::io::Write;
        write!(
            file,
            "{{\"version\": 7, \"exported_at\": \"2026-01-01T00:00:00Z\", \"jobs\": []}}"
        )
        .unwrap();

        let mut queue = Queue::new();
        let err = queue.merge(file.path(), &catalog).unwrap_err();
        assert!(matches!(err, QueueError::UnsupportedVersion { found: 7, .. }));
    }
}
