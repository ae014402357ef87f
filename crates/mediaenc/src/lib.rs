pub mod audio;
pub mod bench;
pub mod command;
pub mod config;
pub mod crop;
pub mod executor;
pub mod ffprobe;
pub mod job;
pub mod presets;
pub mod quality;
pub mod runner;
pub mod toolchain;
pub mod tracks;

pub use audio::{AudioAction, AudioMode};
pub use bench::{BenchmarkEngine, BenchmarkResult};
pub use config::EncoderConfig;
pub use crop::{CropDetector, CropSpec};
pub use executor::{EncodeStats, Executor};
pub use ffprobe::{ProbeData, ProbeStream};
pub use job::{Job, Queue, QueueError};
pub use presets::{Preset, PresetCatalog, PresetKind};
pub use quality::Metric;
pub use runner::{JobRunner, PipedRunner, RunOutcome};
pub use toolchain::Toolchain;
pub use tracks::{TrackChoice, TrackKind, TrackSelection};
