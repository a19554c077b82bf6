// src/lib.rs
//
// Identity tracking and game-event derivation over per-frame detection,
// pose and OCR streams from a batting video.

pub mod aggregator;
pub mod config;
pub mod events;
pub mod export;
pub mod normalizer;
pub mod pipeline;
pub mod tracking;
pub mod types;

pub use aggregator::{FrameAggregator, FrameRecord};
pub use events::{ContactDetector, SwingDetector, SwingEvent};
pub use normalizer::Normalizer;
pub use pipeline::{FrameOutcome, PipelineCoordinator};
pub use tracking::{build_tracker, Tracker, TrackSnapshot, TrackUpdate};
pub use types::{
    BBox, Config, Detection, Event, EventKind, FrameInput, Keypoint, OcrField, TrackId,
    TrackerStrategy,
};
