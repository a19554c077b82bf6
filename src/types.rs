// src/types.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub normalizer: NormalizerConfig,
    pub tracker: TrackerConfig,
    pub contact: ContactConfig,
    pub swing: SwingConfig,
    pub live: LiveConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Detections overlapping a kept one by more than this IoU are suppressed
    pub nms_iou_threshold: f32,
    /// Only suppress overlaps between detections of the same class
    pub class_aware: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            nms_iou_threshold: 0.5,
            class_aware: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerStrategy {
    Centroid,
    Iou,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub strategy: TrackerStrategy,
    /// Centroid strategy: frames of absence tolerated before eviction
    pub max_disappeared: u32,
    /// IoU strategy: minimum overlap (exclusive) to continue a track
    pub iou_threshold: f32,
    /// IoU strategy: consecutive misses tolerated before eviction
    pub max_age: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            strategy: TrackerStrategy::Iou,
            max_disappeared: 20,
            iou_threshold: 0.3,
            max_age: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    pub iou_threshold: f32,
    pub ball_class_id: u32,
    pub bat_class_id: u32,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.2,
            ball_class_id: 0,
            bat_class_id: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwingConfig {
    pub fps: f64,
    /// Wrist speed (px/s) that opens a swing
    pub velocity_threshold: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    /// Minimum visibility for the primary wrist to be trusted
    pub visibility_threshold: f32,
    pub primary_wrist: String,
    pub fallback_wrist: String,
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            velocity_threshold: 800.0,
            min_duration_ms: 120.0,
            max_duration_ms: 500.0,
            visibility_threshold: 0.3,
            primary_wrist: "RIGHT_WRIST".to_string(),
            fallback_wrist: "LEFT_WRIST".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub queue_capacity: usize,
    pub poll_timeout_ms: u64,
    /// Downsample the incoming stream to this rate when set
    pub sample_fps: Option<f64>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            poll_timeout_ms: 500,
            sample_fps: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// Axis-aligned box in pixels. Serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// x2 > x1, y2 > y1 and every coordinate finite
    pub fn is_well_formed(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
            && self.x2 > self.x1
            && self.y2 > self.y1
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) * 0.5, (self.y1 + self.y2) * 0.5)
    }

    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if inter <= 0.0 {
            return 0.0;
        }

        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

// ============================================================================
// PERCEPTION INPUTS
// ============================================================================

pub type TrackId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
    pub class_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<TrackId>,
}

impl Detection {
    pub fn new(bbox: BBox, confidence: f32, class_id: u32) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
            track_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub name: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    pub visibility: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrField {
    pub region: String,
    pub text: String,
}

/// One frame as delivered by the perception collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    pub frame_id: u64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub pose: Vec<Keypoint>,
    #[serde(default)]
    pub ocr: Vec<OcrField>,
}

impl FrameInput {
    pub fn new(frame_id: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            frame_id,
            timestamp: Some(timestamp),
            detections: Vec::new(),
            pose: Vec::new(),
            ocr: Vec::new(),
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Contact,
    Swing,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Swing => "swing",
        }
    }
}

/// A derived game event. Created once by a detector, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub frame_start: u64,
    pub frame_end: u64,
    pub metadata: BTreeMap<String, serde_json::Value>,
}
