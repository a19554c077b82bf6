// src/pipeline/perception.rs
//
// Optional perception capabilities. Model loading and inference live
// outside this crate; callers plug in whatever they have. A missing
// capability contributes an empty result for every frame.

use crate::types::{Detection, FrameInput, Keypoint, OcrField};
use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::warn;

/// Decoded frame handed to perception. Pixel layout is agreed between the
/// caller and its models; the pipeline never inspects it.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub frame_id: u64,
    pub timestamp: Option<DateTime<Utc>>,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub trait ObjectDetector: Send {
    fn detect(&mut self, frame: &RawFrame) -> Result<Vec<Detection>>;
}

pub trait PoseEstimator: Send {
    fn estimate(&mut self, frame: &RawFrame) -> Result<Vec<Keypoint>>;
}

pub trait TextReader: Send {
    fn read(&mut self, frame: &RawFrame) -> Result<Vec<OcrField>>;
}

#[derive(Default)]
pub struct Perception {
    detector: Option<Box<dyn ObjectDetector>>,
    pose: Option<Box<dyn PoseEstimator>>,
    ocr: Option<Box<dyn TextReader>>,
}

impl Perception {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detector(mut self, detector: Box<dyn ObjectDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_pose(mut self, pose: Box<dyn PoseEstimator>) -> Self {
        self.pose = Some(pose);
        self
    }

    pub fn with_ocr(mut self, ocr: Box<dyn TextReader>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    pub fn has_pose(&self) -> bool {
        self.pose.is_some()
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    /// Run every present capability. A capability that fails on this frame
    /// is logged and treated as absent for it.
    pub fn run(&mut self, frame: &RawFrame) -> FrameInput {
        let detections = match self.detector.as_mut() {
            Some(d) => d.detect(frame).unwrap_or_else(|e| {
                warn!("Object detection failed on frame {}: {:#}", frame.frame_id, e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let pose = match self.pose.as_mut() {
            Some(p) => p.estimate(frame).unwrap_or_else(|e| {
                warn!("Pose estimation failed on frame {}: {:#}", frame.frame_id, e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let ocr = match self.ocr.as_mut() {
            Some(r) => r.read(frame).unwrap_or_else(|e| {
                warn!("OCR failed on frame {}: {:#}", frame.frame_id, e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        FrameInput {
            frame_id: frame.frame_id,
            timestamp: frame.timestamp,
            detections,
            pose,
            ocr,
        }
    }
}
