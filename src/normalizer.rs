// src/normalizer.rs
//
// Validates raw detections and removes duplicates with greedy NMS before
// they reach the tracker. Malformed boxes and out-of-range confidences are
// dropped here and only counted, never propagated as failures.

use crate::types::{Detection, Keypoint, NormalizerConfig};
use anyhow::{ensure, Result};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    /// Rejected for a malformed bbox or confidence outside [0, 1]
    pub invalid: usize,
    /// Removed by non-max suppression
    pub suppressed: usize,
}

pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Result<Self> {
        ensure!(
            config.nms_iou_threshold > 0.0 && config.nms_iou_threshold <= 1.0,
            "nms_iou_threshold must be in (0, 1], got {}",
            config.nms_iou_threshold
        );
        Ok(Self { config })
    }

    /// Drop invalid detections, then suppress overlaps. Output is ordered by
    /// descending confidence.
    pub fn normalize(&self, detections: Vec<Detection>) -> (Vec<Detection>, NormalizeStats) {
        let mut stats = NormalizeStats::default();

        let valid: Vec<Detection> = detections
            .into_iter()
            .filter(|d| {
                let ok = d.bbox.is_well_formed() && (0.0..=1.0).contains(&d.confidence);
                if !ok {
                    warn!(
                        "Dropping invalid detection: class={}, conf={}, bbox=[{},{},{},{}]",
                        d.class_id, d.confidence, d.bbox.x1, d.bbox.y1, d.bbox.x2, d.bbox.y2
                    );
                    stats.invalid += 1;
                }
                ok
            })
            .collect();

        let before = valid.len();
        let kept = nms(valid, self.config.nms_iou_threshold, self.config.class_aware);
        stats.suppressed = before - kept.len();

        if stats.suppressed > 0 {
            debug!("NMS suppressed {} of {} detections", stats.suppressed, before);
        }

        (kept, stats)
    }
}

/// Greedy non-max suppression. A detection is discarded when its IoU with an
/// already kept detection is strictly greater than `iou_threshold`.
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32, class_aware: bool) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    // Stable sort keeps input order among equal confidences
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());

    for det in detections {
        let overlapped = keep.iter().any(|k| {
            (!class_aware || k.class_id == det.class_id) && k.bbox.iou(&det.bbox) > iou_threshold
        });
        if !overlapped {
            keep.push(det);
        }
    }

    keep
}

/// Clamp keypoint visibility into [0, 1] and drop points with non-finite
/// coordinates.
pub fn sanitize_keypoints(keypoints: Vec<Keypoint>) -> Vec<Keypoint> {
    keypoints
        .into_iter()
        .filter(|k| k.x.is_finite() && k.y.is_finite() && k.z.is_finite())
        .map(|mut k| {
            k.visibility = if k.visibility.is_finite() {
                k.visibility.clamp(0.0, 1.0)
            } else {
                0.0
            };
            k
        })
        .collect()
}
