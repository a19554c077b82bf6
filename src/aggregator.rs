// src/aggregator.rs
//
// Append-only time series of per-frame results. Records are immutable once
// appended. Order is append order: the aggregator trusts the caller to hand
// it monotonically increasing frame ids and never sorts or deduplicates.

use crate::types::{Detection, Keypoint, OcrField};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_id: u64,
    pub timestamp: DateTime<Utc>,
    pub detections: Vec<Detection>,
    pub pose: Vec<Keypoint>,
    pub ocr: Vec<OcrField>,
}

impl FrameRecord {
    pub fn detections_of_class(&self, class_id: u32) -> impl Iterator<Item = &Detection> {
        self.detections.iter().filter(move |d| d.class_id == class_id)
    }
}

/// Single-writer store for one logical stream.
#[derive(Debug, Default)]
pub struct FrameAggregator {
    frames: Vec<FrameRecord>,
}

impl FrameAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
        }
    }

    /// Build and append one record, returning a shared view of it.
    pub fn add_frame(
        &mut self,
        frame_id: u64,
        detections: Vec<Detection>,
        pose: Vec<Keypoint>,
        ocr: Vec<OcrField>,
        timestamp: DateTime<Utc>,
    ) -> &FrameRecord {
        self.frames.push(FrameRecord {
            frame_id,
            timestamp,
            detections,
            pose,
            ocr,
        });
        &self.frames[self.frames.len() - 1]
    }

    /// Restartable view over every record in append order.
    pub fn iter(&self) -> std::slice::Iter<'_, FrameRecord> {
        self.frames.iter()
    }

    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn last(&self) -> Option<&FrameRecord> {
        self.frames.last()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Hand the accumulated records to an owner (export, ingest).
    pub fn into_frames(self) -> Vec<FrameRecord> {
        self.frames
    }
}

impl<'a> IntoIterator for &'a FrameAggregator {
    type Item = &'a FrameRecord;
    type IntoIter = std::slice::Iter<'a, FrameRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BBox;
    use chrono::TimeZone;

    fn ts(frame: u64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + frame as i64 * 33)
            .unwrap()
    }

    fn sample_frame(agg: &mut FrameAggregator, frame_id: u64) {
        let mut det = Detection::new(
            BBox::new(frame_id as f32, 1.5, frame_id as f32 + 10.25, 12.0),
            0.75,
            (frame_id % 3) as u32,
        );
        det.track_id = Some(frame_id / 2);
        agg.add_frame(
            frame_id,
            vec![det],
            vec![Keypoint {
                name: "RIGHT_WRIST".into(),
                x: 100.0 + frame_id as f32,
                y: 200.5,
                z: -0.25,
                visibility: 0.9,
            }],
            vec![OcrField {
                region: "score".into(),
                text: format!("{}-0", frame_id),
            }],
            ts(frame_id),
        );
    }

    #[test]
    fn test_iteration_preserves_append_order() {
        let mut agg = FrameAggregator::new();
        for id in 0..20 {
            sample_frame(&mut agg, id);
        }
        let ids: Vec<u64> = agg.iter().map(|f| f.frame_id).collect();
        assert_eq!(ids, (0..20).collect::<Vec<_>>());

        // Re-iterable: a second pass sees the same sequence
        let again: Vec<u64> = (&agg).into_iter().map(|f| f.frame_id).collect();
        assert_eq!(ids, again);
    }

    #[test]
    fn test_serde_round_trip_preserves_records() {
        let mut agg = FrameAggregator::new();
        for id in 0..8 {
            sample_frame(&mut agg, id);
        }

        let json = serde_json::to_string(agg.frames()).unwrap();
        let decoded: Vec<FrameRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.as_slice(), agg.frames());
    }

    #[test]
    fn test_does_not_reorder_caller_input() {
        let mut agg = FrameAggregator::new();
        sample_frame(&mut agg, 5);
        sample_frame(&mut agg, 3);
        let ids: Vec<u64> = agg.iter().map(|f| f.frame_id).collect();
        assert_eq!(ids, vec![5, 3]);
    }

    #[test]
    fn test_add_frame_returns_appended_record() {
        let mut agg = FrameAggregator::with_capacity(4);
        let rec = agg.add_frame(42, Vec::new(), Vec::new(), Vec::new(), ts(42));
        assert_eq!(rec.frame_id, 42);
        assert!(rec.detections.is_empty());
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.last().map(|f| f.frame_id), Some(42));
    }

    #[test]
    fn test_detections_of_class() {
        let mut agg = FrameAggregator::new();
        agg.add_frame(
            0,
            vec![
                Detection::new(BBox::new(0.0, 0.0, 1.0, 1.0), 0.9, 0),
                Detection::new(BBox::new(0.0, 0.0, 2.0, 2.0), 0.9, 1),
                Detection::new(BBox::new(0.0, 0.0, 3.0, 3.0), 0.9, 0),
            ],
            Vec::new(),
            Vec::new(),
            ts(0),
        );
        assert_eq!(agg.frames()[0].detections_of_class(0).count(), 2);
    }
}
