// src/events/contact.rs
//
// Bat–ball contact from bounding-box overlap. Pure and per-frame: every
// (ball, bat) pair whose IoU exceeds the threshold yields its own event.
// Simultaneous contacts are not deduplicated.

use crate::aggregator::FrameRecord;
use crate::types::{ContactConfig, Detection, Event, EventKind};
use anyhow::{ensure, Result};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::info;

pub struct ContactDetector {
    config: ContactConfig,
}

impl ContactDetector {
    pub fn new(config: ContactConfig) -> Result<Self> {
        ensure!(
            config.iou_threshold > 0.0 && config.iou_threshold <= 1.0,
            "contact iou_threshold must be in (0, 1], got {}",
            config.iou_threshold
        );
        ensure!(
            config.ball_class_id != config.bat_class_id,
            "ball and bat class ids must differ"
        );
        Ok(Self { config })
    }

    /// Contact events for a single frame's detections.
    pub fn detect(&self, frame_id: u64, detections: &[Detection]) -> Vec<Event> {
        let balls = detections
            .iter()
            .filter(|d| d.class_id == self.config.ball_class_id);

        let mut events = Vec::new();
        for ball in balls {
            for bat in detections
                .iter()
                .filter(|d| d.class_id == self.config.bat_class_id)
            {
                let overlap = ball.bbox.iou(&bat.bbox);
                if overlap <= self.config.iou_threshold {
                    continue;
                }

                info!(
                    "🏏 Contact at frame {}: IoU={:.3}, ball={:?}, bat={:?}",
                    frame_id, overlap, ball.track_id, bat.track_id
                );

                let mut metadata = BTreeMap::new();
                metadata.insert("iou".to_string(), json!(overlap));
                metadata.insert("ball_track".to_string(), json!(ball.track_id));
                metadata.insert("bat_track".to_string(), json!(bat.track_id));

                events.push(Event {
                    kind: EventKind::Contact,
                    frame_start: frame_id,
                    frame_end: frame_id,
                    metadata,
                });
            }
        }
        events
    }

    /// Contact events over an already aggregated stream, in record order.
    pub fn scan<'a, I>(&self, records: I) -> Vec<Event>
    where
        I: IntoIterator<Item = &'a FrameRecord>,
    {
        records
            .into_iter()
            .flat_map(|r| self.detect(r.frame_id, &r.detections))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::FrameAggregator;
    use crate::types::BBox;
    use chrono::Utc;

    fn ball(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection::new(BBox::new(x1, y1, x2, y2), 0.9, 0)
    }

    fn bat(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection::new(BBox::new(x1, y1, x2, y2), 0.9, 1)
    }

    fn detector() -> ContactDetector {
        ContactDetector::new(ContactConfig::default()).unwrap()
    }

    #[test]
    fn test_partial_overlap_below_threshold() {
        // IoU ≈ 0.143
        let events = detector().detect(0, &[ball(0.0, 0.0, 10.0, 10.0), bat(5.0, 5.0, 15.0, 15.0)]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_contained_ball_emits_contact() {
        // IoU = 36 / 100 = 0.36
        let events = detector().detect(7, &[ball(0.0, 0.0, 10.0, 10.0), bat(2.0, 2.0, 8.0, 8.0)]);
        assert_eq!(events.len(), 1);

        let ev = &events[0];
        assert_eq!(ev.kind, EventKind::Contact);
        assert_eq!((ev.frame_start, ev.frame_end), (7, 7));
        let iou = ev.metadata["iou"].as_f64().unwrap();
        assert!((iou - 0.36).abs() < 1e-4);
        assert!(ev.metadata["ball_track"].is_null());
    }

    #[test]
    fn test_track_ids_in_metadata() {
        let mut b = ball(0.0, 0.0, 10.0, 10.0);
        b.track_id = Some(4);
        let mut t = bat(1.0, 1.0, 9.0, 9.0);
        t.track_id = Some(9);

        let events = detector().detect(1, &[b, t]);
        assert_eq!(events[0].metadata["ball_track"], json!(4));
        assert_eq!(events[0].metadata["bat_track"], json!(9));
    }

    #[test]
    fn test_multiple_contacts_not_deduplicated() {
        let dets = vec![
            ball(0.0, 0.0, 10.0, 10.0),
            ball(1.0, 1.0, 11.0, 11.0),
            bat(0.0, 0.0, 10.0, 10.0),
        ];
        assert_eq!(detector().detect(0, &dets).len(), 2);
    }

    #[test]
    fn test_same_class_pairs_ignored() {
        let dets = vec![ball(0.0, 0.0, 10.0, 10.0), ball(0.0, 0.0, 10.0, 10.0)];
        assert!(detector().detect(0, &dets).is_empty());
    }

    #[test]
    fn test_scan_over_aggregated_stream() {
        let mut agg = FrameAggregator::new();
        let now = Utc::now();
        agg.add_frame(0, vec![ball(0.0, 0.0, 10.0, 10.0)], vec![], vec![], now);
        agg.add_frame(
            1,
            vec![ball(0.0, 0.0, 10.0, 10.0), bat(2.0, 2.0, 8.0, 8.0)],
            vec![],
            vec![],
            now,
        );
        agg.add_frame(2, vec![bat(2.0, 2.0, 8.0, 8.0)], vec![], vec![], now);

        let events = detector().scan(&agg);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].frame_start, 1);
    }

    #[test]
    fn test_rejects_same_class_ids() {
        let cfg = ContactConfig {
            ball_class_id: 1,
            bat_class_id: 1,
            ..ContactConfig::default()
        };
        assert!(ContactDetector::new(cfg).is_err());
    }
}
