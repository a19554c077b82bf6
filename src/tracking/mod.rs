// src/tracking/mod.rs
//
// Multi-object identity tracking. Two interchangeable greedy strategies
// behind one trait; the strategy is chosen explicitly from config.
//
// Guarantees shared by both strategies:
//   - ids are assigned from a per-instance counter and never reused
//   - a track keeps its id while it keeps matching
//   - output is ordered by track id

pub mod centroid;
pub mod iou;

pub use centroid::CentroidTracker;
pub use iou::IouTracker;

use crate::types::{BBox, Detection, TrackId, TrackerConfig, TrackerStrategy};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackState {
    Active,
    Evicted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TrackPosition {
    Centroid { x: f32, y: f32 },
    Box(BBox),
}

/// Current state of one track as reported after an update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub position: TrackPosition,
    /// Successful matches since creation
    pub hits: u32,
    /// Consecutive frames without a match
    pub misses: u32,
    pub state: TrackState,
}

/// Result of one tracker step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackUpdate {
    /// Live tracks ordered by id
    pub tracks: BTreeMap<TrackId, TrackSnapshot>,
    /// Per input detection: the track that matched or was spawned from it
    pub assignments: Vec<Option<TrackId>>,
    /// Tracks retired on this frame, in id order
    pub evicted: Vec<TrackSnapshot>,
    /// Tracks spawned on this frame, in id order
    pub created: Vec<TrackId>,
}

/// Per-frame identity tracker. Call `update` exactly once per frame.
pub trait Tracker: Send {
    fn update(&mut self, detections: &[Detection]) -> TrackUpdate;

    /// Clear all tracks. The id counter keeps running so ids stay unique.
    fn reset(&mut self);

    fn track_count(&self) -> usize;

    fn strategy(&self) -> TrackerStrategy;
}

pub fn build_tracker(config: &TrackerConfig) -> Result<Box<dyn Tracker>> {
    let tracker: Box<dyn Tracker> = match config.strategy {
        TrackerStrategy::Centroid => Box::new(CentroidTracker::new(config.max_disappeared)),
        TrackerStrategy::Iou => Box::new(IouTracker::new(config.iou_threshold, config.max_age)?),
    };
    Ok(tracker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection::new(BBox::new(x1, y1, x2, y2), 0.9, 0)
    }

    /// Pseudo-random but reproducible detection sets
    fn scripted_frames() -> Vec<Vec<Detection>> {
        let mut frames = Vec::new();
        let mut seed: u32 = 7;
        for _ in 0..120 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let count = (seed >> 16) % 4;
            let mut dets = Vec::new();
            for k in 0..count {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let x = ((seed >> 16) % 400) as f32 + k as f32 * 3.0;
                dets.push(det(x, x * 0.5, x + 40.0, x * 0.5 + 40.0));
            }
            frames.push(dets);
        }
        frames
    }

    fn check_ids_never_reused(mut tracker: Box<dyn Tracker>) {
        let mut max_seen: Option<TrackId> = None;
        let mut retired = std::collections::HashSet::new();

        for dets in scripted_frames() {
            let update = tracker.update(&dets);

            for id in &update.created {
                if let Some(m) = max_seen {
                    assert!(*id > m, "new id {} not above previous max {}", id, m);
                }
                max_seen = Some(*id);
            }
            for snap in &update.evicted {
                assert_eq!(snap.state, TrackState::Evicted);
                retired.insert(snap.id);
            }
            for id in update.tracks.keys() {
                assert!(!retired.contains(id), "evicted id {} came back", id);
            }
            let ids: Vec<_> = update.tracks.keys().copied().collect();
            let mut sorted = ids.clone();
            sorted.sort_unstable();
            assert_eq!(ids, sorted);
        }
    }

    #[test]
    fn test_centroid_ids_strictly_increasing_never_reused() {
        let cfg = TrackerConfig {
            strategy: TrackerStrategy::Centroid,
            max_disappeared: 2,
            ..TrackerConfig::default()
        };
        check_ids_never_reused(build_tracker(&cfg).unwrap());
    }

    #[test]
    fn test_iou_ids_strictly_increasing_never_reused() {
        let cfg = TrackerConfig {
            strategy: TrackerStrategy::Iou,
            max_age: 1,
            ..TrackerConfig::default()
        };
        check_ids_never_reused(build_tracker(&cfg).unwrap());
    }

    #[test]
    fn test_build_tracker_respects_strategy() {
        let mut cfg = TrackerConfig::default();
        cfg.strategy = TrackerStrategy::Centroid;
        assert_eq!(build_tracker(&cfg).unwrap().strategy(), TrackerStrategy::Centroid);
        cfg.strategy = TrackerStrategy::Iou;
        assert_eq!(build_tracker(&cfg).unwrap().strategy(), TrackerStrategy::Iou);
    }

    #[test]
    fn test_build_tracker_rejects_bad_threshold() {
        let cfg = TrackerConfig {
            iou_threshold: 0.0,
            ..TrackerConfig::default()
        };
        assert!(build_tracker(&cfg).is_err());
    }
}
