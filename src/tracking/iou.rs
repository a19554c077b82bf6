// src/tracking/iou.rs
//
// IoU tracker ("SORT-lite", no motion model).
//
// Design:
//   - Tracks are visited in creation order; each takes the unclaimed
//     detection with the highest IoU against its last box
//   - A match needs IoU strictly above `iou_threshold`
//   - Unmatched tracks coast; eviction once misses exceed `max_age`
//   - Reported age is the number of successful matches, not elapsed frames

use super::{TrackPosition, TrackSnapshot, TrackState, TrackUpdate, Tracker};
use crate::types::{BBox, Detection, TrackId, TrackerStrategy};
use anyhow::{ensure, Result};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct IouTrack {
    id: TrackId,
    bbox: BBox,
    hits: u32,
    misses: u32,
}

impl IouTrack {
    fn snapshot(&self, state: TrackState) -> TrackSnapshot {
        TrackSnapshot {
            id: self.id,
            position: TrackPosition::Box(self.bbox),
            hits: self.hits,
            misses: self.misses,
            state,
        }
    }
}

pub struct IouTracker {
    tracks: Vec<IouTrack>,
    next_id: TrackId,
    iou_threshold: f32,
    max_age: u32,
}

impl IouTracker {
    pub fn new(iou_threshold: f32, max_age: u32) -> Result<Self> {
        ensure!(
            iou_threshold > 0.0 && iou_threshold <= 1.0,
            "iou_threshold must be in (0, 1], got {}",
            iou_threshold
        );
        Ok(Self {
            tracks: Vec::with_capacity(32),
            next_id: 0,
            iou_threshold,
            max_age,
        })
    }

    /// Age (successful match count) of a live track
    pub fn age(&self, id: TrackId) -> Option<u32> {
        self.tracks.iter().find(|t| t.id == id).map(|t| t.hits)
    }
}

impl Tracker for IouTracker {
    fn update(&mut self, detections: &[Detection]) -> TrackUpdate {
        let mut assignments: Vec<Option<TrackId>> = vec![None; detections.len()];
        let mut created = Vec::new();

        // ── MATCH EXISTING TRACKS (creation order) ──
        for track in &mut self.tracks {
            let mut best: Option<(usize, f32)> = None;
            for (di, det) in detections.iter().enumerate() {
                if assignments[di].is_some() {
                    continue;
                }
                let score = det.bbox.iou(&track.bbox);
                if score > best.map_or(0.0, |(_, s)| s) {
                    best = Some((di, score));
                }
            }

            match best {
                Some((di, score)) if score > self.iou_threshold => {
                    track.bbox = detections[di].bbox;
                    track.hits += 1;
                    track.misses = 0;
                    assignments[di] = Some(track.id);
                }
                _ => track.misses += 1,
            }
        }

        // ── UNMATCHED DETECTIONS → NEW TRACKS ──
        for (di, det) in detections.iter().enumerate() {
            if assignments[di].is_some() {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            self.tracks.push(IouTrack {
                id,
                bbox: det.bbox,
                hits: 0,
                misses: 0,
            });
            debug!(
                "🆕 IoU track T{} created: class={}, bbox=[{:.0},{:.0},{:.0},{:.0}]",
                id, det.class_id, det.bbox.x1, det.bbox.y1, det.bbox.x2, det.bbox.y2
            );
            assignments[di] = Some(id);
            created.push(id);
        }

        // ── PRUNE DEAD TRACKS ──
        let max_age = self.max_age;
        let mut evicted = Vec::new();
        self.tracks.retain(|t| {
            if t.misses > max_age {
                debug!("🗑️  IoU track T{} evicted (coasted {} frames)", t.id, t.misses);
                evicted.push(t.snapshot(TrackState::Evicted));
                false
            } else {
                true
            }
        });

        let tracks: BTreeMap<TrackId, TrackSnapshot> = self
            .tracks
            .iter()
            .map(|t| (t.id, t.snapshot(TrackState::Active)))
            .collect();

        TrackUpdate {
            tracks,
            assignments,
            evicted,
            created,
        }
    }

    fn reset(&mut self) {
        self.tracks.clear();
    }

    fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn strategy(&self) -> TrackerStrategy {
        TrackerStrategy::Iou
    }
}
