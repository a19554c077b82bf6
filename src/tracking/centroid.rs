// src/tracking/centroid.rs
//
// Centroid-distance tracker.
//
// Matching is greedy, not globally optimal:
//   1. distance matrix between live track centroids (rows) and new centroids
//   2. rows ordered by their minimum distance, ascending; ties keep creation order
//   3. each row in that order claims its nearest still-unclaimed column
// Unclaimed columns spawn tracks. Unmatched tracks accrue a miss and are
// evicted once misses exceed `max_disappeared`.

use super::{TrackPosition, TrackSnapshot, TrackState, TrackUpdate, Tracker};
use crate::types::{Detection, TrackId, TrackerStrategy};
use tracing::debug;

#[derive(Debug, Clone)]
struct CentroidTrack {
    id: TrackId,
    x: f32,
    y: f32,
    hits: u32,
    misses: u32,
}

impl CentroidTrack {
    fn snapshot(&self, state: TrackState) -> TrackSnapshot {
        TrackSnapshot {
            id: self.id,
            position: TrackPosition::Centroid {
                x: self.x,
                y: self.y,
            },
            hits: self.hits,
            misses: self.misses,
            state,
        }
    }

    fn distance_to(&self, (x, y): (f32, f32)) -> f32 {
        (self.x - x).hypot(self.y - y)
    }
}

pub struct CentroidTracker {
    // Always in creation (= id) order
    tracks: Vec<CentroidTrack>,
    next_id: TrackId,
    max_disappeared: u32,
}

impl CentroidTracker {
    pub fn new(max_disappeared: u32) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 0,
            max_disappeared,
        }
    }

    fn register(&mut self, centroid: (f32, f32)) -> TrackId {
        let id = self.next_id;
        self.next_id += 1;
        self.tracks.push(CentroidTrack {
            id,
            x: centroid.0,
            y: centroid.1,
            hits: 0,
            misses: 0,
        });
        debug!(
            "🆕 Centroid track T{} at ({:.1}, {:.1})",
            id, centroid.0, centroid.1
        );
        id
    }

    /// Greedy row-by-row assignment. Returns, per track index, the claimed
    /// column.
    fn assign(&self, centroids: &[(f32, f32)]) -> Vec<Option<usize>> {
        let distances: Vec<Vec<f32>> = self
            .tracks
            .iter()
            .map(|t| centroids.iter().map(|c| t.distance_to(*c)).collect())
            .collect();

        let mut rows: Vec<(usize, f32)> = distances
            .iter()
            .enumerate()
            .map(|(ti, row)| (ti, row.iter().copied().fold(f32::INFINITY, f32::min)))
            .collect();
        // sort_by is stable, so equal minima keep creation order
        rows.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut claimed = vec![false; centroids.len()];
        let mut result = vec![None; self.tracks.len()];

        for (ti, _) in rows {
            let mut best: Option<(usize, f32)> = None;
            for (ci, &d) in distances[ti].iter().enumerate() {
                if claimed[ci] {
                    continue;
                }
                if best.map_or(true, |(_, bd)| d < bd) {
                    best = Some((ci, d));
                }
            }
            if let Some((ci, _)) = best {
                claimed[ci] = true;
                result[ti] = Some(ci);
            }
        }

        result
    }

    fn evict_stale(&mut self) -> Vec<TrackSnapshot> {
        let max = self.max_disappeared;
        let mut evicted = Vec::new();
        self.tracks.retain(|t| {
            if t.misses > max {
                debug!("🗑️  Centroid track T{} evicted after {} misses", t.id, t.misses);
                evicted.push(t.snapshot(TrackState::Evicted));
                false
            } else {
                true
            }
        });
        evicted
    }

    fn live_snapshots(&self) -> std::collections::BTreeMap<TrackId, TrackSnapshot> {
        self.tracks
            .iter()
            .map(|t| (t.id, t.snapshot(TrackState::Active)))
            .collect()
    }
}

impl Tracker for CentroidTracker {
    fn update(&mut self, detections: &[Detection]) -> TrackUpdate {
        let mut assignments = vec![None; detections.len()];
        let mut created = Vec::new();

        if detections.is_empty() {
            for track in &mut self.tracks {
                track.misses += 1;
            }
        } else {
            let centroids: Vec<(f32, f32)> = detections.iter().map(|d| d.bbox.center()).collect();

            let claims = self.assign(&centroids);

            for (ti, claim) in claims.iter().enumerate() {
                let track = &mut self.tracks[ti];
                match claim {
                    Some(ci) => {
                        let (x, y) = centroids[*ci];
                        track.x = x;
                        track.y = y;
                        track.hits += 1;
                        track.misses = 0;
                        assignments[*ci] = Some(track.id);
                    }
                    None => track.misses += 1,
                }
            }

            for (ci, centroid) in centroids.iter().enumerate() {
                if assignments[ci].is_none() {
                    let id = self.register(*centroid);
                    assignments[ci] = Some(id);
                    created.push(id);
                }
            }
        }

        let evicted = self.evict_stale();

        TrackUpdate {
            tracks: self.live_snapshots(),
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
        TrackerStrategy::Centroid
    }
}
