// src/events/swing.rs
//
// Bat-swing detection from wrist velocity.
//
// Wrist selection per frame:
//   primary wrist if present with visibility >= threshold
//   else fallback wrist if present
//   else previous frame's position (origin before the first sighting)
//
// Velocity at sample i = |p_i - p_{i-1}| * fps / (frame_i - frame_{i-1}) in
// px/s; the first sample is 0.
//
// State machine:
//   Idle    → InSwing  velocity > velocity_threshold
//   InSwing → Idle     velocity < 0.3 * velocity_threshold, or flush at end of input
// Each InSwing → Idle transition emits exactly one SwingEvent.

use crate::aggregator::FrameRecord;
use crate::types::{Event, EventKind, Keypoint, SwingConfig};
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Fraction of the start threshold below which a swing closes
const SWING_END_RATIO: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingEvent {
    pub start_frame: u64,
    pub end_frame: u64,
    pub duration_ms: f64,
    pub peak_velocity: f64,
    /// Duration outside the plausible swing window (non-pitch / no swing)
    pub np_flag: bool,
}

impl SwingEvent {
    pub fn to_event(&self) -> Event {
        let mut metadata = BTreeMap::new();
        metadata.insert("duration_ms".to_string(), json!(self.duration_ms));
        metadata.insert("peak_velocity".to_string(), json!(self.peak_velocity));
        metadata.insert("np_flag".to_string(), json!(self.np_flag));
        Event {
            kind: EventKind::Swing,
            frame_start: self.start_frame,
            frame_end: self.end_frame,
            metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwingState {
    Idle,
    InSwing { start_frame: u64, peak_velocity: f64 },
}

pub struct SwingDetector {
    config: SwingConfig,
    state: SwingState,
    last_position: Option<(f32, f32)>,
    last_frame: Option<u64>,
}

impl SwingDetector {
    pub fn new(config: SwingConfig) -> Result<Self> {
        ensure!(config.fps > 0.0, "swing fps must be positive, got {}", config.fps);
        ensure!(
            config.velocity_threshold > 0.0,
            "velocity_threshold must be positive, got {}",
            config.velocity_threshold
        );
        ensure!(
            config.min_duration_ms <= config.max_duration_ms,
            "min_duration_ms {} exceeds max_duration_ms {}",
            config.min_duration_ms,
            config.max_duration_ms
        );
        Ok(Self {
            config,
            state: SwingState::Idle,
            last_position: None,
            last_frame: None,
        })
    }

    pub fn state(&self) -> SwingState {
        self.state
    }

    pub fn in_swing(&self) -> bool {
        matches!(self.state, SwingState::InSwing { .. })
    }

    /// Pick the wrist position for one frame, carrying the previous one
    /// forward when neither wrist is usable.
    fn wrist_position(&self, keypoints: &[Keypoint]) -> (f32, f32) {
        let primary = keypoints
            .iter()
            .find(|k| k.name == self.config.primary_wrist)
            .filter(|k| k.visibility >= self.config.visibility_threshold);

        let chosen = primary.or_else(|| {
            keypoints
                .iter()
                .find(|k| k.name == self.config.fallback_wrist)
        });

        match chosen {
            Some(k) => (k.x, k.y),
            None => self.last_position.unwrap_or((0.0, 0.0)),
        }
    }

    /// Feed one frame. Returns a swing when this frame closes one.
    pub fn push(&mut self, frame: u64, keypoints: &[Keypoint]) -> Option<SwingEvent> {
        let position = self.wrist_position(keypoints);

        // Displacement is spread over the frame-id gap so dropped or
        // sampled-out frames do not inflate the speed.
        let velocity = match (self.last_position, self.last_frame) {
            (Some((px, py)), Some(last_frame)) => {
                let dx = (position.0 - px) as f64;
                let dy = (position.1 - py) as f64;
                let gap = frame.saturating_sub(last_frame).max(1) as f64;
                dx.hypot(dy) * self.config.fps / gap
            }
            _ => 0.0,
        };
        self.last_position = Some(position);
        self.last_frame = Some(frame);

        match self.state {
            SwingState::Idle => {
                if velocity > self.config.velocity_threshold {
                    debug!("Swing opened at frame {} ({:.0} px/s)", frame, velocity);
                    self.state = SwingState::InSwing {
                        start_frame: frame,
                        peak_velocity: velocity,
                    };
                }
                None
            }
            SwingState::InSwing {
                start_frame,
                peak_velocity,
            } => {
                let peak_velocity = peak_velocity.max(velocity);
                if velocity < self.config.velocity_threshold * SWING_END_RATIO {
                    self.state = SwingState::Idle;
                    Some(self.close(start_frame, frame, peak_velocity))
                } else {
                    self.state = SwingState::InSwing {
                        start_frame,
                        peak_velocity,
                    };
                    None
                }
            }
        }
    }

    /// Force-close an in-progress swing at the last frame seen.
    pub fn flush(&mut self) -> Option<SwingEvent> {
        match (self.state, self.last_frame) {
            (
                SwingState::InSwing {
                    start_frame,
                    peak_velocity,
                },
                Some(end_frame),
            ) => {
                self.state = SwingState::Idle;
                debug!("Flushing open swing from frame {}", start_frame);
                Some(self.close(start_frame, end_frame, peak_velocity))
            }
            _ => None,
        }
    }

    fn close(&self, start_frame: u64, end_frame: u64, peak_velocity: f64) -> SwingEvent {
        let duration_ms = end_frame.saturating_sub(start_frame) as f64 * 1000.0 / self.config.fps;
        let np_flag =
            !(self.config.min_duration_ms..=self.config.max_duration_ms).contains(&duration_ms);

        info!(
            "🏏 Swing frames {}-{}: {:.0} ms, peak {:.0} px/s{}",
            start_frame,
            end_frame,
            duration_ms,
            peak_velocity,
            if np_flag { " [NP]" } else { "" }
        );

        SwingEvent {
            start_frame,
            end_frame,
            duration_ms,
            peak_velocity,
            np_flag,
        }
    }

    /// Run over a materialized sequence, using sequence indices as frame
    /// numbers. Any swing still open at the end is flushed.
    pub fn analyze(&mut self, frames_keypoints: &[Vec<Keypoint>]) -> Vec<SwingEvent> {
        let mut events: Vec<SwingEvent> = frames_keypoints
            .iter()
            .enumerate()
            .filter_map(|(i, kps)| self.push(i as u64, kps))
            .collect();
        events.extend(self.flush());
        events
    }

    /// Same as `analyze`, over aggregated records keyed by their frame ids.
    pub fn analyze_records<'a, I>(&mut self, records: I) -> Vec<SwingEvent>
    where
        I: IntoIterator<Item = &'a FrameRecord>,
    {
        let mut events: Vec<SwingEvent> = records
            .into_iter()
            .filter_map(|r| self.push(r.frame_id, &r.pose))
            .collect();
        events.extend(self.flush());
        events
    }
}
