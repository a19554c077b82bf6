// src/pipeline/metrics.rs
//
// Stream counters. Cheap to clone; every clone shares the same atomics so
// the live producer and consumer report into one set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub frames_processed: Arc<AtomicU64>,
    pub frames_rejected: Arc<AtomicU64>,
    pub invalid_detections: Arc<AtomicU64>,
    pub suppressed_detections: Arc<AtomicU64>,
    pub tracks_created: Arc<AtomicU64>,
    pub tracks_evicted: Arc<AtomicU64>,
    pub contact_events: Arc<AtomicU64>,
    pub swing_events: Arc<AtomicU64>,
    pub np_swings: Arc<AtomicU64>,
    pub queue_drops: Arc<AtomicU64>,
    pub sampler_skips: Arc<AtomicU64>,
    pub sink_failures: Arc<AtomicU64>,
    pub frame_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            frames_processed: Arc::new(AtomicU64::new(0)),
            frames_rejected: Arc::new(AtomicU64::new(0)),
            invalid_detections: Arc::new(AtomicU64::new(0)),
            suppressed_detections: Arc::new(AtomicU64::new(0)),
            tracks_created: Arc::new(AtomicU64::new(0)),
            tracks_evicted: Arc::new(AtomicU64::new(0)),
            contact_events: Arc::new(AtomicU64::new(0)),
            swing_events: Arc::new(AtomicU64::new(0)),
            np_swings: Arc::new(AtomicU64::new(0)),
            queue_drops: Arc::new(AtomicU64::new(0)),
            sampler_skips: Arc::new(AtomicU64::new(0)),
            sink_failures: Arc::new(AtomicU64::new(0)),
            frame_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.frames_processed.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            fps: self.fps(),
            invalid_detections: self.invalid_detections.load(Ordering::Relaxed),
            suppressed_detections: self.suppressed_detections.load(Ordering::Relaxed),
            tracks_created: self.tracks_created.load(Ordering::Relaxed),
            tracks_evicted: self.tracks_evicted.load(Ordering::Relaxed),
            contact_events: self.contact_events.load(Ordering::Relaxed),
            swing_events: self.swing_events.load(Ordering::Relaxed),
            np_swings: self.np_swings.load(Ordering::Relaxed),
            queue_drops: self.queue_drops.load(Ordering::Relaxed),
            sampler_skips: self.sampler_skips.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            last_frame_us: self.frame_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub frames_processed: u64,
    pub frames_rejected: u64,
    pub fps: f64,
    pub invalid_detections: u64,
    pub suppressed_detections: u64,
    pub tracks_created: u64,
    pub tracks_evicted: u64,
    pub contact_events: u64,
    pub swing_events: u64,
    pub np_swings: u64,
    pub queue_drops: u64,
    pub sampler_skips: u64,
    pub sink_failures: u64,
    pub last_frame_us: u64,
    pub elapsed_secs: f64,
}
