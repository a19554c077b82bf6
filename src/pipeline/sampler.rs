// src/pipeline/sampler.rs
//
// Downsamples a stream to a target rate using frame timestamps. A frame is
// kept when at least 1/target_fps seconds have passed since the last kept
// frame; the first frame is always kept.

use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};

pub struct FrameSampler {
    interval_ms: f64,
    last_kept: Option<DateTime<Utc>>,
    skipped: u64,
}

impl FrameSampler {
    pub fn new(target_fps: f64) -> Result<Self> {
        ensure!(
            target_fps.is_finite() && target_fps > 0.0,
            "sample fps must be positive, got {}",
            target_fps
        );
        Ok(Self {
            interval_ms: 1000.0 / target_fps,
            last_kept: None,
            skipped: 0,
        })
    }

    pub fn should_keep(&mut self, timestamp: DateTime<Utc>) -> bool {
        let keep = match self.last_kept {
            None => true,
            Some(prev) => {
                let elapsed_ms =
                    (timestamp - prev).num_microseconds().unwrap_or(i64::MAX) as f64 / 1000.0;
                elapsed_ms >= self.interval_ms
            }
        };

        if keep {
            self.last_kept = Some(timestamp);
        } else {
            self.skipped += 1;
        }
        keep
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
