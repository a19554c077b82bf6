// src/config.rs

use crate::types::Config;
use anyhow::{ensure, Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
        let config: Config =
            serde_yaml::from_str(&contents).with_context(|| format!("parsing config {}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the per-frame path cannot run with.
    pub fn validate(&self) -> Result<()> {
        let n = &self.normalizer;
        ensure!(
            n.nms_iou_threshold > 0.0 && n.nms_iou_threshold <= 1.0,
            "normalizer.nms_iou_threshold must be in (0, 1], got {}",
            n.nms_iou_threshold
        );

        let t = &self.tracker;
        ensure!(
            t.iou_threshold > 0.0 && t.iou_threshold <= 1.0,
            "tracker.iou_threshold must be in (0, 1], got {}",
            t.iou_threshold
        );

        let c = &self.contact;
        ensure!(
            c.iou_threshold > 0.0 && c.iou_threshold <= 1.0,
            "contact.iou_threshold must be in (0, 1], got {}",
            c.iou_threshold
        );
        ensure!(
            c.ball_class_id != c.bat_class_id,
            "contact.ball_class_id and contact.bat_class_id must differ"
        );

        let s = &self.swing;
        ensure!(s.fps > 0.0, "swing.fps must be positive, got {}", s.fps);
        ensure!(
            s.velocity_threshold > 0.0,
            "swing.velocity_threshold must be positive, got {}",
            s.velocity_threshold
        );
        ensure!(
            s.min_duration_ms >= 0.0 && s.min_duration_ms <= s.max_duration_ms,
            "swing duration window [{}, {}] ms is invalid",
            s.min_duration_ms,
            s.max_duration_ms
        );
        ensure!(
            (0.0..=1.0).contains(&s.visibility_threshold),
            "swing.visibility_threshold must be in [0, 1], got {}",
            s.visibility_threshold
        );

        let l = &self.live;
        ensure!(l.queue_capacity > 0, "live.queue_capacity must be positive");
        ensure!(l.poll_timeout_ms > 0, "live.poll_timeout_ms must be positive");
        if let Some(fps) = l.sample_fps {
            ensure!(fps > 0.0, "live.sample_fps must be positive, got {}", fps);
        }

        Ok(())
    }
}
