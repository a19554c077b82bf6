// src/pipeline/live.rs
//
// Live mode: a bounded queue between perception (producer) and the
// coordinator (consumer).
//
//   - the producer never blocks; a full queue drops the NEWEST frame
//   - the consumer waits at most `poll_timeout` per receive so it can
//     observe shutdown
//   - on shutdown or producer close, buffered frames are drained and the
//     coordinator is flushed before returning

use super::coordinator::PipelineCoordinator;
use super::metrics::PipelineMetrics;
use super::sampler::FrameSampler;
use crate::types::{FrameInput, LiveConfig};
use anyhow::{ensure, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queue full, frame discarded
    Dropped,
    /// Consumer gone
    Closed,
}

/// Producer half. Clone to feed from several tasks.
#[derive(Clone)]
pub struct FrameProducer {
    tx: mpsc::Sender<FrameInput>,
    dropped: Arc<AtomicU64>,
}

impl FrameProducer {
    pub fn push(&self, frame: FrameInput) -> PushOutcome {
        match self.tx.try_send(frame) {
            Ok(()) => PushOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    "Queue full, dropping frame {} ({} dropped so far)",
                    frame.frame_id, total
                );
                PushOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(frame)) => {
                warn!("Consumer closed, frame {} discarded", frame.frame_id);
                PushOutcome::Closed
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Frames currently waiting in the queue
    pub fn buffered(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

pub struct FrameConsumer {
    rx: mpsc::Receiver<FrameInput>,
}

pub struct FrameQueue {
    producer: FrameProducer,
    consumer: FrameConsumer,
}

impl FrameQueue {
    /// Drops are counted into `metrics.queue_drops`.
    pub fn new(capacity: usize, metrics: &PipelineMetrics) -> Result<Self> {
        ensure!(capacity > 0, "queue capacity must be positive");
        let (tx, rx) = mpsc::channel(capacity);
        Ok(Self {
            producer: FrameProducer {
                tx,
                dropped: metrics.queue_drops.clone(),
            },
            consumer: FrameConsumer { rx },
        })
    }

    pub fn split(self) -> (FrameProducer, FrameConsumer) {
        (self.producer, self.consumer)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LiveReport {
    pub received: u64,
    pub processed: u64,
    pub rejected: u64,
    pub sampled_out: u64,
    /// Frames still buffered at shutdown and processed during the drain
    pub drained: u64,
}

/// Consume frames until the producer side closes or `shutdown` flips to
/// true (or its sender is dropped), then drain and flush.
pub async fn run_live(
    consumer: FrameConsumer,
    coordinator: &mut PipelineCoordinator,
    config: &LiveConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<LiveReport> {
    ensure!(config.poll_timeout_ms > 0, "poll_timeout_ms must be positive");
    let poll = Duration::from_millis(config.poll_timeout_ms);
    let mut sampler = config.sample_fps.map(FrameSampler::new).transpose()?;
    let mut rx = consumer.rx;
    let mut report = LiveReport::default();

    info!("🎥 Live consumer started (poll timeout {:?})", poll);

    loop {
        if *shutdown.borrow() {
            info!("Shutdown requested");
            break;
        }

        tokio::select! {
            biased;

            // A new value is checked at the top of the loop
            changed = shutdown.changed() => {
                if changed.is_err() {
                    info!("Shutdown handle dropped");
                    break;
                }
            }

            received = timeout(poll, rx.recv()) => match received {
                Ok(Some(frame)) => {
                    consume(frame, coordinator, sampler.as_mut(), &mut report);
                }
                Ok(None) => {
                    info!("Producer closed");
                    break;
                }
                Err(_) => debug!("No frame within {:?}", poll),
            },
        }
    }

    // ── DRAIN ──
    rx.close();
    while let Ok(frame) = rx.try_recv() {
        report.drained += 1;
        consume(frame, coordinator, sampler.as_mut(), &mut report);
    }
    if report.drained > 0 {
        info!("Drained {} buffered frame(s)", report.drained);
    }

    coordinator.finish();

    if let Some(s) = sampler.as_ref() {
        report.sampled_out = s.skipped();
    }

    info!(
        "🎥 Live consumer stopped: {} received, {} processed, {} dropped at queue",
        report.received,
        report.processed,
        coordinator.metrics().summary().queue_drops
    );

    Ok(report)
}

fn consume(
    frame: FrameInput,
    coordinator: &mut PipelineCoordinator,
    sampler: Option<&mut FrameSampler>,
    report: &mut LiveReport,
) {
    report.received += 1;

    if let (Some(sampler), Some(ts)) = (sampler, frame.timestamp) {
        if !sampler.should_keep(ts) {
            let metrics = coordinator.metrics();
            metrics.inc(&metrics.sampler_skips);
            return;
        }
    }

    if coordinator.process_frame(frame).is_processed() {
        report.processed += 1;
    } else {
        report.rejected += 1;
    }
}
