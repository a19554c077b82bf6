// src/pipeline/coordinator.rs
//
// Per-frame step for one logical stream:
//
//   FrameInput → order check → normalize → track (ids written back)
//              → aggregate → contact + swing → sinks
//
// Components are owned exclusively; one coordinator per stream. The only
// fatal path is construction. Bad data on the per-frame path is dropped
// and counted.

use super::event_bus::FrameSink;
use super::metrics::PipelineMetrics;
use super::perception::{Perception, RawFrame};
use crate::aggregator::{FrameAggregator, FrameRecord};
use crate::events::{ContactDetector, SwingDetector};
use crate::normalizer::{sanitize_keypoints, NormalizeStats, Normalizer};
use crate::tracking::{build_tracker, TrackSnapshot, Tracker};
use crate::types::{Config, Event, FrameInput, TrackId};
use anyhow::Result;
use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What one accepted frame produced.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_id: u64,
    pub tracks: BTreeMap<TrackId, TrackSnapshot>,
    pub events: Vec<Event>,
    pub normalize: NormalizeStats,
}

#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Processed(FrameReport),
    /// Frame id not above the last accepted one
    Rejected { frame_id: u64, last_frame_id: u64 },
}

impl FrameOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, FrameOutcome::Processed(_))
    }

    pub fn events(&self) -> &[Event] {
        match self {
            FrameOutcome::Processed(report) => &report.events,
            FrameOutcome::Rejected { .. } => &[],
        }
    }
}

pub struct PipelineCoordinator {
    normalizer: Normalizer,
    tracker: Box<dyn Tracker>,
    aggregator: FrameAggregator,
    contact: ContactDetector,
    swing: SwingDetector,
    perception: Perception,
    sinks: Vec<Box<dyn FrameSink>>,
    events: Vec<Event>,
    last_frame_id: Option<u64>,
    metrics: PipelineMetrics,
}

impl PipelineCoordinator {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let tracker = build_tracker(&config.tracker)?;
        debug!("Tracker strategy: {:?}", tracker.strategy());

        Ok(Self {
            normalizer: Normalizer::new(config.normalizer.clone())?,
            tracker,
            aggregator: FrameAggregator::new(),
            contact: ContactDetector::new(config.contact.clone())?,
            swing: SwingDetector::new(config.swing.clone())?,
            perception: Perception::new(),
            sinks: Vec::new(),
            events: Vec::new(),
            last_frame_id: None,
            metrics: PipelineMetrics::new(),
        })
    }

    pub fn with_perception(mut self, perception: Perception) -> Self {
        self.perception = perception;
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.sinks.push(sink);
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn aggregator(&self) -> &FrameAggregator {
        &self.aggregator
    }

    /// Every event emitted so far, in emission order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn tracker(&self) -> &dyn Tracker {
        self.tracker.as_ref()
    }

    pub fn process_frame(&mut self, input: FrameInput) -> FrameOutcome {
        let frame_id = input.frame_id;

        if let Some(last) = self.last_frame_id {
            if frame_id <= last {
                warn!(
                    "Rejecting out-of-order frame {} (last accepted {})",
                    frame_id, last
                );
                self.metrics.inc(&self.metrics.frames_rejected);
                return FrameOutcome::Rejected {
                    frame_id,
                    last_frame_id: last,
                };
            }
        }

        let started = Instant::now();

        // ── NORMALIZE ──
        let (mut detections, stats) = self.normalizer.normalize(input.detections);
        self.metrics
            .add(&self.metrics.invalid_detections, stats.invalid as u64);
        self.metrics
            .add(&self.metrics.suppressed_detections, stats.suppressed as u64);
        let pose = sanitize_keypoints(input.pose);

        // ── TRACK ──
        let update = self.tracker.update(&detections);
        for (det, id) in detections.iter_mut().zip(&update.assignments) {
            det.track_id = *id;
        }
        self.metrics
            .add(&self.metrics.tracks_created, update.created.len() as u64);
        self.metrics
            .add(&self.metrics.tracks_evicted, update.evicted.len() as u64);

        // ── AGGREGATE ──
        let timestamp = input.timestamp.unwrap_or_else(Utc::now);
        let record = self
            .aggregator
            .add_frame(frame_id, detections, pose, input.ocr, timestamp);

        // ── EVENTS ──
        let mut events = self.contact.detect(frame_id, &record.detections);
        self.metrics
            .add(&self.metrics.contact_events, events.len() as u64);

        if let Some(swing) = self.swing.push(frame_id, &record.pose) {
            self.metrics.inc(&self.metrics.swing_events);
            if swing.np_flag {
                self.metrics.inc(&self.metrics.np_swings);
            }
            events.push(swing.to_event());
        }

        notify_sinks(&mut self.sinks, &self.metrics, Some(record), &events);

        self.events.extend(events.iter().cloned());
        self.last_frame_id = Some(frame_id);
        self.metrics.inc(&self.metrics.frames_processed);
        self.metrics.set_timing(
            &self.metrics.frame_time_us,
            started.elapsed().as_micros() as u64,
        );

        FrameOutcome::Processed(FrameReport {
            frame_id,
            tracks: update.tracks,
            events,
            normalize: stats,
        })
    }

    /// Run the present perception capabilities on a raw frame, then the
    /// normal per-frame step.
    pub fn process_raw(&mut self, frame: &RawFrame) -> FrameOutcome {
        let input = self.perception.run(frame);
        self.process_frame(input)
    }

    /// End of stream: close any swing still in progress. Returns the events
    /// emitted by the flush.
    pub fn finish(&mut self) -> Vec<Event> {
        let tail: Vec<Event> = match self.swing.flush() {
            Some(swing) => {
                self.metrics.inc(&self.metrics.swing_events);
                if swing.np_flag {
                    self.metrics.inc(&self.metrics.np_swings);
                }
                vec![swing.to_event()]
            }
            None => Vec::new(),
        };

        notify_sinks(&mut self.sinks, &self.metrics, None, &tail);
        self.events.extend(tail.iter().cloned());

        let summary = self.metrics.summary();
        info!(
            "Stream finished: {} frames, {} rejected, {} contacts, {} swings ({} NP)",
            summary.frames_processed,
            summary.frames_rejected,
            summary.contact_events,
            summary.swing_events,
            summary.np_swings
        );

        tail
    }

    /// Offline mode: process a whole stream in order, then flush.
    pub fn run_batch<I>(&mut self, frames: I) -> &[Event]
    where
        I: IntoIterator<Item = FrameInput>,
    {
        for frame in frames {
            self.process_frame(frame);
        }
        self.finish();
        &self.events
    }
}

fn notify_sinks(
    sinks: &mut [Box<dyn FrameSink>],
    metrics: &PipelineMetrics,
    record: Option<&FrameRecord>,
    events: &[Event],
) {
    for sink in sinks.iter_mut() {
        if let Some(record) = record {
            if let Err(e) = sink.on_frame(record) {
                warn!("Sink rejected frame {}: {:#}", record.frame_id, e);
                metrics.inc(&metrics.sink_failures);
            }
        }
        for event in events {
            if let Err(e) = sink.on_event(event) {
                warn!(
                    "Sink rejected {} event at frame {}: {:#}",
                    event.kind.as_str(),
                    event.frame_start,
                    e
                );
                metrics.inc(&metrics.sink_failures);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::event_bus::EventBus;
    use crate::pipeline::perception::ObjectDetector;
    use crate::types::{BBox, Detection, EventKind, Keypoint, TrackerStrategy};
    use anyhow::bail;
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex};

    fn det(x1: f32, y1: f32, x2: f32, y2: f32, class_id: u32) -> Detection {
        Detection::new(BBox::new(x1, y1, x2, y2), 0.9, class_id)
    }

    fn wrist(x: f32) -> Vec<Keypoint> {
        vec![Keypoint {
            name: "RIGHT_WRIST".into(),
            x,
            y: 100.0,
            z: 0.0,
            visibility: 0.9,
        }]
    }

    fn frame(id: u64, detections: Vec<Detection>, pose: Vec<Keypoint>) -> FrameInput {
        FrameInput {
            frame_id: id,
            timestamp: None,
            detections,
            pose,
            ocr: Vec::new(),
        }
    }

    fn coordinator() -> PipelineCoordinator {
        PipelineCoordinator::new(&Config::default()).unwrap()
    }

    /// Sink that shares what it saw with the test
    struct Recorder {
        frames: Arc<Mutex<Vec<u64>>>,
        events: Arc<Mutex<Vec<EventKind>>>,
    }

    impl FrameSink for Recorder {
        fn on_frame(&mut self, record: &FrameRecord) -> Result<()> {
            self.frames.lock().unwrap().push(record.frame_id);
            Ok(())
        }

        fn on_event(&mut self, event: &Event) -> Result<()> {
            self.events.lock().unwrap().push(event.kind);
            Ok(())
        }
    }

    struct FailingSink;

    impl FrameSink for FailingSink {
        fn on_frame(&mut self, _record: &FrameRecord) -> Result<()> {
            bail!("disk full")
        }

        fn on_event(&mut self, _event: &Event) -> Result<()> {
            bail!("disk full")
        }
    }

    #[test]
    fn test_track_ids_written_into_records() {
        let mut c = coordinator();
        for id in 0..3 {
            c.process_frame(frame(
                id,
                vec![
                    det(0.0, 0.0, 10.0, 10.0, 0),
                    det(100.0, 100.0, 140.0, 140.0, 1),
                ],
                vec![],
            ));
        }
        for record in c.aggregator() {
            let ids: Vec<_> = record.detections.iter().map(|d| d.track_id).collect();
            assert_eq!(ids, vec![Some(0), Some(1)]);
        }
    }

    #[test]
    fn test_out_of_order_frame_rejected_and_counted() {
        let mut c = coordinator();
        assert!(c.process_frame(frame(5, vec![], vec![])).is_processed());

        match c.process_frame(frame(3, vec![], vec![])) {
            FrameOutcome::Rejected {
                frame_id,
                last_frame_id,
            } => assert_eq!((frame_id, last_frame_id), (3, 5)),
            other => panic!("expected rejection, got {:?}", other),
        }
        // Duplicate id is also out of order
        assert!(!c.process_frame(frame(5, vec![], vec![])).is_processed());
        assert!(c.process_frame(frame(6, vec![], vec![])).is_processed());

        assert_eq!(c.aggregator().len(), 2);
        assert_eq!(c.metrics().frames_rejected.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_contact_event_carries_track_ids() {
        let mut c = coordinator();
        let outcome = c.process_frame(frame(
            0,
            vec![det(0.0, 0.0, 10.0, 10.0, 0), det(2.0, 2.0, 8.0, 8.0, 1)],
            vec![],
        ));

        let events = outcome.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Contact);
        assert!(events[0].metadata["ball_track"].is_u64());
        assert!(events[0].metadata["bat_track"].is_u64());
    }

    #[test]
    fn test_invalid_detections_dropped_not_fatal() {
        let mut c = coordinator();
        let outcome = c.process_frame(frame(
            0,
            vec![det(10.0, 0.0, 0.0, 10.0, 0), det(0.0, 0.0, 10.0, 10.0, 0)],
            vec![],
        ));
        match outcome {
            FrameOutcome::Processed(report) => {
                assert_eq!(report.normalize.invalid, 1);
                assert_eq!(report.tracks.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(c.aggregator().frames()[0].detections.len(), 1);
    }

    #[test]
    fn test_batch_flushes_open_swing() {
        let mut c = coordinator();
        // Wrist moves 60 px/frame from frame 1 through the last frame
        let frames: Vec<FrameInput> = (0..8)
            .map(|i| frame(i, vec![], wrist(60.0 * i as f32)))
            .collect();

        let events = c.run_batch(frames);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Swing);
        assert_eq!((events[0].frame_start, events[0].frame_end), (1, 7));
        assert_eq!(c.metrics().summary().swing_events, 1);
    }

    #[test]
    fn test_sinks_see_frames_and_events() {
        let frames_seen = Arc::new(Mutex::new(Vec::new()));
        let events_seen = Arc::new(Mutex::new(Vec::new()));

        let mut c = coordinator();
        c.add_sink(Box::new(Recorder {
            frames: frames_seen.clone(),
            events: events_seen.clone(),
        }));
        c.add_sink(Box::new(FailingSink));
        c.add_sink(Box::new(EventBus::new(16)));

        c.process_frame(frame(
            0,
            vec![det(0.0, 0.0, 10.0, 10.0, 0), det(2.0, 2.0, 8.0, 8.0, 1)],
            wrist(0.0),
        ));
        c.process_frame(frame(1, vec![], wrist(100.0)));
        c.finish();

        assert_eq!(*frames_seen.lock().unwrap(), vec![0, 1]);
        assert_eq!(
            *events_seen.lock().unwrap(),
            vec![EventKind::Contact, EventKind::Swing]
        );
        // FailingSink: 2 frames + 2 events
        assert_eq!(c.metrics().summary().sink_failures, 4);
    }

    #[test]
    fn test_process_raw_uses_perception() {
        struct OneBall;
        impl ObjectDetector for OneBall {
            fn detect(&mut self, _frame: &RawFrame) -> Result<Vec<Detection>> {
                Ok(vec![Detection::new(BBox::new(0.0, 0.0, 5.0, 5.0), 0.8, 0)])
            }
        }

        let mut c =
            coordinator().with_perception(Perception::new().with_detector(Box::new(OneBall)));
        let raw = RawFrame {
            frame_id: 0,
            timestamp: None,
            width: 2,
            height: 2,
            pixels: vec![0; 12],
        };
        assert!(c.process_raw(&raw).is_processed());
        assert_eq!(c.aggregator().frames()[0].detections[0].track_id, Some(0));
    }

    #[test]
    fn test_centroid_strategy_from_config() {
        let mut config = Config::default();
        config.tracker.strategy = TrackerStrategy::Centroid;
        let c = PipelineCoordinator::new(&config).unwrap();
        assert_eq!(c.tracker().strategy(), TrackerStrategy::Centroid);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.swing.fps = 0.0;
        assert!(PipelineCoordinator::new(&config).is_err());
    }
}
