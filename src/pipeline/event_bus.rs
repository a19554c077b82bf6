// src/pipeline/event_bus.rs
//
// Downstream consumers of the per-frame path. The coordinator pushes every
// aggregated record and every detected event to its registered sinks; a
// failing sink is logged and counted but never stops the stream.

use crate::aggregator::FrameRecord;
use crate::types::Event;
use anyhow::Result;
use std::collections::VecDeque;
use tracing::warn;

pub trait FrameSink: Send {
    fn on_frame(&mut self, record: &FrameRecord) -> Result<()>;

    fn on_event(&mut self, event: &Event) -> Result<()>;
}

/// In-memory sink holding at most `max_pending` events until drained.
pub struct EventBus {
    events: VecDeque<Event>,
    max_pending: usize,
    frames_seen: u64,
    dropped: u64,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending: max_pending.max(1),
            frames_seen: 0,
            dropped: 0,
        }
    }

    pub fn publish(&mut self, event: Event) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl FrameSink for EventBus {
    fn on_frame(&mut self, _record: &FrameRecord) -> Result<()> {
        self.frames_seen += 1;
        Ok(())
    }

    fn on_event(&mut self, event: &Event) -> Result<()> {
        self.publish(event.clone());
        Ok(())
    }
}
