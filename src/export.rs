// src/export.rs
//
// Serialized views of an aggregated stream. Helpers write to any
// `io::Write`; opening files is the caller's concern.

use crate::aggregator::FrameRecord;
use crate::types::{Event, TrackId};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

/// One flattened CSV row per detection.
#[derive(Debug, Serialize)]
struct DetectionRow<'a> {
    frame_id: u64,
    timestamp: &'a str,
    class_id: u32,
    track_id: Option<TrackId>,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    conf: f32,
}

pub fn write_frames_json<W: Write>(mut writer: W, frames: &[FrameRecord]) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, frames).context("Failed to write frame records")?;
    writer.flush().context("Failed to flush frame records")
}

pub fn write_events_json<W: Write>(mut writer: W, events: &[Event]) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, events).context("Failed to write events")?;
    writer.flush().context("Failed to flush events")
}

/// Returns the number of rows written.
pub fn write_detections_csv<'a, W, I>(writer: W, frames: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a FrameRecord>,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for frame in frames {
        let timestamp = frame.timestamp.to_rfc3339();
        for det in &frame.detections {
            csv_writer
                .serialize(DetectionRow {
                    frame_id: frame.frame_id,
                    timestamp: &timestamp,
                    class_id: det.class_id,
                    track_id: det.track_id,
                    x1: det.bbox.x1,
                    y1: det.bbox.y1,
                    x2: det.bbox.x2,
                    y2: det.bbox.y2,
                    conf: det.confidence,
                })
                .with_context(|| format!("Failed to write CSV row for frame {}", frame.frame_id))?;
            rows += 1;
        }
    }

    csv_writer.flush().context("Failed to flush CSV writer")?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::FrameAggregator;
    use crate::types::{BBox, Detection, EventKind};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn sample_stream() -> FrameAggregator {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut agg = FrameAggregator::new();

        let mut ball = Detection::new(BBox::new(1.0, 2.0, 3.0, 4.0), 0.5, 0);
        ball.track_id = Some(7);
        let bat = Detection::new(BBox::new(10.0, 20.0, 30.0, 40.0), 0.25, 1);

        agg.add_frame(0, vec![ball, bat], vec![], vec![], ts);
        agg.add_frame(1, vec![], vec![], vec![], ts);
        agg
    }

    #[test]
    fn test_csv_has_header_and_one_row_per_detection() {
        let agg = sample_stream();
        let mut buf = Vec::new();
        let rows = write_detections_csv(&mut buf, &agg).unwrap();
        assert_eq!(rows, 2);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "frame_id,timestamp,class_id,track_id,x1,y1,x2,y2,conf"
        );
        assert!(lines[1].starts_with("0,2023-11-14T22:13:20+00:00,0,7,"));
        // Untracked detection leaves the track_id column empty
        assert!(lines[2].contains(",1,,"));
    }

    #[test]
    fn test_frames_json_is_array_of_records() {
        let agg = sample_stream();
        let mut buf = Vec::new();
        write_frames_json(&mut buf, agg.frames()).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["detections"][0]["track_id"], 7);
        assert_eq!(arr[0]["detections"][0]["bbox"][2], 3.0);
    }

    #[test]
    fn test_events_json_uses_type_key() {
        let events = vec![Event {
            kind: EventKind::Swing,
            frame_start: 4,
            frame_end: 10,
            metadata: BTreeMap::new(),
        }];
        let mut buf = Vec::new();
        write_events_json(&mut buf, &events).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["type"], "swing");
        assert_eq!(value[0]["frame_end"], 10);
    }

    #[test]
    fn test_empty_stream_writes_nothing() {
        let agg = FrameAggregator::new();
        let mut buf = Vec::new();
        assert_eq!(write_detections_csv(&mut buf, &agg).unwrap(), 0);
        // No rows serialized means no header either
        assert!(buf.is_empty());
    }
}
