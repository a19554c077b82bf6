// src/pipeline/mod.rs

pub mod coordinator;
pub mod event_bus;
pub mod live;
pub mod metrics;
pub mod perception;
pub mod sampler;

pub use coordinator::{FrameOutcome, FrameReport, PipelineCoordinator};
pub use event_bus::{EventBus, FrameSink};
pub use live::{run_live, FrameConsumer, FrameProducer, FrameQueue, LiveReport, PushOutcome};
pub use metrics::{MetricsSummary, PipelineMetrics};
pub use perception::{ObjectDetector, Perception, PoseEstimator, RawFrame, TextReader};
pub use sampler::FrameSampler;
