pub mod accumulator;
pub mod compare;
pub mod error;
pub mod job;
pub mod machine;
pub mod sampler;
pub mod segmenter;

pub use accumulator::{validate, Segment, SegmentAccumulator};
pub use compare::FrameComparator;
pub use error::SegmentationError;
pub use job::{JobHandle, JobRunner, JobStatus};
pub use machine::{BoundaryEvent, RunState, SegmentationMachine};
pub use sampler::{FrameSampler, SampleError};
pub use segmenter::{CancelToken, RunStats, Segmenter};
