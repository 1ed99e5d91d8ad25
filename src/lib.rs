pub mod device;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod gesture;
pub mod pipeline;
pub mod synth;
pub mod trace;
pub mod tracker;

pub use dispatch::{ActionSpec, ActionTable, LogSink, OutputSink};
pub use error::{ConfigError, DispatchError, MalformedStreamError, PipelineError, TrajectoryError};
pub use event::{parse_frame, EventKind, EventSource, Frame, Frames, RawEvent};
pub use gesture::{GestureConfig, GestureEvent, GestureMatcher, GestureName};
pub use pipeline::{FrameOutcome, Pipeline, RunSummary};
pub use synth::TrajectoryGenerator;
pub use trace::{decode, encode, TraceReader, TraceWriter};
pub use tracker::{ContactTracker, GestureCandidate};
