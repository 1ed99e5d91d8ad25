use std::io;

use thiserror::Error;

use crate::gesture::GestureName;

#[derive(Debug, Error)]
pub enum MalformedStreamError {
    #[error("stream ended inside a frame ({pending} events without a terminating sync)")]
    TruncatedFrame { pending: usize },
    #[error("trace header: {0}")]
    Header(String),
    #[error("truncated {what} at byte {offset}")]
    Truncated { what: &'static str, offset: u64 },
    #[error("unknown record kind {kind} at byte {offset}")]
    UnknownRecordKind { kind: u8, offset: u64 },
    #[error("invalid field `{field}` at byte {offset}")]
    InvalidField { field: &'static str, offset: u64 },
    #[error("stream read failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no action registered for gesture `{0}`")]
    UnknownGesture(GestureName),
    #[error("output sink failed: {0}")]
    Sink(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    Validation(String),
    #[error("invalid action trace {path}: {source}")]
    Trace {
        path: String,
        source: MalformedStreamError,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Stream(#[from] MalformedStreamError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("failed to write trace record: {0}")]
    Record(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("unknown trajectory `{0}`")]
    UnknownTrajectory(String),
    #[error("{count} concurrent trajectories exceed the {max} available slots")]
    TooManySlots { count: usize, max: usize },
}
