use std::fmt;

use recordpipe_channel::ChannelError;
use recordpipe_frame::FrameError;
use recordpipe_record::RecordError;
use recordpipe_transport::TransportError;
use serde::Serialize;

use crate::staging::StagingError;

/// Errors that can occur while moving records between producer and consumer.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Bounded channel error.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Staged artifact could not be written, read or removed.
    #[error("staging failure: {0}")]
    Staging(#[from] StagingError),

    /// Record body did not decode.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// A producer, consumer or connection thread panicked.
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

/// Coarse failure classes reported to sinks and mapped to exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    TruncatedFrame,
    MalformedFrame,
    CapacityExceeded,
    StagingFailure,
    ChannelClosed,
    Transport,
    Internal,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TruncatedFrame => "truncated-frame",
            Self::MalformedFrame => "malformed-frame",
            Self::CapacityExceeded => "capacity-exceeded",
            Self::StagingFailure => "staging-failure",
            Self::ChannelClosed => "channel-closed",
            Self::Transport => "transport",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PipelineError {
    /// Classify this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::Frame(err) if err.is_truncated() => FailureKind::TruncatedFrame,
            Self::Frame(err) if err.is_malformed() => FailureKind::MalformedFrame,
            Self::Frame(FrameError::PayloadTooLarge { .. }) => FailureKind::MalformedFrame,
            Self::Frame(_) => FailureKind::Transport,
            Self::Channel(ChannelError::CapacityExceeded { .. }) => FailureKind::CapacityExceeded,
            Self::Channel(ChannelError::Closed) => FailureKind::ChannelClosed,
            Self::Channel(ChannelError::ZeroCapacity) => FailureKind::Internal,
            Self::Staging(_) => FailureKind::StagingFailure,
            Self::Record(_) => FailureKind::MalformedFrame,
            Self::ThreadPanicked(_) => FailureKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
