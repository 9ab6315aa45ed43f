use std::fmt;
use std::io;

use recordpipe_frame::FrameError;
use recordpipe_pipeline::{FailureKind, PipelineError, StagingError};
use recordpipe_transport::TransportError;

// Process exit codes. Transport faults, invalid data and timeouts each get their own code.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(kind: io::ErrorKind, fallback: i32) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => fallback,
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::Resolve(_) => USAGE,
        other => io_code(other.io_error().kind(), TRANSPORT_ERROR),
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => CliError::new(
            io_code(source.kind(), TRANSPORT_ERROR),
            format!("{context}: {source}"),
        ),
        FrameError::ConnectionClosed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn staging_error(context: &str, err: StagingError) -> CliError {
    match err {
        StagingError::InvalidIdentifier(_) => CliError::new(USAGE, format!("{context}: {err}")),
        StagingError::Prepare { ref source, .. }
        | StagingError::Write { ref source, .. }
        | StagingError::Read { ref source, .. }
        | StagingError::Remove { ref source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

pub fn pipeline_error(context: &str, err: PipelineError) -> CliError {
    match err {
        PipelineError::Transport(err) => transport_error(context, err),
        PipelineError::Frame(err) => frame_error(context, err),
        PipelineError::Staging(err) => staging_error(context, err),
        other => {
            let code = match other.kind() {
                FailureKind::TruncatedFrame | FailureKind::MalformedFrame => DATA_INVALID,
                FailureKind::Transport => TRANSPORT_ERROR,
                FailureKind::ChannelClosed | FailureKind::StagingFailure => FAILURE,
                FailureKind::CapacityExceeded | FailureKind::Internal => INTERNAL,
            };
            CliError::new(code, format!("{context}: {other}"))
        }
    }
}
