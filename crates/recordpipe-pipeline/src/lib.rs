//! Producer and consumer loops for student records.
//!
//! Two transports carry the same records:
//! - [`local`]: an in-process [`BoundedChannel`] of slot tokens, with record
//!   bodies parked in a [`Stage`] between producer and consumer.
//! - [`server`] / [`client`]: a framed TCP stream, one thread per accepted
//!   connection.
//!
//! [`BoundedChannel`]: recordpipe_channel::BoundedChannel
//! [`Stage`]: staging::Stage

#[cfg(feature = "async")]
pub mod async_server;
pub mod client;
pub mod error;
pub mod local;
pub mod report;
pub mod server;
pub mod source;
pub mod staging;

#[cfg(feature = "async")]
pub use async_server::AsyncRecordServer;
pub use client::{produce_over_stream, RecordClient};
pub use error::{FailureKind, PipelineError, Result};
pub use local::{run_local, LocalConfig, LocalSummary, SlotToken};
pub use report::{MemorySink, RecordReport, RecordSink, Rejection};
pub use server::{Connection, ConnectionOutcome, ConnectionSummary, RecordServer, ServerConfig};
pub use source::{record_identifier, Pacing, RandomRecords, RecordSource};
pub use staging::{DirectoryStage, MemoryStage, Stage, StagedArtifact, StagingError};
