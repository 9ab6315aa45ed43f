//! Tokio flavour of [`RecordServer`](crate::server::RecordServer): one task
//! per connection instead of one thread.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use recordpipe_frame::{RecordCodec, DEFAULT_MAX_SECTION};
use recordpipe_transport::TransportError;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::report::RecordSink;
use crate::server::{accept_failed, ConnectionSummary, FrameHandler, Tally};
use crate::staging::{MemoryStage, Stage};

/// Accepts TCP connections on a tokio runtime.
pub struct AsyncRecordServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    stage: Arc<dyn Stage>,
    record_budget: Option<usize>,
    max_section_size: usize,
    next_connection_id: AtomicU64,
}

impl AsyncRecordServer {
    /// Bind to `addr` (e.g. `"127.0.0.1:0"`).
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(TransportError::Io)?;
        info!(%local_addr, "listening on tcp (async)");
        Ok(Self {
            listener,
            local_addr,
            stage: Arc::new(MemoryStage::new()),
            record_budget: None,
            max_section_size: DEFAULT_MAX_SECTION,
            next_connection_id: AtomicU64::new(1),
        })
    }

    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_record_budget(mut self, budget: Option<usize>) -> Self {
        self.record_budget = budget;
        self
    }

    pub fn with_max_section_size(mut self, max_section_size: usize) -> Self {
        self.max_section_size = max_section_size;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept the next connection and serve it on a new task.
    pub async fn accept_and_spawn(
        &self,
        sink: Arc<dyn RecordSink>,
    ) -> Result<JoinHandle<ConnectionSummary>> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        Ok(self.spawn(stream, peer, sink))
    }

    /// Accept connections until `shutdown` completes. Accept failures are
    /// logged and do not stop the listener.
    pub async fn serve(
        &self,
        sink: Arc<dyn RecordSink>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        self.spawn(stream, peer, Arc::clone(&sink));
                    }
                    Err(err) => {
                        let err = PipelineError::from(TransportError::Accept(err));
                        tokio::time::sleep(accept_failed(&err)).await;
                    }
                },
            }
        }
        info!("listener stopped");
        Ok(())
    }

    fn spawn(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        sink: Arc<dyn RecordSink>,
    ) -> JoinHandle<ConnectionSummary> {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        info!(id, %peer, "connection opened");
        let handler = FrameHandler {
            stage: Arc::clone(&self.stage),
            sink,
        };
        let frames = FramedRead::new(
            stream,
            RecordCodec::with_max_section_size(self.max_section_size),
        );
        let budget = self.record_budget;
        tokio::spawn(run_connection(id, peer, frames, handler, budget))
    }
}

async fn run_connection(
    id: u64,
    peer: SocketAddr,
    mut frames: FramedRead<TcpStream, RecordCodec>,
    handler: FrameHandler,
    budget: Option<usize>,
) -> ConnectionSummary {
    let mut tally = Tally::new(budget);
    while !tally.exhausted() {
        match frames.next().await {
            None => tally.peer_closed(),
            Some(Ok(frame)) => {
                // Staging is a small synchronous write; it runs inline.
                tally.record(handler.process(frame));
            }
            Some(Err(err)) => {
                let err = PipelineError::from(err);
                handler.reject(None, &err);
                tally.fail(&err);
            }
        }
    }
    let summary = tally.finish(id, Some(peer));
    handler.sink.connection_closed(&summary);
    summary
}
