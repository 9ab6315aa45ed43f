use std::net::{SocketAddr, ToSocketAddrs};

use recordpipe_frame::{FrameConfig, FrameWriter};
use recordpipe_record::Record;
use recordpipe_transport::{NetStream, TcpTransport};
use tracing::{debug, info};

use crate::error::Result;
use crate::source::{record_identifier, Pacing, RecordSource};

/// Sending side of the framed record stream.
pub struct RecordClient {
    writer: FrameWriter<NetStream>,
    peer: Option<SocketAddr>,
    sent: usize,
}

impl RecordClient {
    /// Connect to a listening [`RecordServer`](crate::server::RecordServer).
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with_config(addr, FrameConfig::default())
    }

    /// Connect with explicit frame configuration.
    pub fn connect_with_config(addr: impl ToSocketAddrs, config: FrameConfig) -> Result<Self> {
        let stream = TcpTransport::connect(addr)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr();
        let writer = FrameWriter::with_config_net(stream, config)?;
        info!(peer = ?peer, "connected to record server");
        Ok(Self {
            writer,
            peer,
            sent: 0,
        })
    }

    /// Encode and send one record.
    pub fn send(&mut self, identifier: &str, record: &Record) -> Result<()> {
        self.writer.send_record(identifier, record)?;
        self.sent += 1;
        debug!(identifier, "record sent");
        Ok(())
    }

    /// Send a pre-encoded body without checking it.
    pub fn send_raw(&mut self, identifier: &str, body: &[u8]) -> Result<()> {
        self.writer.send(identifier, body)?;
        self.sent += 1;
        Ok(())
    }

    /// Frames sent so far.
    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Half-close the stream so the server sees a clean end, and return the
    /// number of frames sent.
    pub fn finish(self) -> Result<usize> {
        self.writer.get_ref().shutdown_write()?;
        info!(sent = self.sent, "finished sending");
        Ok(self.sent)
    }
}

/// Send `count` records from `source`, named `{prefix}{seq}.xml`, pausing
/// between them.
pub fn produce_over_stream(
    client: &mut RecordClient,
    source: &mut dyn RecordSource,
    prefix: &str,
    count: u64,
    pacing: &Pacing,
) -> Result<u64> {
    for seq in 1..=count {
        let record = source.next_record(seq);
        let identifier = record_identifier(prefix, seq);
        client.send(&identifier, &record)?;
        info!(%identifier, name = record.name(), "produced record");
        pacing.wait();
    }
    Ok(count)
}
