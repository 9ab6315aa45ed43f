use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use recordpipe_record::{to_markup, Record};
use recordpipe_transport::NetStream;

use crate::codec::{encode_frame, Frame, FrameConfig, Section};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(&frame.identifier, frame.body.as_ref())
    }

    /// Serialize `record` and send it under `identifier`.
    pub fn send_record(&mut self, identifier: &str, record: &Record) -> Result<()> {
        let body = to_markup(record);
        self.send(identifier, body.as_bytes())
    }

    /// Encode and send one identifier/body pair.
    pub fn send(&mut self, identifier: &str, body: &[u8]) -> Result<()> {
        let max = self.config.max_section_size;
        for (section, size) in [
            (Section::Identifier, identifier.len()),
            (Section::Body, body.len()),
        ] {
            if size > max {
                return Err(FrameError::PayloadTooLarge { section, size, max });
            }
        }

        self.buf.clear();
        encode_frame(identifier, body, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => self.would_block(err)?,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => self.would_block(err)?,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// With a write timeout configured, `WouldBlock` means the timeout
    /// elapsed and the write is abandoned. Without one the write is retried.
    fn would_block(&self, err: std::io::Error) -> Result<()> {
        match self.config.write_timeout {
            Some(timeout) => Err(FrameError::Io(std::io::Error::new(
                ErrorKind::TimedOut,
                format!("write timed out after {timeout:?}: {err}"),
            ))),
            None => Ok(()),
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl FrameWriter<NetStream> {
    /// Create a frame writer for `NetStream` and apply write timeout from config.
    pub fn with_config_net(inner: NetStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
