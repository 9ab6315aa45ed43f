use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{describe, Result, TransportError};
use crate::stream::NetStream;

/// TCP listener transport.
///
/// Provides bind/accept on the server side and `connect` for clients. The
/// listener is only read after bind, so one instance can be shared across
/// threads by reference.
#[derive(Debug)]
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `addr` (e.g. `"0.0.0.0:5000"` or `("::1", 0)`).
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let addrs = resolve(addr)?;
        let listener = TcpListener::bind(&addrs[..]).map_err(|e| TransportError::Bind {
            addr: describe(&addrs),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: describe(&addrs),
            source: e,
        })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<NetStream> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(peer = %addr, "accepted connection");
        Ok(NetStream::from_tcp(stream))
    }

    /// Accept a pending connection if there is one.
    ///
    /// Only useful after [`set_nonblocking(true)`](Self::set_nonblocking);
    /// returns `Ok(None)` when no connection is waiting. The accepted
    /// stream is always blocking.
    pub fn try_accept(&self) -> Result<Option<NetStream>> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                stream
                    .set_nonblocking(false)
                    .map_err(TransportError::Accept)?;
                debug!(peer = %addr, "accepted connection");
                Ok(Some(NetStream::from_tcp(stream)))
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    /// Switch the listener between blocking and polling accepts.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener.set_nonblocking(nonblocking)?;
        Ok(())
    }

    /// Connect to a listening peer (blocking).
    pub fn connect(addr: impl ToSocketAddrs) -> Result<NetStream> {
        let addrs = resolve(addr)?;
        let stream = TcpStream::connect(&addrs[..]).map_err(|e| TransportError::Connect {
            addr: describe(&addrs),
            source: e,
        })?;
        debug!(peer = ?stream.peer_addr().ok(), "connected");
        Ok(NetStream::from_tcp(stream))
    }

    /// The address this listener is bound to; resolves port 0 to the
    /// assigned port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

fn resolve(addr: impl ToSocketAddrs) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = addr
        .to_socket_addrs()
        .map_err(TransportError::Resolve)?
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::Resolve(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            "address resolved to no socket addresses",
        )));
    }
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn bind_accept_connect() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();
        assert_ne!(addr.port(), 0);

        let handle = std::thread::spawn(move || {
            let mut client = TcpTransport::connect(addr).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert!(server.peer_addr().is_some());

        handle.join().unwrap();
    }

    #[test]
    fn shutdown_write_signals_end_of_stream() {
        let listener = TcpTransport::bind(("127.0.0.1", 0)).unwrap();
        let addr = listener.local_addr();

        let handle = std::thread::spawn(move || {
            let mut client = TcpTransport::connect(addr).unwrap();
            client.write_all(b"bye").unwrap();
            client.shutdown_write().unwrap();
            client
        });

        let mut server = listener.accept().unwrap();
        let mut received = Vec::new();
        server.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"bye");

        let _client = handle.join().unwrap();
    }

    #[test]
    fn connect_refused_reports_address() {
        // Bind then drop to get a port that is very likely closed.
        let addr = TcpTransport::bind("127.0.0.1:0").unwrap().local_addr();
        let err = TcpTransport::connect(addr).unwrap_err();
        match err {
            TransportError::Connect { addr: text, .. } => assert!(text.contains("127.0.0.1")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bind_in_use_fails() {
        let first = TcpTransport::bind("127.0.0.1:0").unwrap();
        let result = TcpTransport::bind(first.local_addr());
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn unresolvable_address_fails() {
        let result = TcpTransport::bind("not an address");
        assert!(matches!(result, Err(TransportError::Resolve(_))));
    }

    #[test]
    fn cloned_stream_shares_connection() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();

        let handle = std::thread::spawn(move || {
            let client = TcpTransport::connect(addr).unwrap();
            let mut writer = client.try_clone().unwrap();
            writer.write_all(b"xy").unwrap();
            client
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 2];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"xy");
        let _client = handle.join().unwrap();
    }

    #[test]
    fn try_accept_polls_without_blocking() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        assert!(listener.try_accept().unwrap().is_none());

        let addr = listener.local_addr();
        let mut client = TcpTransport::connect(addr).unwrap();
        client.write_all(b"z").unwrap();

        let mut server = loop {
            if let Some(stream) = listener.try_accept().unwrap() {
                break stream;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        };
        let mut buf = [0u8; 1];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"z");
    }
}
