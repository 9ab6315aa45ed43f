use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use recordpipe_frame::{Frame, FrameConfig, FrameReader};
use recordpipe_record::from_markup_bytes;
use recordpipe_transport::{NetStream, TcpTransport, TransportError};
use tracing::{debug, info, warn};

use crate::error::{FailureKind, PipelineError, Result};
use crate::local::discard;
use crate::report::{RecordReport, RecordSink, Rejection};
use crate::staging::{MemoryStage, Stage};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Log a failed accept and return how long the listener waits before the
/// next attempt, so a persistent failure such as fd exhaustion cannot spin.
pub(crate) fn accept_failed(err: &PipelineError) -> Duration {
    warn!(error = %err, "accept failed");
    ACCEPT_POLL_INTERVAL
}

/// Per-connection server behaviour.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Frames to process before closing a connection; `None` reads until
    /// the peer closes.
    pub record_budget: Option<usize>,
    pub frame: FrameConfig,
}

/// How a connection ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionOutcome {
    /// Peer closed the stream on a frame boundary.
    PeerClosed,
    /// The record budget was used up.
    BudgetReached,
    /// A frame could not be read or processed.
    Failed { kind: FailureKind, reason: String },
}

/// Result of serving one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSummary {
    pub id: u64,
    pub peer: Option<SocketAddr>,
    pub processed: usize,
    pub outcome: ConnectionOutcome,
}

/// Accepts TCP connections and consumes framed records, one thread per
/// connection.
pub struct RecordServer {
    transport: TcpTransport,
    stage: Arc<dyn Stage>,
    config: ServerConfig,
    next_connection_id: AtomicU64,
}

impl RecordServer {
    /// Bind to `addr`. Bodies are staged in memory until
    /// [`with_stage`](Self::with_stage) says otherwise.
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let transport = TcpTransport::bind(addr)?;
        Ok(Self {
            transport,
            stage: Arc::new(MemoryStage::new()),
            config: ServerConfig::default(),
            next_connection_id: AtomicU64::new(1),
        })
    }

    /// Stage received bodies here before decoding them.
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stage = stage;
        self
    }

    /// Close each connection after `budget` records (`None` = unlimited).
    pub fn with_record_budget(mut self, budget: Option<usize>) -> Self {
        self.config.record_budget = budget;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Accept the next connection without starting it.
    pub fn accept(&self, sink: Arc<dyn RecordSink>) -> Result<Connection> {
        let stream = self.transport.accept()?;
        self.connection(stream, sink)
    }

    /// Accept the next connection and serve it on its own thread.
    pub fn accept_and_spawn(
        &self,
        sink: Arc<dyn RecordSink>,
    ) -> Result<JoinHandle<ConnectionSummary>> {
        self.accept(sink)?.spawn()
    }

    /// Accept connections until `running` is cleared.
    ///
    /// Accept failures are logged and do not stop the listener. Connection
    /// threads are detached and finish on their own.
    pub fn serve(&self, sink: Arc<dyn RecordSink>, running: &AtomicBool) -> Result<()> {
        self.transport.set_nonblocking(true)?;
        info!(addr = %self.local_addr(), "accepting connections");

        while running.load(Ordering::SeqCst) {
            let stream = match self.transport.try_accept() {
                Ok(Some(stream)) => stream,
                Ok(None) => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                    continue;
                }
                Err(err) => {
                    thread::sleep(accept_failed(&PipelineError::from(err)));
                    continue;
                }
            };

            let spawned = self
                .connection(stream, Arc::clone(&sink))
                .and_then(Connection::spawn);
            if let Err(err) = spawned {
                warn!(error = %err, "failed to start connection");
            }
        }

        info!("listener stopped");
        self.transport.set_nonblocking(false)?;
        Ok(())
    }

    fn connection(&self, stream: NetStream, sink: Arc<dyn RecordSink>) -> Result<Connection> {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let peer = stream.peer_addr();
        let reader = FrameReader::with_config_net(stream, self.config.frame.clone())?;
        info!(id, peer = ?peer, "connection opened");
        Ok(Connection {
            id,
            peer,
            reader,
            handler: FrameHandler {
                stage: Arc::clone(&self.stage),
                sink,
            },
            budget: self.config.record_budget,
        })
    }
}

/// One accepted connection, ready to be served.
pub struct Connection {
    id: u64,
    peer: Option<SocketAddr>,
    reader: FrameReader<NetStream>,
    handler: FrameHandler,
    budget: Option<usize>,
}

impl Connection {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Serve on a new named thread.
    pub fn spawn(self) -> Result<JoinHandle<ConnectionSummary>> {
        thread::Builder::new()
            .name(format!("conn-{}", self.id))
            .spawn(move || self.run())
            .map_err(|err| PipelineError::Transport(TransportError::Io(err)))
    }

    /// Read and consume frames until the budget is reached, the peer
    /// closes, or a frame fails.
    pub fn run(mut self) -> ConnectionSummary {
        let mut tally = Tally::new(self.budget);
        while !tally.exhausted() {
            let frame = match self.reader.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tally.peer_closed();
                    break;
                }
                Err(err) => {
                    let err = PipelineError::from(err);
                    self.handler.reject(None, &err);
                    tally.fail(&err);
                    break;
                }
            };
            if !tally.record(self.handler.process(frame)) {
                break;
            }
        }
        let summary = tally.finish(self.id, self.peer);
        self.handler.sink.connection_closed(&summary);
        summary
    }
}

/// Stage, decode, report and unstage one frame.
pub(crate) struct FrameHandler {
    pub(crate) stage: Arc<dyn Stage>,
    pub(crate) sink: Arc<dyn RecordSink>,
}

impl FrameHandler {
    pub(crate) fn process(&self, frame: Frame) -> Result<()> {
        let identifier = frame.identifier;
        debug!(%identifier, body_len = frame.body.len(), "frame received");

        let artifact = match self.stage.stage(&identifier, &frame.body) {
            Ok(artifact) => artifact,
            Err(err) => {
                let err = PipelineError::from(err);
                self.reject(Some(identifier), &err);
                return Err(err);
            }
        };
        let decoded = from_markup_bytes(&frame.body);
        discard(self.stage.as_ref(), artifact);

        match decoded {
            Ok(record) => {
                let report = RecordReport::new(identifier, &record);
                self.sink.report(&report);
                Ok(())
            }
            Err(err) => {
                let err = PipelineError::from(err);
                self.reject(Some(identifier), &err);
                Err(err)
            }
        }
    }

    pub(crate) fn reject(&self, identifier: Option<String>, err: &PipelineError) {
        warn!(identifier = ?identifier, kind = %err.kind(), error = %err, "connection fault");
        self.sink.reject(&Rejection::new(identifier, err));
    }
}

/// Running count for one connection.
pub(crate) struct Tally {
    budget: Option<usize>,
    processed: usize,
    outcome: Option<ConnectionOutcome>,
}

impl Tally {
    pub(crate) fn new(budget: Option<usize>) -> Self {
        Self {
            budget,
            processed: 0,
            outcome: None,
        }
    }

    /// True once the connection has an outcome or has used its budget.
    pub(crate) fn exhausted(&mut self) -> bool {
        if self.outcome.is_some() {
            return true;
        }
        match self.budget {
            Some(budget) if self.processed >= budget => {
                self.outcome = Some(ConnectionOutcome::BudgetReached);
                true
            }
            _ => false,
        }
    }

    /// Count one processed frame. Returns `false` once the connection
    /// should stop.
    pub(crate) fn record(&mut self, result: Result<()>) -> bool {
        match result {
            Ok(()) => {
                self.processed += 1;
                true
            }
            Err(err) => {
                self.fail(&err);
                false
            }
        }
    }

    pub(crate) fn peer_closed(&mut self) {
        self.outcome = Some(ConnectionOutcome::PeerClosed);
    }

    pub(crate) fn fail(&mut self, err: &PipelineError) {
        self.outcome = Some(ConnectionOutcome::Failed {
            kind: err.kind(),
            reason: err.to_string(),
        });
    }

    pub(crate) fn finish(self, id: u64, peer: Option<SocketAddr>) -> ConnectionSummary {
        let outcome = self.outcome.unwrap_or(ConnectionOutcome::PeerClosed);
        info!(
            id,
            peer = ?peer,
            processed = self.processed,
            outcome = ?outcome,
            "connection closed"
        );
        ConnectionSummary {
            id,
            peer,
            processed: self.processed,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use recordpipe_record::Record;

    use super::*;
    use crate::client::RecordClient;
    use crate::report::MemorySink;
    use crate::staging::DirectoryStage;

    fn record(name: &str, mark: u8) -> Record {
        Record::builder()
            .name(name)
            .student_id("20240001")
            .programme("BSc Information Technology")
            .mark("Programming", mark)
            .unwrap()
            .build()
    }

    fn server() -> RecordServer {
        RecordServer::bind("127.0.0.1:0").expect("server should bind")
    }

    #[test]
    fn failed_accept_waits_before_retrying() {
        let emfile = std::io::Error::from_raw_os_error(24);
        let err = PipelineError::from(TransportError::Accept(emfile));
        assert_eq!(accept_failed(&err), ACCEPT_POLL_INTERVAL);
        assert!(ACCEPT_POLL_INTERVAL > Duration::ZERO);
    }

    #[test]
    fn connection_reads_until_peer_closes() {
        let server = server();
        let addr = server.local_addr();
        let sink = Arc::new(MemorySink::new());

        let client = thread::spawn(move || {
            let mut client = RecordClient::connect(addr).unwrap();
            for i in 1..=3u8 {
                client
                    .send(&format!("student{i}.xml"), &record("Tema", i * 30))
                    .unwrap();
            }
            client.finish().unwrap()
        });

        let handle = server.accept_and_spawn(sink.clone()).unwrap();
        let summary = handle.join().unwrap();
        assert_eq!(client.join().unwrap(), 3);

        assert_eq!(summary.id, 1);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.outcome, ConnectionOutcome::PeerClosed);
        assert_eq!(sink.connections(), vec![summary.clone()]);
        let ids: Vec<_> = sink.reports().into_iter().map(|r| r.identifier).collect();
        assert_eq!(ids, vec!["student1.xml", "student2.xml", "student3.xml"]);
    }

    #[test]
    fn budget_closes_connection() {
        let server = server().with_record_budget(Some(2));
        let addr = server.local_addr();
        let sink = Arc::new(MemorySink::new());

        let client = thread::spawn(move || {
            let mut client = RecordClient::connect(addr).unwrap();
            client.send("student1.xml", &record("A", 10)).unwrap();
            client.send("student2.xml", &record("B", 20)).unwrap();
            client
        });

        let summary = server.accept_and_spawn(sink.clone()).unwrap().join().unwrap();
        let _client = client.join().unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.outcome, ConnectionOutcome::BudgetReached);
    }

    #[test]
    fn zero_budget_processes_nothing() {
        let server = server().with_record_budget(Some(0));
        let addr = server.local_addr();
        let sink = Arc::new(MemorySink::new());

        let client = thread::spawn(move || RecordClient::connect(addr).unwrap());
        let summary = server.accept_and_spawn(sink.clone()).unwrap().join().unwrap();
        let _client = client.join().unwrap();

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.outcome, ConnectionOutcome::BudgetReached);
    }

    #[test]
    fn truncated_frame_ends_connection() {
        let server = server();
        let addr = server.local_addr();
        let sink = Arc::new(MemorySink::new());

        let client = thread::spawn(move || {
            let mut stream = TcpTransport::connect(addr).unwrap();
            stream.write_all(&5u32.to_be_bytes()).unwrap();
            stream.write_all(b"stu").unwrap();
            stream.shutdown_write().unwrap();
            stream
        });

        let summary = server.accept_and_spawn(sink.clone()).unwrap().join().unwrap();
        let _client = client.join().unwrap();

        assert_eq!(summary.processed, 0);
        assert!(matches!(
            summary.outcome,
            ConnectionOutcome::Failed {
                kind: FailureKind::TruncatedFrame,
                ..
            }
        ));
        let rejections = sink.rejections();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].identifier, None);
        assert_eq!(rejections[0].kind, FailureKind::TruncatedFrame);
    }

    #[test]
    fn malformed_mark_rejected_and_unstaged() {
        let dir = crate::staging::tests::temp_dir("server-malformed");
        let stage = Arc::new(DirectoryStage::new(&dir).unwrap());
        let server = server().with_stage(stage);
        let addr = server.local_addr();
        let sink = Arc::new(MemorySink::new());

        let body = "<ITStudent><Name>Tema</Name><StudentID>1</StudentID>\
                    <Programme>SE</Programme><Courses><Course>\
                    <CourseName>AI</CourseName><Mark>abc</Mark>\
                    </Course></Courses></ITStudent>";
        let client = thread::spawn(move || {
            let mut client = RecordClient::connect(addr).unwrap();
            client.send_raw("student1.xml", body.as_bytes()).unwrap();
            // The server may already have hung up.
            let _ = client.send("student2.xml", &record("late", 1));
            let _ = client.finish();
        });

        let summary = server.accept_and_spawn(sink.clone()).unwrap().join().unwrap();
        client.join().unwrap();

        assert_eq!(summary.processed, 0);
        assert!(matches!(
            summary.outcome,
            ConnectionOutcome::Failed {
                kind: FailureKind::MalformedFrame,
                ..
            }
        ));
        assert!(sink.reports().is_empty());
        assert_eq!(
            sink.rejections()[0].identifier.as_deref(),
            Some("student1.xml")
        );
        assert!(!dir.join("student1.xml").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn concurrent_connections_are_isolated() {
        let server = server().with_record_budget(Some(5));
        let addr = server.local_addr();
        let sink = Arc::new(MemorySink::new());

        let clients: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|prefix| {
                thread::spawn(move || {
                    let mut client = RecordClient::connect(addr).unwrap();
                    for i in 1..=5u8 {
                        let name = format!("{prefix}-{i}");
                        client
                            .send(&format!("{prefix}{i}.xml"), &record(&name, i))
                            .unwrap();
                    }
                    client.finish().unwrap()
                })
            })
            .collect();

        let first = server.accept_and_spawn(sink.clone()).unwrap();
        let second = server.accept_and_spawn(sink.clone()).unwrap();
        let summaries = [first.join().unwrap(), second.join().unwrap()];
        for client in clients {
            assert_eq!(client.join().unwrap(), 5);
        }

        for summary in &summaries {
            assert_eq!(summary.processed, 5);
            assert_eq!(summary.outcome, ConnectionOutcome::BudgetReached);
        }

        let reports = sink.reports();
        assert_eq!(reports.len(), 10);
        for prefix in ["a", "b"] {
            let names: Vec<_> = reports
                .iter()
                .filter(|r| r.identifier.starts_with(prefix))
                .map(|r| r.name.clone())
                .collect();
            let expected: Vec<_> = (1..=5).map(|i| format!("{prefix}-{i}")).collect();
            assert_eq!(names, expected);
        }
    }

    #[test]
    fn serve_stops_when_flag_cleared() {
        let server = Arc::new(server());
        let addr = server.local_addr();
        let sink = Arc::new(MemorySink::new());
        let running = Arc::new(AtomicBool::new(true));

        let serving = {
            let server = Arc::clone(&server);
            let sink: Arc<dyn RecordSink> = sink.clone();
            let running = Arc::clone(&running);
            thread::spawn(move || server.serve(sink, &running))
        };

        let mut client = RecordClient::connect(addr).unwrap();
        client.send("student1.xml", &record("Munashe", 77)).unwrap();
        client.finish().unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while sink.reports().is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        running.store(false, Ordering::SeqCst);
        serving.join().unwrap().unwrap();

        assert_eq!(sink.reports().len(), 1);
        assert_eq!(sink.reports()[0].name, "Munashe");
    }
}
