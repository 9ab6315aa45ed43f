#![cfg(feature = "cli")]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "rpcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ))
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("ephemeral bind should succeed")
        .local_addr()
        .expect("local addr should be available")
        .port()
}

fn recordpipe() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_recordpipe"));
    cmd.env_remove("RECORDPIPE_HOST")
        .env_remove("RECORDPIPE_PORT")
        .env_remove("RECORDPIPE_COUNT")
        .env_remove("RECORDPIPE_STAGE_DIR")
        .arg("--log-level")
        .arg("error");
    cmd
}

fn wait_for_listener(port: u16, timeout: Duration) {
    let start = Instant::now();
    loop {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("server did not start listening on port {port}");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn spawn_server(port: u16, count: u64, dir: &Path) -> (Child, Receiver<serde_json::Value>) {
    let mut child = recordpipe()
        .args(["--format", "json", "serve", "--host", "127.0.0.1"])
        .args(["--port", &port.to_string(), "--count", &count.to_string()])
        .arg("--stage-dir")
        .arg(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");

    let stdout = child.stdout.take().expect("stdout should be piped");
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            if let Ok(value) = serde_json::from_str(&line) {
                if tx.send(value).is_err() {
                    break;
                }
            }
        }
    });
    (child, rx)
}

/// Collect events until `done` says so or the deadline passes.
fn collect_until(
    rx: &Receiver<serde_json::Value>,
    timeout: Duration,
    done: impl Fn(&[serde_json::Value]) -> bool,
) -> Vec<serde_json::Value> {
    let deadline = Instant::now() + timeout;
    let mut events = Vec::new();
    while !done(&events) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(event) => events.push(event),
            Err(_) => break,
        }
    }
    events
}

#[test]
fn send_to_serve_reports_each_record() {
    let dir = unique_temp_dir("serve");
    let port = free_port();
    let (mut server, events) = spawn_server(port, 3, &dir);
    wait_for_listener(port, Duration::from_secs(5));

    let output = recordpipe()
        .args(["--format", "json", "send", "--host", "127.0.0.1"])
        .args(["--port", &port.to_string(), "--count", "3", "--seed", "4"])
        .output()
        .expect("send should run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let sent: serde_json::Value = serde_json::from_slice(&output.stdout).expect("send emits JSON");
    assert_eq!(sent["event"], "send-complete");
    assert_eq!(sent["sent"], 3);

    let events = collect_until(&events, Duration::from_secs(10), |events| {
        events
            .iter()
            .any(|e| e["event"] == "connection-closed" && e["processed"] == 3)
    });
    let _ = server.kill();
    let _ = server.wait();

    let identifiers: Vec<_> = events
        .iter()
        .filter(|e| e["event"] == "record")
        .map(|e| e["identifier"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(identifiers, vec!["student1.xml", "student2.xml", "student3.xml"]);

    let closed = events
        .iter()
        .find(|e| e["event"] == "connection-closed" && e["processed"] == 3)
        .expect("closing line expected");
    assert_eq!(closed["outcome"], "budget-reached");

    assert_eq!(std::fs::read_dir(&dir).map(|d| d.count()).unwrap_or(0), 0);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn two_senders_are_isolated() {
    let dir = unique_temp_dir("isolated");
    let port = free_port();
    let (mut server, events) = spawn_server(port, 0, &dir);
    wait_for_listener(port, Duration::from_secs(5));

    let senders: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|prefix| {
            recordpipe()
                .args(["--format", "json", "send", "--host", "127.0.0.1"])
                .args(["--port", &port.to_string(), "--count", "5"])
                .args(["--prefix", prefix])
                .stdout(Stdio::null())
                .spawn()
                .expect("send should start")
        })
        .collect();
    for mut sender in senders {
        assert!(sender.wait().expect("send should finish").success());
    }

    let events = collect_until(&events, Duration::from_secs(10), |events| {
        events.iter().filter(|e| e["event"] == "record").count() >= 10
    });
    let _ = server.kill();
    let _ = server.wait();

    for prefix in ["a", "b"] {
        let identifiers: Vec<_> = events
            .iter()
            .filter(|e| e["event"] == "record")
            .filter_map(|e| e["identifier"].as_str())
            .filter(|id| id.starts_with(prefix))
            .map(str::to_string)
            .collect();
        let expected: Vec<_> = (1..=5).map(|i| format!("{prefix}{i}.xml")).collect();
        assert_eq!(identifiers, expected);
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_without_server_is_transport_error() {
    let port = free_port();
    let output = recordpipe()
        .args(["send", "--host", "127.0.0.1", "--port", &port.to_string()])
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
}

fn raw_frame(identifier: &str, body: &str) -> Vec<u8> {
    let mut wire = Vec::new();
    wire.extend_from_slice(&(identifier.len() as u32).to_be_bytes());
    wire.extend_from_slice(identifier.as_bytes());
    wire.extend_from_slice(&(body.len() as u32).to_be_bytes());
    wire.extend_from_slice(body.as_bytes());
    wire
}

#[test]
fn out_of_range_mark_is_reported_as_rejected() {
    let dir = unique_temp_dir("rejected");
    let port = free_port();
    let (mut server, events) = spawn_server(port, 0, &dir);
    wait_for_listener(port, Duration::from_secs(5));

    let body = "<ITStudent><Name>Tema</Name><StudentID>12345678</StudentID>\
                <Programme>Software Engineering</Programme><Courses><Course>\
                <CourseName>AI</CourseName><Mark>150</Mark></Course></Courses></ITStudent>";
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect should succeed");
    stream
        .write_all(&raw_frame("bad1.xml", body))
        .expect("frame should be written");
    stream.flush().expect("flush should succeed");

    let events = collect_until(&events, Duration::from_secs(10), |events| {
        events
            .iter()
            .any(|e| e["event"] == "connection-closed" && e["outcome"] == "failed")
    });
    drop(stream);
    let _ = server.kill();
    let _ = server.wait();

    let rejected = events
        .iter()
        .find(|e| e["event"] == "rejected")
        .expect("rejected event expected");
    assert_eq!(rejected["identifier"], "bad1.xml");
    assert_eq!(rejected["kind"], "malformed-frame");
    assert!(rejected["reason"].as_str().unwrap_or_default().contains("150"));

    let closed = events
        .iter()
        .find(|e| e["event"] == "connection-closed" && e["outcome"] == "failed")
        .expect("failed closing line expected");
    assert_eq!(closed["processed"], 0);
    assert!(closed["reason"].as_str().unwrap_or_default().contains("150"));
    assert!(!events.iter().any(|e| e["event"] == "record"));
    let _ = std::fs::remove_dir_all(&dir);
}
