//! Tokio record server; stops on Ctrl-C.
//!
//! Run with:
//!   cargo run -p recordpipe --example async-server --features async
//!
//! In another terminal:
//!   cargo run -p recordpipe --features cli -- send --port 5050 --count 5

use std::sync::Arc;

use recordpipe::pipeline::{AsyncRecordServer, RecordReport, RecordSink};

struct Stderr;

impl RecordSink for Stderr {
    fn report(&self, report: &RecordReport) {
        eprintln!(
            "{} {} {:.2} {}",
            report.identifier,
            report.name,
            report.average,
            report.result_label()
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server = AsyncRecordServer::bind("127.0.0.1:5050").await?;
    eprintln!("Listening on {}", server.local_addr());

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    server.serve(Arc::new(Stderr), shutdown).await?;
    Ok(())
}
