//! In-process producer/consumer over a three-slot buffer.
//!
//! Run with:
//!   cargo run -p recordpipe --example local-pipeline

use recordpipe::pipeline::{run_local, LocalConfig, MemorySink, MemoryStage, RandomRecords};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LocalConfig {
        count: 8,
        capacity: 3,
        ..LocalConfig::default()
    };
    let mut source = RandomRecords::seeded(2024);
    let stage = MemoryStage::new();
    let sink = MemorySink::new();

    let summary = run_local(&config, &mut source, &stage, &sink)?;

    for report in sink.reports() {
        eprintln!(
            "{:<14} {:<10} avg {:>6.2} {}",
            report.identifier,
            report.name,
            report.average,
            report.result_label()
        );
    }
    eprintln!(
        "produced {} consumed {} rejected {}",
        summary.produced, summary.consumed, summary.rejected
    );
    Ok(())
}
