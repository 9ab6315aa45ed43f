use parking_lot::Mutex;
use recordpipe_record::{CourseMark, Record};
use serde::Serialize;

use crate::error::{FailureKind, PipelineError};
use crate::server::ConnectionSummary;

/// What the consumer learned about one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordReport {
    pub identifier: String,
    pub name: String,
    pub student_id: String,
    pub programme: String,
    pub courses: Vec<CourseMark>,
    pub average: f64,
    pub passed: bool,
}

impl RecordReport {
    pub fn new(identifier: impl Into<String>, record: &Record) -> Self {
        Self {
            identifier: identifier.into(),
            name: record.name().to_string(),
            student_id: record.student_id().to_string(),
            programme: record.programme().to_string(),
            courses: record.marks().to_vec(),
            average: record.average(),
            passed: record.passed(),
        }
    }

    /// `"PASS"` or `"FAIL"`.
    pub fn result_label(&self) -> &'static str {
        if self.passed {
            "PASS"
        } else {
            "FAIL"
        }
    }
}

/// A record the consumer could not report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    /// `None` when the failure happened before an identifier was read.
    pub identifier: Option<String>,
    pub kind: FailureKind,
    pub reason: String,
}

impl Rejection {
    pub fn new(identifier: Option<String>, err: &PipelineError) -> Self {
        Self {
            identifier,
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

/// Destination for consumer output.
///
/// Shared between connection threads, so implementations synchronise
/// internally.
pub trait RecordSink: Send + Sync {
    fn report(&self, report: &RecordReport);

    fn reject(&self, _rejection: &Rejection) {}

    /// Called once when a server connection ends.
    fn connection_closed(&self, _summary: &ConnectionSummary) {}
}

/// Collects reports and rejections in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<RecordReport>>,
    rejections: Mutex<Vec<Rejection>>,
    connections: Mutex<Vec<ConnectionSummary>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<RecordReport> {
        self.reports.lock().clone()
    }

    pub fn rejections(&self) -> Vec<Rejection> {
        self.rejections.lock().clone()
    }

    /// Summaries of server connections that have ended.
    pub fn connections(&self) -> Vec<ConnectionSummary> {
        self.connections.lock().clone()
    }
}

impl RecordSink for MemorySink {
    fn report(&self, report: &RecordReport) {
        self.reports.lock().push(report.clone());
    }

    fn reject(&self, rejection: &Rejection) {
        self.rejections.lock().push(rejection.clone());
    }

    fn connection_closed(&self, summary: &ConnectionSummary) {
        self.connections.lock().push(summary.clone());
    }
}
