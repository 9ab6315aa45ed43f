use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use recordpipe_pipeline::{
    ConnectionOutcome, ConnectionSummary, LocalSummary, RecordReport, RecordSink, Rejection,
};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Prints every consumer event to stdout in one format.
#[derive(Debug, Clone, Copy)]
pub struct ReportPrinter {
    format: OutputFormat,
}

impl ReportPrinter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl RecordSink for ReportPrinter {
    fn report(&self, report: &RecordReport) {
        emit(&render_report(report, self.format));
    }

    fn reject(&self, rejection: &Rejection) {
        emit(&render_rejection(rejection, self.format));
    }

    fn connection_closed(&self, summary: &ConnectionSummary) {
        emit(&render_connection_closed(summary, self.format));
    }
}

#[derive(Serialize)]
struct ReportOutput<'a> {
    event: &'static str,
    #[serde(flatten)]
    report: &'a RecordReport,
    result: &'a str,
}

#[derive(Serialize)]
struct RejectionOutput<'a> {
    event: &'static str,
    #[serde(flatten)]
    rejection: &'a Rejection,
}

#[derive(Serialize)]
struct ConnectionOutput<'a> {
    event: &'static str,
    id: u64,
    peer: Option<String>,
    processed: usize,
    outcome: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

#[derive(Serialize)]
struct LocalOutput<'a> {
    event: &'static str,
    #[serde(flatten)]
    summary: LocalSummaryFields,
    stage_dir: &'a str,
}

#[derive(Serialize)]
struct LocalSummaryFields {
    produced: u64,
    consumed: u64,
    rejected: u64,
}

#[derive(Serialize)]
struct SendOutput {
    event: &'static str,
    sent: usize,
    peer: Option<String>,
}

pub fn render_report(report: &RecordReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(&ReportOutput {
            event: "record",
            report,
            result: report.result_label(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["Identifier", report.identifier.as_str()])
                .add_row(vec!["Name", report.name.as_str()])
                .add_row(vec!["Student ID", report.student_id.as_str()])
                .add_row(vec!["Programme", report.programme.as_str()]);
            for course in &report.courses {
                table.add_row(vec![course.course().to_string(), course.mark().to_string()]);
            }
            table
                .add_row(vec!["Average".to_string(), format!("{:.2}", report.average)])
                .add_row(vec!["Result", report.result_label()]);
            table.to_string()
        }
        OutputFormat::Pretty => {
            let mut out = String::new();
            out.push_str("\n===== STUDENT REPORT =====\n");
            out.push_str(&format!("Name:       {}\n", report.name));
            out.push_str(&format!("Student ID: {}\n", report.student_id));
            out.push_str(&format!("Programme:  {}\n", report.programme));
            out.push_str("Courses & Marks:\n");
            for course in &report.courses {
                out.push_str(&format!("  - {}: {}\n", course.course(), course.mark()));
            }
            out.push_str(&format!("Average:    {:.2}\n", report.average));
            out.push_str(&format!("Result:     {}\n", report.result_label()));
            out.push_str("===========================\n");
            out
        }
    }
}

pub fn render_rejection(rejection: &Rejection, format: OutputFormat) -> String {
    let identifier = rejection.identifier.as_deref().unwrap_or("unknown");
    match format {
        OutputFormat::Json => to_json(&RejectionOutput {
            event: "rejected",
            rejection,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["REJECTED", "KIND", "REASON"])
                .add_row(vec![
                    identifier,
                    rejection.kind.as_str(),
                    rejection.reason.as_str(),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => format!(
            "Rejected {identifier} ({}): {}",
            rejection.kind, rejection.reason
        ),
    }
}

pub fn render_connection_closed(summary: &ConnectionSummary, format: OutputFormat) -> String {
    let (outcome, reason) = match &summary.outcome {
        ConnectionOutcome::PeerClosed => ("peer-closed", None),
        ConnectionOutcome::BudgetReached => ("budget-reached", None),
        ConnectionOutcome::Failed { reason, .. } => ("failed", Some(reason.as_str())),
    };
    let peer = summary
        .peer
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match format {
        OutputFormat::Json => to_json(&ConnectionOutput {
            event: "connection-closed",
            id: summary.id,
            peer: summary.peer.map(|addr| addr.to_string()),
            processed: summary.processed,
            outcome,
            reason,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["CONNECTION", "PEER", "PROCESSED", "OUTCOME"])
                .add_row(vec![
                    summary.id.to_string(),
                    peer,
                    summary.processed.to_string(),
                    outcome.to_string(),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => format!(
            "Connection {peer} closed. Processed {} student(s).",
            summary.processed
        ),
    }
}

pub fn print_local_summary(summary: &LocalSummary, stage_dir: &str, format: OutputFormat) {
    let rendered = match format {
        OutputFormat::Json => to_json(&LocalOutput {
            event: "local-complete",
            summary: LocalSummaryFields {
                produced: summary.produced,
                consumed: summary.consumed,
                rejected: summary.rejected,
            },
            stage_dir,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["PRODUCED", "CONSUMED", "REJECTED"])
                .add_row(vec![
                    summary.produced.to_string(),
                    summary.consumed.to_string(),
                    summary.rejected.to_string(),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => format!(
            "Producer-Consumer Simulation Completed. Produced {}, consumed {}, rejected {}.",
            summary.produced, summary.consumed, summary.rejected
        ),
    };
    emit(&rendered);
}

pub fn print_send_summary(sent: usize, peer: Option<String>, format: OutputFormat) {
    let rendered = match format {
        OutputFormat::Json => to_json(&SendOutput {
            event: "send-complete",
            sent,
            peer,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["SENT", "PEER"])
                .add_row(vec![
                    sent.to_string(),
                    peer.unwrap_or_else(|| "unknown".to_string()),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => format!("Done sending. {sent} record(s) sent."),
    };
    emit(&rendered);
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

/// Write one block under a single stdout lock so concurrent connections do
/// not interleave.
fn emit(rendered: &str) {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{rendered}");
    let _ = out.flush();
}
