//! Output formatting for scan results

use anyhow::Result;
use serde::Serialize;

use netprobe_common::{RunState, ScanEvent, ScanSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(format: &str) -> Self {
        match format.trim().to_lowercase().as_str() {
            "json" | "j" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    summary: &'a ScanSummary,
    events: &'a [ScanEvent],
}

/// Print one live event.
pub fn print_event(event: &ScanEvent) {
    println!("{}", event);
}

/// Print the end-of-run report.
pub fn print_report(summary: &ScanSummary, events: &[ScanEvent], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let report = Report { summary, events };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => println!("\n{}", summary_line(summary)),
    }
    Ok(())
}

fn summary_line(summary: &ScanSummary) -> String {
    let verdict = match summary.state {
        RunState::Completed => "Done",
        RunState::Cancelled => "Stopped",
        RunState::Failed => "Failed",
        RunState::Idle | RunState::Running => "Unfinished",
    };
    let mut line = format!(
        "{}: {} matched, {}/{} processed ({:.1}%) in {:.2?}",
        verdict,
        summary.matched,
        summary.scanned,
        summary.total,
        summary.progress() * 100.0,
        summary.elapsed
    );
    if summary.truncated {
        line.push_str(" [range truncated]");
    }
    line
}
