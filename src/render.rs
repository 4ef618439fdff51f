//! Terminal rendering of sync reports.

use owo_colors::OwoColorize;
use shadowcal_core::diff::DiffKind;
use shadowcal_core::report::{NotificationSink, ReconciliationResult, SyncReport};

/// Prints sync reports to stdout.
pub struct TerminalSink;

impl NotificationSink for TerminalSink {
    fn sync_completed(&self, report: &SyncReport) {
        println!("{}", header(report));

        let result = report.result();
        if result.is_empty() {
            println!("   {}", "Shadow calendar already up to date".dimmed());
        } else {
            for line in render_counts(&result) {
                println!("   {}", line);
            }
        }

        if !report.triggers.is_empty() {
            println!();
            println!("{}", "Schedule these runs:".dimmed());
            for trigger in &report.triggers {
                println!("   {} {}", "*".dimmed(), trigger);
            }
        }
    }

    fn sync_failed(&self, report: &SyncReport, error: &str) {
        println!("{}", header(report));
        println!("   {}", error.red());

        let partial = report.result();
        if !partial.is_empty() {
            println!("   {}", "Applied before the failure:".dimmed());
            for line in render_counts(&partial) {
                println!("   {}", line);
            }
        }
    }
}

fn header(report: &SyncReport) -> String {
    let scope = if report.full_window {
        "full window"
    } else {
        "changes only"
    };
    format!("{} sync ({})", report.mode, scope).bold().to_string()
}

fn render_counts(result: &ReconciliationResult) -> Vec<String> {
    [
        (DiffKind::Create, result.created, "created"),
        (DiffKind::Update, result.updated, "updated"),
        (DiffKind::Delete, result.deleted, "deleted"),
    ]
    .into_iter()
    .map(|(kind, count, label)| {
        let line = format!("{} {:>4} {}", kind.symbol(), count, label);
        match kind {
            DiffKind::Create => line.green().to_string(),
            DiffKind::Update => line.yellow().to_string(),
            DiffKind::Delete => line.red().to_string(),
        }
    })
    .collect()
}
