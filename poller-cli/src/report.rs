use colored::*;
use poller_engine::{RunSummary, Status, TimeRange};

/// Human summary of a run. Written to stderr: stdout carries the records.
pub fn print_run_summary(summary: &RunSummary) {
    match &summary.scheduled {
        Some(window) => eprintln!("{} {}", "• Requested window:".bold(), window),
        None => eprintln!("{}", "• No new window to request".dimmed()),
    }
    for done in &summary.completed {
        eprintln!(
            "{} {} ({} records)",
            "✔ Finished".green().bold(),
            done.window,
            done.records
        );
    }
    for failed in &summary.failed {
        eprintln!(
            "{} {}: {}",
            "✘ Failed".red().bold(),
            failed.window,
            failed.reason
        );
    }
    for window in &summary.skipped {
        eprintln!("{} {}", "… Deferred".yellow().bold(), window);
    }
}

pub fn print_status(status: &Status) {
    eprintln!(
        "{} {} requested, {} finished",
        "Status:".bold(),
        status.requested.len(),
        status.finished.len()
    );
    if let Some(last) = status.finished.last() {
        eprintln!("  Harvested through: {}", last.end);
    }
    for window in &status.requested {
        eprintln!("  Pending: {}", window);
    }
}

pub fn print_next_window(window: Option<&TimeRange>) {
    match window {
        Some(window) => println!("{window}"),
        None => eprintln!("{}", "Already caught up; nothing to request".dimmed()),
    }
}
