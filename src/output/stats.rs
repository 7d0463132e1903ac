//! Run statistics and report rendering
//!
//! This module turns processing reports into the text the CLI prints.

use crate::rehost::{ProcessingReport, RunSummary};
use std::fmt::Write;

/// Counters across a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Documents visited
    pub documents: usize,

    /// Documents written back
    pub rewritten: usize,

    /// References uploaded fresh
    pub uploaded: usize,

    /// References the backend already had
    pub already_hosted: usize,

    /// References downloaded without an upload (download-only mode)
    pub downloaded_only: usize,

    /// Failures, including document-level ones
    pub failures: usize,
}

/// Computes statistics from a run summary
pub fn compute_statistics(summary: &RunSummary) -> RunStatistics {
    let mut stats = RunStatistics {
        documents: summary.documents(),
        rewritten: summary.rewritten(),
        failures: summary.failures(),
        ..RunStatistics::default()
    };

    for success in summary.reports.iter().flat_map(|r| &r.successes) {
        match (&success.remote_url, success.already_existed) {
            (None, _) => stats.downloaded_only += 1,
            (Some(_), true) => stats.already_hosted += 1,
            (Some(_), false) => stats.uploaded += 1,
        }
    }

    stats
}

/// Renders one document's report
///
/// Documents with nothing to report render as an empty string.
pub fn format_report(report: &ProcessingReport) -> String {
    let mut out = String::new();
    if report.successes.is_empty() && report.failures.is_empty() {
        return out;
    }

    let _ = writeln!(out, "{}", report.document.display());

    for success in &report.successes {
        let target = match (&success.remote_url, success.already_existed) {
            (Some(url), true) => format!("{} [already hosted]", url),
            (Some(url), false) => url.clone(),
            (None, _) => "downloaded only".to_string(),
        };
        let _ = writeln!(
            out,
            "  ok   {} -> {} ({})",
            success.reference,
            target,
            success.local_path.display()
        );
    }

    for failure in &report.failures {
        let _ = writeln!(
            out,
            "  FAIL {}: {}",
            failure.reference.as_deref().unwrap_or("<document>"),
            failure.reason()
        );
    }

    if report.rewritten {
        let _ = writeln!(out, "  document updated");
    }

    out
}

/// Prints one document's report to stdout
pub fn print_report(report: &ProcessingReport) {
    print!("{}", format_report(report));
}

/// Prints every document report followed by the totals
pub fn print_summary(summary: &RunSummary) {
    for report in &summary.reports {
        print_report(report);
    }

    let stats = compute_statistics(summary);

    println!();
    println!("=== Rehost Summary ===");
    println!("  Documents processed: {}", stats.documents);
    println!("  Documents updated:   {}", stats.rewritten);
    println!("  Uploaded:            {}", stats.uploaded);
    println!("  Already hosted:      {}", stats.already_hosted);
    if stats.downloaded_only > 0 {
        println!("  Downloaded only:     {}", stats.downloaded_only);
    }
    println!("  Failed:              {}", stats.failures);
}
