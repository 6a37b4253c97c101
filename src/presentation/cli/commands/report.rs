use colored::Colorize;
use serde::Serialize;

use crate::domain::entities::dispatch::DispatchRecord;
use crate::domain::ports::store::DispatchLogStore;
use crate::presentation::cli::formatters::dispatch_fmt::format_record_line;
use crate::presentation::cli::formatters::state_fmt::print_section_header;

#[derive(Serialize)]
struct ReportOutput<'a> {
    total: usize,
    delivered: usize,
    failed: usize,
    dispatches: &'a [DispatchRecord],
}

fn summarize(records: &[DispatchRecord]) -> ReportOutput<'_> {
    let delivered = records.iter().filter(|r| r.result.overall_success).count();
    ReportOutput {
        total: records.len(),
        delivered,
        failed: records.len() - delivered,
        dispatches: records,
    }
}

/// Print the most recent dispatches, newest first.
///
/// # Errors
///
/// Returns an error if the store query fails or JSON serialization fails.
pub fn run_report(history: &dyn DispatchLogStore, limit: usize, json: bool) -> anyhow::Result<()> {
    if limit == 0 {
        anyhow::bail!("Limit must be greater than 0");
    }
    let records = history
        .recent_dispatches(limit)
        .map_err(|e| anyhow::anyhow!("failed to read dispatch history: {e}"))?;
    let report = summarize(&records);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_section_header("Recent alert dispatches");
    if records.is_empty() {
        println!("  {}", "No alert has been sent yet.".dimmed());
        return Ok(());
    }
    for record in &records {
        println!("  {}", format_record_line(record));
    }
    println!();
    println!(
        "  {} total, {} delivered, {} failed",
        report.total,
        report.delivered.to_string().green(),
        report.failed.to_string().red()
    );
    Ok(())
}
