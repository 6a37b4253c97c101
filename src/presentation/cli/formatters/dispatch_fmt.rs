use colored::Colorize;

use crate::domain::entities::dispatch::{DispatchAttempt, DispatchRecord, DispatchResult};

/// Strips ANSI/OSC escape sequences from a string to prevent terminal injection.
#[must_use]
pub fn sanitize_terminal(input: &str) -> String {
    input.chars().filter(|c| *c != '\x1b').collect()
}

fn attempt_line(attempt: &DispatchAttempt) -> String {
    let who = format!(
        "{} ({})",
        sanitize_terminal(&attempt.contact.name),
        sanitize_terminal(&attempt.contact.phone)
    );
    if attempt.success {
        let id = attempt
            .provider_id
            .as_deref()
            .map(|id| format!(" id={}", sanitize_terminal(id)))
            .unwrap_or_default();
        format!(
            "  {} {:<16} {who}{}",
            "✔".green(),
            attempt.channel.to_string(),
            id.dimmed()
        )
    } else {
        let error = attempt.error.as_deref().unwrap_or("unknown error");
        format!(
            "  {} {:<16} {who}: {}",
            "✘".red(),
            attempt.channel.to_string(),
            sanitize_terminal(error).red()
        )
    }
}

/// Multi-line summary of one dispatch, ending with the retry hint on failure.
#[must_use]
pub fn format_dispatch_result(result: &DispatchResult) -> String {
    let mut lines = Vec::new();

    if let Some(reason) = &result.configuration_error {
        lines.push(format!(
            "{} {}",
            "Alert not sent:".red().bold(),
            sanitize_terminal(reason)
        ));
        return lines.join("\n");
    }

    let reached = result.reached_contacts();
    if result.overall_success {
        lines.push(format!(
            "{}",
            format!(
                "Alert delivered to {} contact(s) ({} of {} sends succeeded)",
                reached.len(),
                result.success_count(),
                result.attempts.len()
            )
            .green()
            .bold()
        ));
    } else {
        lines.push(format!(
            "{}",
            "No emergency contact could be reached.".red().bold()
        ));
    }
    lines.extend(result.attempts.iter().map(attempt_line));
    if !result.overall_success {
        lines.push(format!("{}", "Type `retry` to send the alert again.".yellow()));
    }
    lines.join("\n")
}

/// One line per history entry for the report command.
#[must_use]
pub fn format_record_line(record: &DispatchRecord) -> String {
    let result = &record.result;
    let verdict = if result.configuration_error.is_some() {
        "NOT SENT".red().bold()
    } else if result.overall_success {
        "DELIVERED".green().bold()
    } else {
        "FAILED".red().bold()
    };
    format!(
        "{}  {:<7} {:<9} {}/{} sends",
        result.dispatched_at.format("%Y-%m-%d %H:%M:%S"),
        record.source.to_string(),
        verdict,
        result.success_count(),
        result.attempts.len()
    )
}
