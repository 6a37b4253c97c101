use colored::Colorize;

use crate::domain::entities::device::{DeviceSession, SessionStatus};
use crate::domain::entities::fall_event::{FallEvent, FallState};

use super::dispatch_fmt::sanitize_terminal;

fn fall_badge(state: FallState) -> String {
    let label = format!(" {} ", state.to_string().to_uppercase());
    match state {
        FallState::Idle => format!("{}", label.on_bright_black().white()),
        FallState::Monitoring => format!("{}", label.on_green().black()),
        FallState::Detected => format!("{}", label.on_yellow().black().bold()),
        FallState::Escalating => format!("{}", label.on_red().white().bold()),
        FallState::Resolved => format!("{}", label.on_blue().white()),
    }
}

fn session_badge(status: SessionStatus) -> String {
    let label = status.to_string();
    match status {
        SessionStatus::Connected => format!("{}", label.green().bold()),
        SessionStatus::Connecting | SessionStatus::Scanning => format!("{}", label.yellow()),
        SessionStatus::Disconnected => format!("{}", label.dimmed()),
    }
}

/// One status line for a fall event snapshot.
#[must_use]
pub fn format_fall_event(event: &FallEvent) -> String {
    let badge = fall_badge(event.state);
    match event.state {
        FallState::Detected => format!(
            "{badge} Are you OK? Alerting contacts in {}s. Type `ok` to cancel or `send` to alert now.",
            event.remaining_secs()
        ),
        FallState::Escalating => format!("{badge} Notifying emergency contacts..."),
        FallState::Monitoring => match &event.error {
            Some(error) => format!("{badge} {}", sanitize_terminal(error).red()),
            None => format!("{badge} Fall detection is active."),
        },
        FallState::Idle => format!("{badge} Fall detection is off."),
        FallState::Resolved => format!("{badge} Dispatch finished."),
    }
}

/// One status line for the wearable session.
#[must_use]
pub fn format_session(session: &DeviceSession) -> String {
    let device = match (&session.device_name, &session.device_id) {
        (Some(name), Some(id)) => {
            format!(" {} [{}]", sanitize_terminal(name), sanitize_terminal(id))
        }
        (None, Some(id)) => format!(" [{}]", sanitize_terminal(id)),
        _ => String::new(),
    };
    let auto = if session.auto_connect_enabled {
        "auto-connect on"
    } else {
        "auto-connect off"
    };
    format!(
        "Device: {}{device} ({})",
        session_badge(session.status),
        auto.dimmed()
    )
}

pub fn print_section_header(title: &str) {
    println!("{}", title.bold().cyan());
    let display_width = title.chars().count();
    println!("{}", "─".repeat(display_width).cyan());
}
