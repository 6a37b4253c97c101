use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;

use crate::application::config::AppConfig;
use crate::domain::entities::device::KnownDevice;
use crate::domain::entities::dispatch::DispatchRecord;
use crate::domain::ports::channel::NotificationChannel;
use crate::domain::ports::store::{DevicePreferenceStore, DispatchLogStore};
use crate::domain::value_objects::channel_kind::ChannelKind;
use crate::presentation::cli::formatters::dispatch_fmt::{format_record_line, sanitize_terminal};
use crate::presentation::cli::formatters::state_fmt::print_section_header;

#[derive(Serialize)]
struct StatusOutput {
    countdown_secs: u64,
    monitor_on_start: bool,
    contacts: usize,
    channels: Vec<ChannelKind>,
    transport: String,
    auto_connect_enabled: bool,
    last_known_device: Option<KnownDevice>,
    last_dispatch: Option<DispatchRecord>,
}

fn collect(
    config: &AppConfig,
    channels: &[Arc<dyn NotificationChannel>],
    prefs: &dyn DevicePreferenceStore,
    history: &dyn DispatchLogStore,
) -> StatusOutput {
    let auto_connect_enabled = prefs
        .auto_connect_enabled()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to read auto-connect preference: {e}");
            None
        })
        .unwrap_or(config.device.auto_connect_default);
    let last_known_device = prefs.last_known_device().unwrap_or_else(|e| {
        tracing::warn!("Failed to read last known device: {e}");
        None
    });
    let last_dispatch = history
        .recent_dispatches(1)
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to read dispatch history: {e}");
            Vec::new()
        })
        .into_iter()
        .next();

    StatusOutput {
        countdown_secs: config.general.countdown_secs,
        monitor_on_start: config.general.monitor_on_start,
        contacts: config.contacts.len(),
        channels: channels.iter().map(|c| c.kind()).collect(),
        transport: config.device.transport.clone(),
        auto_connect_enabled,
        last_known_device,
        last_dispatch,
    }
}

/// Show what an alert would do right now.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn run_status(
    config: &AppConfig,
    channels: &[Arc<dyn NotificationChannel>],
    prefs: &dyn DevicePreferenceStore,
    history: &dyn DispatchLogStore,
    json: bool,
) -> anyhow::Result<()> {
    let status = collect(config, channels, prefs, history);

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "fallsentry — Status".bold().cyan());
    println!("{}", "━".repeat(50));

    print_section_header("\nEscalation");
    println!("  Countdown: {}s", status.countdown_secs);
    println!(
        "  Monitoring at start: {}",
        if status.monitor_on_start { "yes" } else { "no" }
    );
    let contacts = format!("{} emergency contact(s)", status.contacts);
    if status.contacts == 0 {
        println!("  {}", contacts.red().bold());
    } else {
        println!("  {contacts}");
    }

    print_section_header("\nChannels");
    if status.channels.is_empty() {
        println!("  {}", "No notification channel configured".red().bold());
    }
    for kind in &status.channels {
        println!("  • {kind}");
    }

    print_section_header("\nDevice");
    println!("  Transport: {}", sanitize_terminal(&status.transport));
    println!(
        "  Auto-connect: {}",
        if status.auto_connect_enabled { "on" } else { "off" }
    );
    match &status.last_known_device {
        Some(device) => println!(
            "  Last device: {} [{}]",
            sanitize_terminal(device.name.as_deref().unwrap_or("Unnamed Device")),
            sanitize_terminal(&device.id)
        ),
        None => println!("  Last device: {}", "none".dimmed()),
    }

    print_section_header("\nLast alert");
    match &status.last_dispatch {
        Some(record) => println!("  {}", format_record_line(record)),
        None => println!("  {}", "none".dimmed()),
    }
    Ok(())
}
