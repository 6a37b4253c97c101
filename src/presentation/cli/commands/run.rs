use std::sync::Arc;

use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::application::services::device_session::{DeviceSessionManager, ReconnectOutcome};
use crate::application::services::fall_state_machine::FallStateMachine;
use crate::domain::entities::device::DiscoveredDevice;
use crate::domain::entities::fall_event::FallState;
use crate::presentation::cli::formatters::dispatch_fmt::{format_dispatch_result, sanitize_terminal};
use crate::presentation::cli::formatters::state_fmt::{format_fall_event, format_session};

/// An operator command typed during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Simulate,
    Send,
    Ok,
    Retry,
    Monitor(bool),
    Scan,
    Connect(usize),
    Abort,
    Disconnect,
    AutoConnect(bool),
    Status,
    Help,
    Quit,
}

const HELP: &str = "\
Commands:
  simulate            pretend a fall was detected
  send                alert contacts now (during the countdown)
  ok                  I'm OK, cancel the countdown
  retry               resend after an alert that reached nobody
  monitor on|off      turn fall detection on or off
  scan                look for wearables
  connect <n>         connect to device n from the last scan
  abort               stop scanning
  disconnect          drop the wearable connection
  autoconnect on|off  reconnect to the last wearable at startup
  status              show fall and device state
  quit                leave";

fn parse_switch(arg: Option<&str>) -> Result<bool, String> {
    match arg {
        Some("on" | "true" | "yes") => Ok(true),
        Some("off" | "false" | "no") => Ok(false),
        _ => Err("expected `on` or `off`".to_string()),
    }
}

/// Parse one input line.
///
/// # Errors
///
/// Returns a displayable message for unknown commands or bad arguments.
pub fn parse_command(line: &str) -> Result<SessionCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };
    let arg = words.next();
    match verb.to_lowercase().as_str() {
        "simulate" | "fall" => Ok(SessionCommand::Simulate),
        "send" | "sos" => Ok(SessionCommand::Send),
        "ok" | "cancel" => Ok(SessionCommand::Ok),
        "retry" => Ok(SessionCommand::Retry),
        "monitor" => parse_switch(arg).map(SessionCommand::Monitor),
        "scan" => Ok(SessionCommand::Scan),
        "connect" => arg
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .map(SessionCommand::Connect)
            .ok_or_else(|| "usage: connect <n> (number from the scan list)".to_string()),
        "abort" => Ok(SessionCommand::Abort),
        "disconnect" => Ok(SessionCommand::Disconnect),
        "autoconnect" => parse_switch(arg).map(SessionCommand::AutoConnect),
        "status" => Ok(SessionCommand::Status),
        "help" | "?" => Ok(SessionCommand::Help),
        "quit" | "exit" | "q" => Ok(SessionCommand::Quit),
        other => Err(format!("unknown command `{}`, type `help`", sanitize_terminal(other))),
    }
}

/// Print fall and device state changes until `shutdown` fires.
fn spawn_printer(
    machine: &FallStateMachine,
    devices: &DeviceSessionManager,
    shutdown: CancellationToken,
) {
    let mut falls = machine.subscribe();
    let mut sessions = devices.subscribe();
    tokio::spawn(async move {
        let mut last_state = falls.borrow().state;
        let mut last_second = falls.borrow().remaining_secs();
        let mut last_dispatch = falls.borrow().outcome.as_ref().map(|o| o.dispatched_at);
        let mut last_error = falls.borrow().error.clone();
        let mut last_session = sessions.borrow().clone();
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                changed = falls.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let event = falls.borrow_and_update().clone();
                    let dispatch = event.outcome.as_ref().map(|o| o.dispatched_at);
                    if dispatch != last_dispatch {
                        if let Some(outcome) = &event.outcome {
                            println!("{}", format_dispatch_result(outcome));
                        }
                        last_dispatch = dispatch;
                    }
                    let ticked = event.state == FallState::Detected
                        && event.remaining_secs() != last_second;
                    if event.state != last_state || ticked || event.error != last_error {
                        println!("{}", format_fall_event(&event));
                    }
                    last_state = event.state;
                    last_second = event.remaining_secs();
                    last_error = event.error;
                }
                changed = sessions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let session = sessions.borrow_and_update().clone();
                    if session.status != last_session.status {
                        println!("{}", format_session(&session));
                    }
                    last_session = session;
                }
            }
        }
    });
}

fn print_devices(devices: &[DiscoveredDevice]) {
    if devices.is_empty() {
        println!("No wearable found. Type `abort` to stop scanning.");
        return;
    }
    for (i, device) in devices.iter().enumerate() {
        println!(
            "  {}. {} [{}]",
            i + 1,
            sanitize_terminal(device.display_name()).bold(),
            sanitize_terminal(&device.id)
        );
    }
    println!("Type `connect <n>` to pair.");
}

/// Results of the most recent scan, numbered from 1 for `connect <n>`.
type ScanList = Arc<Mutex<Vec<DiscoveredDevice>>>;

/// Run one command. Anything that waits on the radio or the network runs in
/// its own task so `ok` is always read while a scan or connect is pending.
fn execute(
    command: SessionCommand,
    machine: &Arc<FallStateMachine>,
    devices: &Arc<DeviceSessionManager>,
    last_scan: &ScanList,
) {
    match command {
        SessionCommand::Simulate => {
            if let Err(rejection) = machine.simulate_trigger() {
                println!("{}", rejection.to_string().yellow());
            }
        }
        SessionCommand::Send | SessionCommand::Retry => {
            let machine = Arc::clone(machine);
            tokio::spawn(async move {
                let result = if command == SessionCommand::Send {
                    machine.confirm_escalate_now().await
                } else {
                    machine.retry_dispatch().await
                };
                if let Err(e) = result {
                    println!("{}", e.to_string().yellow());
                }
            });
        }
        SessionCommand::Ok => match machine.cancel() {
            Ok(()) => println!("{}", "Glad you're OK. Alert cancelled.".green()),
            Err(rejection) => println!("{}", rejection.to_string().yellow()),
        },
        SessionCommand::Monitor(enabled) => machine.arm_monitoring(enabled),
        SessionCommand::Scan => {
            let devices = Arc::clone(devices);
            let last_scan = Arc::clone(last_scan);
            tokio::spawn(async move {
                match devices.scan().await {
                    Ok(found) => {
                        print_devices(&found);
                        *last_scan.lock().await = found;
                    }
                    Err(e) => println!("{}", e.to_string().red()),
                }
            });
        }
        SessionCommand::Connect(n) => {
            let devices = Arc::clone(devices);
            let last_scan = Arc::clone(last_scan);
            tokio::spawn(async move {
                let picked = last_scan.lock().await.get(n - 1).cloned();
                match picked {
                    Some(device) => {
                        if let Err(e) = devices.connect(&device).await {
                            println!("{}", e.to_string().red());
                        }
                    }
                    None => println!("{}", "No such device, run `scan` first.".yellow()),
                }
            });
        }
        SessionCommand::Abort => devices.abort_scan(),
        SessionCommand::Disconnect => {
            let devices = Arc::clone(devices);
            tokio::spawn(async move {
                if let Err(e) = devices.disconnect().await {
                    println!("{}", e.to_string().red());
                }
            });
        }
        SessionCommand::AutoConnect(enabled) => {
            if let Err(e) = devices.set_auto_connect(enabled) {
                println!("{}", e.to_string().red());
            } else {
                println!("Auto-connect {}", if enabled { "on" } else { "off" });
            }
        }
        SessionCommand::Status => {
            println!("{}", format_fall_event(&machine.snapshot()));
            println!("{}", format_session(&devices.snapshot()));
        }
        SessionCommand::Help => println!("{HELP}"),
        SessionCommand::Quit => {}
    }
}

/// Interactive session: arms detection, reconnects the wearable and reads
/// operator commands from stdin until `quit`, end of input or Ctrl+C.
///
/// # Errors
///
/// Returns an error if stdin cannot be read.
pub async fn run_session(
    machine: Arc<FallStateMachine>,
    devices: Arc<DeviceSessionManager>,
    armed: bool,
) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let follower = machine.follow_device_signals(devices.subscribe_signals(), shutdown.clone());
    spawn_printer(&machine, &devices, shutdown.clone());

    machine.arm_monitoring(armed);
    println!("{}", format_fall_event(&machine.snapshot()));
    println!("{}", format_session(&devices.snapshot()));

    {
        let devices = Arc::clone(&devices);
        tokio::spawn(async move {
            match devices.auto_reconnect().await {
                ReconnectOutcome::Connected(device) => {
                    tracing::info!(device = %device.id, "Reconnected to last known device");
                }
                ReconnectOutcome::NotFound => {
                    let hint = "Last wearable not in range. Type `scan` to look for it.";
                    println!("{}", hint.yellow());
                }
                ReconnectOutcome::Failed(reason) => {
                    println!("{}", format!("Could not reconnect the wearable: {reason}").yellow());
                }
                ReconnectOutcome::Skipped(_) => {}
            }
        });
    }
    println!("Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let last_scan = ScanList::default();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(SessionCommand::Quit) => break,
                    Ok(command) => execute(command, &machine, &devices, &last_scan),
                    Err(message) => println!("{}", message.yellow()),
                }
            }
            _ = &mut ctrl_c => {
                tracing::info!("Interrupt received, shutting down");
                break;
            }
        }
    }

    shutdown.cancel();
    if let Err(e) = follower.await {
        tracing::debug!("Signal follower ended abnormally: {e}");
    }
    if let Err(e) = devices.disconnect().await {
        tracing::warn!("Failed to close the wearable connection: {e}");
    }
    println!("\nStopping fallsentry...");
    Ok(())
}
