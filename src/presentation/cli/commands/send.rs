use anyhow::Context;

use crate::application::services::fall_state_machine::FallStateMachine;
use crate::presentation::cli::formatters::dispatch_fmt::format_dispatch_result;

/// Alert every contact immediately, skipping the countdown.
///
/// Goes through the state machine so the dispatch is guarded and logged
/// like any other.
///
/// # Errors
///
/// Returns an error if no contact is configured, the contact store fails,
/// or JSON serialization fails.
pub async fn run_send(machine: &FallStateMachine, json: bool) -> anyhow::Result<()> {
    machine.arm_monitoring(true);
    machine
        .simulate_trigger()
        .context("Could not start the alert")?;
    let result = machine
        .confirm_escalate_now()
        .await
        .context("Alert not sent")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", format_dispatch_result(&result));
    }
    Ok(())
}
