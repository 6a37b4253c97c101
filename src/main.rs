use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use fallsentry::application::config::{AppConfig, ConfigContactStore};
use fallsentry::application::services::device_session::{DeviceSessionManager, SessionSettings};
use fallsentry::application::services::dispatcher::AlertDispatcher;
use fallsentry::application::services::fall_state_machine::{EscalationSettings, FallStateMachine};
use fallsentry::domain::ports::store::DispatchLogStore;
use fallsentry::infrastructure::channels::create_channels;
use fallsentry::infrastructure::device::create_transport;
use fallsentry::infrastructure::persistence::sqlite_store::SqliteStore;
use fallsentry::presentation::cli::app::{Cli, Commands};
use fallsentry::presentation::cli::commands::report::run_report;
use fallsentry::presentation::cli::commands::run::run_session;
use fallsentry::presentation::cli::commands::send::run_send;
use fallsentry::presentation::cli::commands::status::run_status;

fn print_banner() {
    println!("{}", "━".repeat(40).cyan());
    println!("{}", "  FALLSENTRY — Fall Alert".bold().cyan());
    println!("{}", "━".repeat(40).cyan());
}

fn setup_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    let config = if let Some(ref path) = cli.config {
        AppConfig::load_from(path)?
    } else {
        AppConfig::load()?
    };

    // Manual DI: main.rs is the only place that knows concrete types
    let store = Arc::new(SqliteStore::new(&config.database.path)?);
    let channels = create_channels(&config.channels);
    if config.contacts.is_empty() {
        tracing::warn!("No emergency contact configured, alerts cannot be sent");
    }

    let build_machine = || {
        FallStateMachine::new(
            Arc::new(ConfigContactStore::new(&config.contacts)),
            AlertDispatcher::new(config.general.send_timeout()),
            channels.clone(),
            Some(Arc::clone(&store) as Arc<dyn DispatchLogStore>),
            EscalationSettings {
                countdown: config.general.countdown(),
                tick: Duration::from_secs(1),
                message: config.general.message.clone(),
            },
        )
    };

    match cli.command {
        Some(Commands::Run { disarmed }) => {
            run_interactive(&config, build_machine(), Arc::clone(&store), !disarmed).await?;
        }
        None => {
            run_interactive(&config, build_machine(), Arc::clone(&store), true).await?;
        }
        Some(Commands::Send { json }) => {
            run_send(&build_machine(), json).await?;
        }
        Some(Commands::Status { json }) => {
            run_status(&config, &channels, &*store, &*store, json)?;
        }
        Some(Commands::Report { limit, json }) => {
            run_report(&*store, limit, json)?;
        }
    }

    Ok(())
}

async fn run_interactive(
    config: &AppConfig,
    machine: Arc<FallStateMachine>,
    store: Arc<SqliteStore>,
    armed: bool,
) -> anyhow::Result<()> {
    print_banner();
    let transport = create_transport(&config.device).await;
    let devices = DeviceSessionManager::new(
        transport,
        store,
        SessionSettings {
            scan_window: Duration::from_secs(config.device.scan_timeout_secs),
            connect_timeout: Duration::from_secs(config.device.connect_timeout_secs),
            sentinel: config.device.sentinel.clone(),
            auto_connect_default: config.device.auto_connect_default,
        },
    );
    run_session(machine, devices, armed && config.general.monitor_on_start).await
}
