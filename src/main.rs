//! mqtt-clock — wall-clock publisher built on the mqttagent runtime
//!
//! Publishes the current date and time to a topic hierarchy: the full set of
//! date fields on every minute change, the second and the Unix timestamp on
//! every second change. A thin consumer of the agent API: all scheduling is
//! the host loop below, all networking is the runtime's.

use chrono::{Datelike, Local, Timelike};
use clap::{Parser, Subcommand};
use mqttagent::observability::init_default_logging;
use mqttagent::{Agent, AgentConfig, AgentCore, IdleError, Message, RumqttTransport};
use std::path::PathBuf;
use std::process;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

const TOPIC_ROOT: &str = "service/clock";

/// Host loop tick; idle cycles are paced at this interval.
const TICK: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "mqtt-clock")]
#[command(about = "Periodic wall-clock publisher for MQTT")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the clock agent
    Run,
    /// Validate the configuration
    Config {
        /// Show the resolved configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Default)]
struct ClockState {
    last_minute: Option<u32>,
    last_second: Option<u32>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_clock(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(config_path: &Option<PathBuf>) -> Result<AgentConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("loading configuration from: {}", path.display());
            Ok(AgentConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = ["mqtt-clock.toml", "config/mqtt-clock.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("loading configuration from: {}", path.display());
                    return Ok(AgentConfig::load_from_file(&path)?);
                }
            }

            Err("no configuration file found; pass -c/--config or create mqtt-clock.toml".into())
        }
    }
}

fn handle_config_command(
    config: &AgentConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("name    {}", config.client_name);
        println!("broker  {}:{}", config.host, config.port);
    }
    info!("configuration is valid");
    Ok(())
}

async fn run_clock(config: AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        name = %config.client_name,
        host = %config.host,
        port = config.port,
        "clock agent configured"
    );

    let transport = RumqttTransport::new(&config.client_name);
    let mut agent = Agent::new(transport, ClockState::default());
    agent.set_configuration(config);

    agent.add_idle_call(clock_idle);

    // Block until the broker accepts us; refused connections retry forever.
    agent.connect(0).await?;

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    info!("clock service started");

    loop {
        tokio::select! {
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigquit.recv() => {
                info!("received SIGQUIT, shutting down");
                break;
            }
            _ = sleep(TICK) => {
                let report = agent.idle().await;
                for call_error in report.call_errors() {
                    warn!(index = call_error.index, error = %call_error.error, "idle call failed");
                }
                if let Some(e) = report.poll_error() {
                    warn!(error = %e, "network poll failed");
                }
            }
        }
    }

    agent.close().await;
    info!("clock service stopped");
    Ok(())
}

/// Publish one value; failures are logged and counted, never fatal.
fn send_value(
    core: &mut AgentCore<RumqttTransport>,
    topic: &str,
    payload: &str,
    failures: &mut u32,
) {
    let message = match Message::new(topic, payload, 2, false) {
        Ok(message) => message,
        Err(e) => {
            error!(topic, error = %e, "cannot build message");
            *failures += 1;
            return;
        }
    };

    if let Err(e) = core.publish(&message) {
        error!(topic, error = %e, "publish failed");
        *failures += 1;
    }
}

fn clock_idle(
    state: &mut ClockState,
    core: &mut AgentCore<RumqttTransport>,
) -> Result<(), IdleError> {
    let now = Local::now();
    let mut failures = 0u32;

    if state.last_minute != Some(now.minute()) {
        send_value(
            core,
            &format!("{TOPIC_ROOT}/wallclock/year"),
            &format!("{:04}", now.year()),
            &mut failures,
        );
        send_value(
            core,
            &format!("{TOPIC_ROOT}/wallclock/month"),
            &format!("{:02}", now.month()),
            &mut failures,
        );
        send_value(
            core,
            &format!("{TOPIC_ROOT}/wallclock/day"),
            &format!("{:02}", now.day()),
            &mut failures,
        );
        send_value(
            core,
            &format!("{TOPIC_ROOT}/wallclock/hour"),
            &format!("{:02}", now.hour()),
            &mut failures,
        );
        send_value(
            core,
            &format!("{TOPIC_ROOT}/wallclock/minute"),
            &format!("{:02}", now.minute()),
            &mut failures,
        );
        state.last_minute = Some(now.minute());
    }

    if state.last_second != Some(now.second()) {
        send_value(
            core,
            &format!("{TOPIC_ROOT}/wallclock/second"),
            &format!("{:02}", now.second()),
            &mut failures,
        );
        send_value(
            core,
            &format!("{TOPIC_ROOT}/unixtime"),
            &now.timestamp().to_string(),
            &mut failures,
        );
        state.last_second = Some(now.second());
    }

    if failures > 0 {
        return Err(IdleError::failed(format!("{failures} publish(es) failed")));
    }
    Ok(())
}
