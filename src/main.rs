//! AnySound Deck - console runner
//!
//! Drives the deck buttons against the automation service with a terminal
//! standing in for the deck application.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use anysound_deck::config::AppConfig;
use anysound_deck::console::{self, parse_command, Command, ConsoleHost, HELP};
use anysound_deck::dispatcher::Dispatcher;
use anysound_deck::events::EventBus;
use anysound_deck::host::{DeckHost, HostEvent};
use anysound_deck::registry::{DeviceRegistry, Direction, PollSettings};
use anysound_deck::service::{CallPolicy, ServiceClient};
use anysound_deck::transport::HttpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// AnySound Deck - deck buttons for the local audio automation service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Also write logs to a daily rolling file
    #[arg(long)]
    log_to_file: bool,

    /// Directory for log files (implies --log-to-file)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let _log_guard = init_logging(&args)?;

    info!("Starting AnySound Deck v{}...", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => {
            info!("Configuration file: {}", path);
            AppConfig::load(path).await?
        }
        None => {
            info!("No configuration file given, using defaults");
            AppConfig::default()
        }
    };
    let config = Arc::new(config);
    info!("Automation service: {}", config.api.base_url);

    let transport = HttpTransport::new(&config.api.base_url)
        .context("Failed to create HTTP transport")?;
    let client = ServiceClient::new(Arc::new(transport), CallPolicy::from_config(&config.api));
    let registry = DeviceRegistry::new(
        client,
        EventBus::new(),
        PollSettings::from_config(&config.polling),
    );

    let host: Arc<dyn DeckHost> = Arc::new(ConsoleHost::new());
    let dispatcher = Dispatcher::new(host, Arc::clone(&registry), Arc::clone(&config));

    run_app(dispatcher, config, shutdown_signal()).await?;

    registry.stop_polling();
    info!("AnySound Deck shutdown complete");
    Ok(())
}

async fn run_app(
    dispatcher: Dispatcher,
    config: Arc<AppConfig>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let (line_tx, mut line_rx) = mpsc::channel::<String>(64);
    console::spawn_repl(line_tx).context("Failed to start console")?;

    dispatcher.handle(HostEvent::Connected);
    spawn_connect(dispatcher.registry());

    println!("{}", "=== AnySound Deck ===".bold().cyan());
    println!("Type 'help' for commands\n");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(line) = line_rx.recv() => {
                match parse_command(&line, &config.plugin.uuid) {
                    Ok(Command::Event(event)) => {
                        if dispatcher.handle(event).is_close() {
                            break;
                        }
                    }
                    Ok(Command::Status) => print_status(&dispatcher),
                    Ok(Command::Reconnect) => spawn_connect(dispatcher.registry()),
                    Ok(Command::Help) => println!("{}", HELP),
                    Ok(Command::Quit) => {
                        dispatcher.handle(HostEvent::Close);
                        break;
                    }
                    Err(message) if message.is_empty() => {}
                    Err(message) => println!("{}", message.red()),
                }
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                dispatcher.handle(HostEvent::Close);
                break;
            }
        }
    }

    Ok(())
}

/// Run the connect sequence in the background
fn spawn_connect(registry: &Arc<DeviceRegistry>) {
    let registry = Arc::clone(registry);
    tokio::spawn(async move {
        match registry.connect().await {
            Ok(()) => info!("✅ Connected to automation service"),
            Err(e) => warn!(
                "⚠️  Automation service unavailable ({}), type 'reconnect' to retry",
                e
            ),
        }
    });
}

fn print_status(dispatcher: &Dispatcher) {
    let registry = dispatcher.registry();

    println!("\n{}", "Service:".bold());
    println!("  State: {:?}", registry.connection_state());
    println!("  Polling: {}", registry.is_polling());

    for direction in Direction::ALL {
        let status = registry.status(direction);
        println!("\n{}", format!("{}:", direction).bold());
        if status.devices.is_empty() {
            println!("  {}", "No devices".dimmed());
        }
        for device in &status.devices {
            let active = status.active_index == Some(device.index);
            let marker = if active { "●".green() } else { "○".dimmed() };
            println!(
                "  {} [{}] {} {}",
                marker,
                device.index,
                device.name,
                device.uid.as_deref().unwrap_or("-").dimmed()
            );
        }
        if status.muted {
            println!("  {}", "muted".yellow());
        }
    }

    println!("\n{}", "Buttons:".bold());
    let contexts = dispatcher.contexts();
    if contexts.is_empty() {
        println!("  {}", "None".dimmed());
    }
    for (context, kind) in contexts {
        println!("  {} {}", context.bright_white(), kind.to_string().cyan());
    }
    println!();
}

/// Console (text or JSON) plus an optional daily rolling file.
/// The returned guard must live until exit so buffered lines are flushed.
fn init_logging(args: &Args) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let log_dir = match (&args.log_dir, args.log_to_file) {
        (Some(dir), _) => Some(dir.clone()),
        (None, true) => Some(default_log_dir()),
        (None, false) => None,
    };

    let (file_writer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(&dir, "anysound-deck.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match args.log_format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .with(file_writer.map(|w| fmt::layer().with_ansi(false).with_writer(w)))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json())
            .with(file_writer.map(|w| fmt::layer().json().with_writer(w)))
            .init(),
    }

    Ok(guard)
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("anysound-deck")
        .join("logs")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
