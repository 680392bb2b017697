mod api;
mod config;
mod config_wizard;
mod control;
mod dispatcher;
mod logging;
mod protocol;
mod registry;
mod tasks;
mod transport;

use clap::{Parser, Subcommand};
use crate::config::{AppConfig, LoggingConfig};
use console::style;
use control::Controller;
use dispatcher::Dispatcher;
use protocol::{Command, StatusCategory, Verb};
use registry::Registry;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use transport::TcpTransport;

/// ScriptDeck - start, stop and watch scripts on remote machines from one panel
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (TOML format)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll every configured script and serve the control API (default)
    Serve,
    /// Send a single command to a supervisor and print the reply
    Send {
        /// Supervisor address
        #[arg(long)]
        host: String,
        /// Supervisor port
        #[arg(short, long, default_value_t = 5005)]
        port: u16,
        verb: Verb,
        /// Script command line sent as the payload
        payload: String,
    },
    /// Create a configuration file interactively
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&args.config).await,
        Commands::Send {
            host,
            port,
            verb,
            payload,
        } => send_once(&host, port, verb, payload).await,
        Commands::Init => {
            let content = config_wizard::run_config_wizard(&args.config)?;
            config_wizard::write_config_file(&args.config, &content)?;
            println!("Configuration written to {}", args.config.display());
            Ok(())
        }
    }
}

/// Load the config, offering the wizard when the file is missing and we have a terminal
fn load_or_create_config(path: &Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    if !path.exists() {
        if !config_wizard::is_interactive() {
            return Err(format!(
                "Config file '{}' not found. Run `scriptdeck init` to create one.",
                path.display()
            )
            .into());
        }
        if !config_wizard::prompt_create_config(path)? {
            return Err("No configuration file, exiting".into());
        }
        let content = config_wizard::run_config_wizard(path)?;
        config_wizard::write_config_file(path, &content)?;
    }

    Ok(AppConfig::load(path)?)
}

async fn serve(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let app_config = load_or_create_config(config_path)?;
    logging::init_logging(&app_config.logging)?;

    info!("Configuration loaded successfully from: {:?}", config_path);
    info!(
        "Monitoring {} script(s) on {} host(s)",
        app_config.target_count(),
        app_config.hosts.len()
    );
    for host in &app_config.hosts {
        info!("  - {} ({}:{})", host.name, host.address, host.port);
    }

    let allowed_clients = app_config
        .server
        .allowed_clients
        .iter()
        .map(|c| c.parse::<IpAddr>())
        .collect::<Result<Vec<_>, _>>()?;

    let registry = Arc::new(Registry::from_hosts(&app_config.hosts));
    let dispatcher = Dispatcher::new(Arc::new(TcpTransport));
    let controller = Arc::new(Controller::new(registry, dispatcher));
    controller.start_polling();
    info!("{} status poller(s) running", controller.active_pollers());

    let static_dir = app_config.server.static_dir.as_ref().map(PathBuf::from);
    let router = api::create_router(Arc::clone(&controller), &allowed_clients, static_dir);

    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Control API listening on http://{}", addr);

    if let Err(e) = api::serve_until(listener, router, controller, shutdown_signal()).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn send_once(
    host: &str,
    port: u16,
    verb: Verb,
    payload: String,
) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&LoggingConfig {
        level: "warn".to_string(),
        file: None,
    })?;

    let dispatcher = Dispatcher::new(Arc::new(TcpTransport));
    let reply = dispatcher
        .send(host, port, &Command::new(verb, payload))
        .await;

    let styled = match StatusCategory::classify(&reply) {
        StatusCategory::Running => style(&reply).green(),
        StatusCategory::NotRunning => style(&reply).red(),
        StatusCategory::Unknown => style(&reply),
    };
    println!("{}", styled);

    if reply.starts_with("Error:") {
        std::process::exit(1);
    }
    Ok(())
}
