use anyhow::Result;
use clap::Parser;
use log::{info, warn, LevelFilter};

mod command;
mod config;
mod dispatcher;
mod error;
mod interpreter;
mod message;
mod node;
mod pixel_format;
mod protocol;
mod radio;
mod routing;
mod serial;
mod strip;

use config::{Config, Role};
use node::Node;

#[derive(Parser)]
#[command(name = "led_relay")]
#[command(
    about = "LED relay - serial commands to LED boxes over the radio",
    long_about = None
)]
struct Cli {
    /// Path to configuration file (JSON)
    config: String,

    /// Override the role set in the configuration
    #[arg(long, value_enum)]
    role: Option<Role>,

    /// Enable debug output (every command and frame)
    #[arg(long)]
    debug: bool,

    /// Enable detailed debug (hex dumps every frame)
    #[arg(long)]
    ddebug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ddebug implies debug
    let level = if cli.ddebug {
        LevelFilter::Trace
    } else if cli.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let mut config = Config::load(&cli.config)?;
    if let Some(role) = cli.role {
        config.role = role;
    }

    let node = Node::new(config)?;

    // Set up Ctrl-C handler with graceful shutdown
    let running = node.get_running_flag();
    let result = ctrlc::set_handler(move || {
        info!("Shutting down...");
        running.store(false, std::sync::atomic::Ordering::Relaxed);
    });

    if let Err(e) = result {
        warn!("Could not set Ctrl-C handler: {}", e);
    }

    // Run node (blocks until shutdown)
    node.run()?;

    info!("✓ Node stopped");
    Ok(())
}
