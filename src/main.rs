//! Binary entrypoint for the Heistline CLI.
//!
//! Commands:
//! - `start [--bind <addr>] [--memory]` - run the game server
//! - `init` - create a starter `config.toml`
//! - `status` - print a summary of stored profiles and the configured world
//!
//! See the library crate docs for module-level details: `heistline::`.
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use heistline::config::Config;
use heistline::game::{ProfileStore, SledProfileStore};
use heistline::server::GameServer;

#[derive(Parser)]
#[command(name = "heistline")]
#[command(about = "A multiplayer text game server: rob banks, travel, chat")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the game server
    Start {
        /// Listen address, overriding `[server].bind_addr`
        #[arg(short, long)]
        bind: Option<String>,

        /// Keep profiles in memory instead of the sled store
        #[arg(long)]
        memory: bool,
    },
    /// Write a default configuration file
    Init,
    /// Show stored profiles and the configured world
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { bind, memory } => {
            let config = Config::load(&cli.config).await?;
            init_logging(Some(&config), cli.verbose);
            info!("Starting Heistline v{}", env!("CARGO_PKG_VERSION"));

            let bind_addr = bind.unwrap_or_else(|| config.server.bind_addr.clone());
            if memory {
                info!("Using in-memory profile store; nothing will persist");
            }
            let server = Arc::new(GameServer::from_config(config, memory)?);
            server.run(&bind_addr).await?;
        }
        Commands::Init => {
            init_logging(None, cli.verbose);
            info!("Initializing new Heistline configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            init_logging(Some(&config), cli.verbose);
            show_status(&config)?;
        }
    }

    Ok(())
}

fn show_status(config: &Config) -> Result<()> {
    let path = std::path::Path::new(&config.storage.data_dir).join("profiles");
    let store = SledProfileStore::open(&path)
        .with_context(|| format!("failed to open profile store at {}", path.display()))?;
    let profiles = store.list_profiles()?;
    let with_tokens = profiles
        .iter()
        .filter(|(_, p)| !p.push_tokens.is_empty())
        .count();

    println!("{} v{}", config.server.name, env!("CARGO_PKG_VERSION"));
    println!("Bind address: {}", config.server.bind_addr);
    println!("Profiles: {} ({} with push tokens)", profiles.len(), with_tokens);
    println!("Locations:");
    for loc in &config.game.locations {
        println!("  {:<12} ${}", loc.name, loc.cost);
    }
    println!(
        "Push delivery: {}",
        if config.push.enabled { config.push.endpoint.as_str() } else { "disabled (log only)" }
    );
    Ok(())
}

fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Background runs redirect stdout; only echo to the console on a TTY
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
