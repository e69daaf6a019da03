use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use bossbar::bootstrap;
use bossbar::cache::{metrics, CacheClient, SetOptions};
use bossbar::config::AppConfig;

/// Bossbar cache admin tool
#[derive(Parser, Debug)]
#[command(name = "bossbar")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and report adapter and circuit state
    Check,
    /// Print a value as stored
    Get { key: String },
    /// Store a string value
    Set {
        key: String,
        value: String,
        /// Expiry in seconds (0 = never)
        #[arg(long, default_value_t = 0)]
        ttl: u64,
    },
    /// Delete a key
    Del { key: String },
    /// Increment a counter
    Incr {
        key: String,
        #[arg(long, default_value_t = 1)]
        by: i64,
    },
    /// Delete every key in the configured namespace
    Clear,
    /// Print cache metrics in Prometheus text format
    Metrics,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = AppConfig::from_file(&args.config)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    config.validate().map_err(anyhow::Error::msg)?;

    if args.test {
        println!(
            "Configuration {} is valid (adapter: {})",
            args.config.display(),
            config.cache.adapter
        );
        return Ok(());
    }

    let command = args.command.unwrap_or(Command::Check);
    // admin commands are pointless without a cache, so startup failure is fatal
    let client = bootstrap::init(&config, true)
        .await
        .context("Failed to initialize cache")?;

    tracing::info!(
        config_file = %args.config.display(),
        adapter = %config.cache.adapter,
        command = ?command,
        "Running admin command"
    );

    execute(&client, &config, command).await
}

async fn execute(client: &CacheClient, config: &AppConfig, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Check => {
            println!("adapter:    {}", config.cache.adapter);
            println!("prefix:     {}", config.cache.redis_prefix);
            println!("configured: {}", client.is_configured());
            println!("circuit:    {}", client.breaker_state());
            if !client.is_configured() {
                bail!("cache is not configured");
            }
        }
        Command::Get { key } => match client.get_raw(&key).await? {
            Some(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
            None => bail!("key {:?} not found", key),
        },
        Command::Set { key, value, ttl } => {
            let options = SetOptions::default().expire_secs(ttl);
            client.set_raw(&key, value.as_bytes(), options).await?;
            println!("OK");
        }
        Command::Del { key } => {
            client.delete(&key).await?;
            println!("OK");
        }
        Command::Incr { key, by } => {
            println!("{}", client.incr_by(&key, by).await?);
        }
        Command::Clear => {
            client.clear_all().await?;
            println!("OK");
        }
        Command::Metrics => {
            print!("{}", metrics::render_text());
        }
    }
    Ok(())
}
