//! Polycache command-line front end
//!
//! Runs a single cache command against the backend selected by the
//! environment (see `Config::from_env`).

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use polycache::{Cache, Config, Value};

/// Polycache - one cache API over memory, sled and Redis
#[derive(Debug, Parser)]
#[command(name = "polycache", version, about, long_about = None)]
struct Cli {
    /// Command to run
    #[command(subcommand)]
    command: Command,
}

/// Cache commands
#[derive(Debug, Subcommand)]
enum Command {
    /// Print the value stored under a key
    Get { key: String },
    /// Store a value, optionally expiring after `ttl` seconds
    Set {
        key: String,
        /// Integer, float, boolean, JSON object/array or plain string
        #[arg(allow_hyphen_values = true)]
        value: String,
        /// Lifetime in seconds, 0 or absent never expires
        ttl: Option<u64>,
    },
    /// Delete a key
    Remove { key: String },
    /// Add to a counter (default 1) and print the result
    Incr {
        key: String,
        #[arg(allow_negative_numbers = true)]
        by: Option<i64>,
    },
    /// Subtract from a counter (default 1) and print the result
    Decr {
        key: String,
        #[arg(allow_negative_numbers = true)]
        by: Option<i64>,
    },
    /// Print the counter stored under a key
    Number { key: String },
    /// Remove every key
    Flush,
}

fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polycache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("Invalid configuration")?;
    debug!(?config, "Configuration loaded");

    let cache = Cache::from_config(&config).context("Failed to open cache")?;
    let outcome = run(&cache, cli.command);
    cache.close().context("Failed to close cache")?;

    if let Some(output) = outcome? {
        println!("{output}");
    }
    Ok(())
}

/// Executes one command, returning what should be printed.
fn run(cache: &Cache, command: Command) -> anyhow::Result<Option<String>> {
    let output = match command {
        Command::Get { key } => Some(render(&cache.get(&key)?)?),
        Command::Set { key, value, ttl } => {
            let ttl = Duration::from_secs(ttl.unwrap_or(0));
            cache.set_with_expiration(&key, parse_value(&value), ttl)?;
            None
        }
        Command::Remove { key } => {
            cache.remove(&key)?;
            None
        }
        Command::Incr { key, by } => Some(cache.increment_by(&key, by.unwrap_or(1))?.to_string()),
        Command::Decr { key, by } => Some(cache.decrement_by(&key, by.unwrap_or(1))?.to_string()),
        Command::Number { key } => Some(cache.number(&key)?.to_string()),
        Command::Flush => {
            cache.flush()?;
            info!("Cache flushed");
            None
        }
    };
    Ok(output)
}

/// Interprets a command-line argument as the most specific value it spells.
fn parse_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Int(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    if let Ok(b) = raw.parse::<bool>() {
        return Value::Bool(b);
    }
    if raw.starts_with('{') || raw.starts_with('[') {
        if let Ok(json) = serde_json::from_str(raw) {
            return Value::from_json(json);
        }
    }
    Value::from(raw)
}

fn render(value: &Value) -> anyhow::Result<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Ok(serde_json::to_string(&other.to_json()?)?),
    }
}
