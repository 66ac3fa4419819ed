//! Bitget Copy-Trade Notifier
//!
//! Watches one Bitget copy-trading trader and posts Telegram messages when
//! positions open, close, or turn up in history after closing unseen.

mod api;
mod bot;
mod error;
mod health;
mod models;
mod tracking;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{
    mask, BitgetClient, BitgetCredentials, Notifier, PositionFeed, TelegramNotifier,
    HISTORY_ORDERS_PATH,
};
use crate::bot::{Bot, BotConfig};
use crate::tracking::{format_test_message, TrackerConfig};

/// Bitget copy-trade notifier CLI.
#[derive(Parser)]
#[command(name = "copynotify")]
#[command(about = "Send Telegram notifications for a Bitget copy trader's positions", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "LOG_LEVEL", global = true)]
    log_level: String,

    #[command(flatten)]
    credentials: CredentialArgs,

    #[command(flatten)]
    tuning: TuningArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Secrets and identities, usually supplied through the environment.
#[derive(Args, Debug)]
struct CredentialArgs {
    /// Bitget API key
    #[arg(long, env = "BITGET_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Bitget API secret
    #[arg(long, env = "BITGET_SECRET_KEY", hide_env_values = true, global = true)]
    secret_key: Option<String>,

    /// Bitget API passphrase
    #[arg(long, env = "BITGET_PASSPHRASE", hide_env_values = true, global = true)]
    passphrase: Option<String>,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true, global = true)]
    telegram_bot_token: Option<String>,

    /// Telegram chat receiving the notifications
    #[arg(long, env = "TELEGRAM_CHAT_ID", global = true)]
    telegram_chat_id: Option<String>,

    /// Trader whose positions are announced
    #[arg(long, env = "TRADER_ID", global = true)]
    trader_id: Option<String>,
}

/// Timing and memory limits.
#[derive(Args, Debug)]
struct TuningArgs {
    /// Polling interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "10", global = true)]
    interval: u64,

    /// Wait after a failed poll, in seconds
    #[arg(long, env = "BACKOFF_INTERVAL_SECS", default_value = "60", global = true)]
    backoff: u64,

    /// History reconciliation cadence in seconds
    #[arg(long, env = "RECONCILE_INTERVAL_SECS", default_value = "300", global = true)]
    reconcile: u64,

    /// Number of recent history records checked per reconciliation
    #[arg(long, env = "HISTORY_WINDOW", default_value = "20", global = true)]
    history_window: usize,

    /// Prune closed ids once more than this many are held
    #[arg(long, env = "CLOSED_CEILING", default_value = "100", global = true)]
    closed_ceiling: usize,

    /// Closed ids kept after pruning
    #[arg(long, env = "CLOSED_RETAIN", default_value = "50", global = true)]
    closed_retain: usize,

    /// Timeout for every HTTP call, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30", global = true)]
    timeout: u64,

    /// Bitget endpoint serving closed copy-trading orders
    #[arg(long, env = "BITGET_HISTORY_PATH", default_value = HISTORY_ORDERS_PATH, global = true)]
    history_path: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring
    Run {
        /// Health endpoint port
        #[arg(short, long, env = "PORT", default_value = "10000")]
        port: u16,

        /// Do not start the health endpoint
        #[arg(long)]
        no_health: bool,

        /// Announce positions that are already open at startup
        #[arg(long)]
        no_seed: bool,

        /// Send a message when monitoring starts
        #[arg(long)]
        announce: bool,
    },

    /// Check settings, exchange access and Telegram delivery
    Check,

    /// Show current configuration
    Config,
}

fn require(name: &str, value: &Option<String>) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .with_context(|| format!("{name} not set"))
}

impl CredentialArgs {
    fn bitget(&self) -> Result<BitgetCredentials> {
        Ok(BitgetCredentials {
            api_key: require("BITGET_API_KEY", &self.api_key)?,
            secret_key: require("BITGET_SECRET_KEY", &self.secret_key)?,
            passphrase: require("BITGET_PASSPHRASE", &self.passphrase)?,
        })
    }

    fn telegram(&self, timeout: Duration) -> Result<TelegramNotifier> {
        TelegramNotifier::new(
            require("TELEGRAM_BOT_TOKEN", &self.telegram_bot_token)?,
            require("TELEGRAM_CHAT_ID", &self.telegram_chat_id)?,
            timeout,
        )
    }

    fn status(&self) -> Vec<(&'static str, bool)> {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        vec![
            ("BITGET_API_KEY", set(&self.api_key)),
            ("BITGET_SECRET_KEY", set(&self.secret_key)),
            ("BITGET_PASSPHRASE", set(&self.passphrase)),
            ("TELEGRAM_BOT_TOKEN", set(&self.telegram_bot_token)),
            ("TELEGRAM_CHAT_ID", set(&self.telegram_chat_id)),
            ("TRADER_ID", set(&self.trader_id)),
        ]
    }
}

impl TuningArgs {
    fn bot_config(&self, trader_id: String) -> BotConfig {
        BotConfig {
            tracker: TrackerConfig {
                trader_id,
                history_window: self.history_window,
                closed_ceiling: self.closed_ceiling,
                closed_retain: self.closed_retain,
            },
            poll_interval: Duration::from_secs(self.interval),
            backoff_interval: Duration::from_secs(self.backoff),
            reconcile_interval: Duration::from_secs(self.reconcile),
            request_timeout: Duration::from_secs(self.timeout),
            ..BotConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run {
            port,
            no_health,
            no_seed,
            announce,
        } => {
            let trader_id = require("TRADER_ID", &cli.credentials.trader_id)?;
            let config = BotConfig {
                seed_on_start: !no_seed,
                announce_start: announce,
                ..cli.tuning.bot_config(trader_id.clone())
            };
            config.validate()?;

            let feed = BitgetClient::new(cli.credentials.bitget()?, config.request_timeout)?
                .with_history_path(cli.tuning.history_path.clone());
            let notifier = cli.credentials.telegram(config.request_timeout)?;

            info!(trader = %trader_id, "Starting copy-trade notifier");

            let mut bot = Bot::new(config.clone(), feed, notifier);
            if !no_health {
                let stats = bot.stats_handle();
                tokio::spawn(async move {
                    if let Err(e) = health::serve(port, stats).await {
                        error!(error = %e, "Health endpoint failed");
                    }
                });
            }

            bot.initialize().await;

            println!("\n=== Bitget Copy-Trade Notifier ===");
            println!("Trader:             {}", trader_id);
            println!("Polling interval:   {}s", config.poll_interval.as_secs());
            println!("Backoff interval:   {}s", config.backoff_interval.as_secs());
            println!("Reconcile every:    {}s", config.reconcile_interval.as_secs());
            if no_health {
                println!("Health endpoint:    disabled");
            } else {
                println!("Health endpoint:    http://0.0.0.0:{}/", port);
            }
            println!("\nPress Ctrl+C to stop.\n");

            bot.run().await;

            let stats = bot.stats_handle().read().await.clone();
            println!("\n{}", stats);
        }

        Commands::Check => {
            let timeout = Duration::from_secs(cli.tuning.timeout);

            println!("\n=== Settings ===");
            for (name, set) in cli.credentials.status() {
                println!("  {:<20} {}", name, if set { "✅ Set" } else { "❌ Missing" });
            }

            let bitget_status = match cli.credentials.bitget() {
                Ok(creds) => match BitgetClient::new(creds, timeout)?.fetch_open_positions().await {
                    Ok(positions) => format!("✅ Connected ({} open positions)", positions.len()),
                    Err(e) => format!("❌ Error: {}", e),
                },
                Err(e) => format!("❌ {}", e),
            };

            let telegram_status = match cli.credentials.telegram(timeout) {
                Ok(notifier) => match notifier.deliver(&format_test_message()).await {
                    Ok(()) => "✅ Connected".to_string(),
                    Err(e) => format!("❌ Error: {}", e),
                },
                Err(e) => format!("❌ {}", e),
            };

            println!("\n=== Connectivity ===");
            println!("  Bitget API:          {}", bitget_status);
            println!("  Telegram:            {}", telegram_status);
            println!(
                "  Trader ID:           {}",
                cli.credentials.trader_id.as_deref().unwrap_or("Not set")
            );
        }

        Commands::Config => {
            let creds = &cli.credentials;
            let shown = |v: &Option<String>| v.as_deref().map(mask).unwrap_or_else(|| "Not set".to_string());
            let config = cli
                .tuning
                .bot_config(creds.trader_id.clone().unwrap_or_default());

            println!("\n=== Notifier Configuration ===\n");
            println!("Credentials:");
            println!("  Bitget API Key:       {}", shown(&creds.api_key));
            println!("  Bitget Secret:        {}", shown(&creds.secret_key));
            println!("  Bitget Passphrase:    {}", shown(&creds.passphrase));
            println!("  Telegram Token:       {}", shown(&creds.telegram_bot_token));
            println!(
                "  Telegram Chat:        {}",
                creds.telegram_chat_id.as_deref().unwrap_or("Not set")
            );
            println!(
                "  Trader ID:            {}",
                creds.trader_id.as_deref().unwrap_or("Not set")
            );

            println!("\nTiming:");
            println!("  Poll Interval:        {}s", config.poll_interval.as_secs());
            println!("  Backoff Interval:     {}s", config.backoff_interval.as_secs());
            println!("  Reconcile Interval:   {}s", config.reconcile_interval.as_secs());
            println!("  Request Timeout:      {}s", config.request_timeout.as_secs());
            println!("  History Endpoint:     {}", cli.tuning.history_path);

            println!("\nTracking:");
            println!("  History Window:       {}", config.tracker.history_window);
            println!("  Closed Ceiling:       {}", config.tracker.closed_ceiling);
            println!("  Closed Retain:        {}", config.tracker.closed_retain);

            if let Err(e) = config.validate() {
                println!("\n⚠️  {}", e);
            }
        }
    }

    Ok(())
}
