//! Scheduled Jupiter Swap Bot
//!
//! Periodically swaps a fixed amount of one token for another through the
//! Jupiter aggregator on Solana, capped at a number of swaps per UTC day,
//! and reports each outcome to a webhook.

mod api;
mod bot;
mod models;
mod notify;
mod trading;
mod wallet;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::api::{JupiterClient, RpcClient, JUPITER_URL, MAINNET_RPC_URL};
use crate::bot::{Bot, BotConfig, TickOutcome};
use crate::models::short_mint;
use crate::notify::{Notification, WebhookConfig, WebhookFormat, WebhookNotifier};
use crate::trading::{SwapConfig, SwapExecutor, USDC_MINT, WSOL_MINT};
use crate::wallet::Wallet;

const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Scheduled Jupiter swap bot CLI.
#[derive(Parser)]
#[command(name = "solswap")]
#[command(about = "Swap a fixed amount on Jupiter at a fixed interval, with a daily cap", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Solana RPC endpoint
    #[arg(long, env = "RPC_URL", default_value = MAINNET_RPC_URL)]
    rpc_url: String,

    /// Jupiter swap API base URL
    #[arg(long, env = "JUPITER_API_URL", default_value = JUPITER_URL)]
    jupiter_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the swap loop
    Run {
        #[command(flatten)]
        swap: SwapArgs,

        #[command(flatten)]
        schedule: ScheduleArgs,

        #[command(flatten)]
        webhook: WebhookArgs,
    },

    /// Run a single iteration now (ignores the daily cap)
    Once {
        #[command(flatten)]
        swap: SwapArgs,

        /// Attempts before giving up
        #[arg(long, env = "MAX_ATTEMPTS", default_value = "3")]
        max_attempts: u32,

        /// Seconds to wait between attempts
        #[arg(long, env = "RETRY_DELAY_SECS", default_value = "10")]
        retry_delay: u64,

        #[command(flatten)]
        webhook: WebhookArgs,
    },

    /// Fetch and print a quote without trading
    Quote {
        #[command(flatten)]
        swap: SwapArgs,
    },

    /// Print the wallet address
    Address,

    /// Print the wallet SOL balance
    Balance,

    /// Show the effective configuration
    Config {
        #[command(flatten)]
        swap: SwapArgs,

        #[command(flatten)]
        schedule: ScheduleArgs,

        #[command(flatten)]
        webhook: WebhookArgs,
    },
}

#[derive(Args, Clone)]
struct SwapArgs {
    /// Mint to sell
    #[arg(long, env = "INPUT_MINT", default_value = USDC_MINT)]
    input_mint: String,

    /// Mint to buy
    #[arg(long, env = "OUTPUT_MINT", default_value = WSOL_MINT)]
    output_mint: String,

    /// Amount of the input mint to sell, in base units
    #[arg(short, long, env = "SWAP_AMOUNT")]
    amount: u64,

    /// Slippage tolerance in basis points
    #[arg(long, env = "SLIPPAGE_BPS", default_value = "50")]
    slippage_bps: u16,

    /// Only use single-hop routes
    #[arg(long, env = "ONLY_DIRECT_ROUTES")]
    only_direct_routes: bool,

    /// Reject quotes with a larger price impact (percent, 0 disables)
    #[arg(long, env = "MAX_PRICE_IMPACT_PCT", default_value = "1.0")]
    max_price_impact: f64,

    /// Fixed priority fee in lamports (Jupiter decides when unset)
    #[arg(long, env = "PRIORITY_FEE_LAMPORTS")]
    priority_fee: Option<u64>,

    /// Skip RPC preflight checks on submit
    #[arg(long, env = "SKIP_PREFLIGHT")]
    skip_preflight: bool,

    /// Seconds the RPC node may stay unreachable while confirming
    #[arg(long, env = "CONFIRM_TIMEOUT_SECS", default_value = "60")]
    confirm_timeout: u64,

    /// Sign and simulate only, never submit
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,
}

impl SwapArgs {
    fn into_config(self) -> Result<SwapConfig> {
        let max_price_impact_pct = if self.max_price_impact > 0.0 {
            Some(Decimal::try_from(self.max_price_impact).context("Invalid max price impact")?)
        } else {
            None
        };

        let config = SwapConfig {
            input_mint: self.input_mint,
            output_mint: self.output_mint,
            amount: self.amount,
            slippage_bps: self.slippage_bps,
            only_direct_routes: self.only_direct_routes,
            max_price_impact_pct,
            priority_fee_lamports: self.priority_fee,
            skip_preflight: self.skip_preflight,
            confirm_timeout_secs: self.confirm_timeout,
            dry_run: self.dry_run,
            ..SwapConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Clone)]
struct ScheduleArgs {
    /// Seconds between iterations
    #[arg(short, long, env = "SWAP_INTERVAL_SECS", default_value = "3600")]
    interval: u64,

    /// Swaps allowed per UTC day
    #[arg(long, env = "MAX_TRADES_PER_DAY", default_value = "1",
          value_parser = clap::value_parser!(u32).range(1..))]
    max_trades_per_day: u32,

    /// Attempts per iteration before giving up
    #[arg(long, env = "MAX_ATTEMPTS", default_value = "3")]
    max_attempts: u32,

    /// Seconds to wait between attempts
    #[arg(long, env = "RETRY_DELAY_SECS", default_value = "10")]
    retry_delay: u64,
}

impl ScheduleArgs {
    fn to_config(&self) -> BotConfig {
        BotConfig {
            interval: Duration::from_secs(self.interval),
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_secs(self.retry_delay),
            max_trades_per_day: self.max_trades_per_day,
        }
    }
}

#[derive(Args, Clone)]
struct WebhookArgs {
    /// Webhook URL for status notifications
    #[arg(long, env = "WEBHOOK_URL", hide_env_values = true)]
    webhook_url: Option<String>,

    /// Payload format (discord, slack, json)
    #[arg(long, env = "WEBHOOK_FORMAT", default_value = "discord")]
    webhook_format: WebhookFormat,

    /// Display name used in the webhook message
    #[arg(long, env = "WEBHOOK_USERNAME", default_value = "solswap")]
    webhook_username: String,
}

impl WebhookArgs {
    fn to_notifier(&self) -> Result<WebhookNotifier> {
        WebhookNotifier::new(WebhookConfig {
            url: self.webhook_url.clone(),
            format: self.webhook_format,
            username: self.webhook_username.clone(),
        })
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

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run {
            swap,
            schedule,
            webhook,
        } => {
            let swap_config = swap.into_config()?;
            let bot_config = schedule.to_config();
            let wallet = Wallet::from_env()?;
            let wallet_address = wallet.pubkey();
            let notifier = webhook.to_notifier()?;

            info!(
                wallet = %wallet_address,
                amount = swap_config.amount,
                interval = schedule.interval,
                max_trades_per_day = schedule.max_trades_per_day,
                dry_run = swap_config.dry_run,
                webhook = notifier.is_enabled(),
                "Starting swap bot"
            );

            let executor =
                build_executor(&cli.rpc_url, &cli.jupiter_url, swap_config.clone(), wallet)?;

            println!("\n=== Jupiter Swap Bot ===");
            println!("Wallet:           {}", wallet_address);
            println!(
                "Swap:             {} {} -> {}",
                swap_config.amount,
                short_mint(&swap_config.input_mint),
                short_mint(&swap_config.output_mint)
            );
            println!("Interval:         {}s", schedule.interval);
            println!("Max trades/day:   {}", schedule.max_trades_per_day);
            println!(
                "Mode:             {}",
                if swap_config.dry_run { "DRY RUN (simulate only)" } else { "LIVE TRADING" }
            );
            println!("\nPress Ctrl+C to stop.\n");

            let mut bot = Bot::new(bot_config, executor, notifier).announce(Notification::Started {
                wallet: wallet_address.clone(),
                input_mint: swap_config.input_mint.clone(),
                output_mint: swap_config.output_mint.clone(),
                amount: swap_config.amount,
                max_trades_per_day: schedule.max_trades_per_day,
                interval_secs: schedule.interval,
                dry_run: swap_config.dry_run,
            });

            let shutdown = bot.shutdown_handle();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutdown signal received");
                shutdown.trigger();
            });

            if let Err(e) = bot.run().await {
                tracing::error!(error = %e, "Bot error");
            }
            info!(trades_today = bot.trades_today(), "Swap bot stopped");
        }

        Commands::Once {
            swap,
            max_attempts,
            retry_delay,
            webhook,
        } => {
            let swap_config = swap.into_config()?;
            let wallet = Wallet::from_env()?;
            let executor = build_executor(&cli.rpc_url, &cli.jupiter_url, swap_config, wallet)?;

            let bot_config = BotConfig {
                max_attempts,
                retry_delay: Duration::from_secs(retry_delay),
                ..BotConfig::default()
            };
            let mut bot = Bot::new(bot_config, executor, webhook.to_notifier()?);

            match bot.attempt_swap().await {
                TickOutcome::Executed(receipt) => {
                    println!("\n{}", receipt);
                    println!("Signature: {}", receipt.signature);
                    if let Some(slot) = receipt.slot {
                        println!("Slot:      {}", slot);
                    }
                    println!("Explorer:  {}", receipt.explorer_url());
                }
                TickOutcome::Failed { attempts, error } => {
                    anyhow::bail!("Swap failed after {} attempt(s): {}", attempts, error);
                }
                TickOutcome::Unconfirmed { signature, error } => {
                    anyhow::bail!(
                        "Swap {} submitted but unconfirmed, check before retrying: {}",
                        signature,
                        error
                    );
                }
                TickOutcome::LimitReached | TickOutcome::Interrupted => {}
            }
        }

        Commands::Quote { swap } => {
            let swap_config = swap.into_config()?;
            let jupiter = JupiterClient::new(&cli.jupiter_url)?;
            let quote = jupiter.get_quote(&swap_config.quote_request()).await?;

            println!("\n=== Quote ===");
            println!("Input:          {} {}", quote.response.in_amount, quote.response.input_mint);
            println!("Output:         {} {}", quote.response.out_amount, quote.response.output_mint);
            println!("Min output:     {}", quote.response.other_amount_threshold);
            println!("Slippage:       {} bps", quote.response.slippage_bps);
            println!("Price impact:   {:.4}%", quote.price_impact_pct());
            if let Some(rate) = quote.rate() {
                println!("Rate:           {:.9} out/in (base units)", rate);
            }
            println!("Route:          {}", quote.route_labels());
            if let Err(e) = crate::trading::check_price_impact(&quote, swap_config.max_price_impact_pct) {
                println!("\nWarning: {}", e);
            }
        }

        Commands::Address => {
            let wallet = Wallet::from_env()?;
            println!("{}", wallet.pubkey());
        }

        Commands::Balance => {
            let wallet = Wallet::from_env()?;
            let rpc = RpcClient::new(&cli.rpc_url)?;
            let lamports = rpc.get_balance(&wallet.pubkey()).await?;

            println!("Wallet:  {}", wallet.pubkey());
            println!(
                "Balance: {} SOL ({} lamports)",
                Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL),
                lamports
            );
        }

        Commands::Config {
            swap,
            schedule,
            webhook,
        } => {
            let config = swap.into_config()?;

            println!("\n=== Endpoints ===\n");
            println!("  RPC URL:              {}", cli.rpc_url);
            println!("  Jupiter URL:          {}", cli.jupiter_url);

            println!("\n=== Swap ===\n");
            println!("  Input Mint:           {}", config.input_mint);
            println!("  Output Mint:          {}", config.output_mint);
            println!("  Amount (base units):  {}", config.amount);
            println!("  Slippage:             {} bps", config.slippage_bps);
            println!("  Direct Routes Only:   {}", config.only_direct_routes);
            println!(
                "  Max Price Impact:     {}",
                config
                    .max_price_impact_pct
                    .map(|p| format!("{}%", p))
                    .unwrap_or_else(|| "none".to_string())
            );
            println!(
                "  Priority Fee:         {}",
                config
                    .priority_fee_lamports
                    .map(|f| format!("{} lamports", f))
                    .unwrap_or_else(|| "auto".to_string())
            );
            println!("  Skip Preflight:       {}", config.skip_preflight);
            println!("  Confirm RPC Timeout:  {}s", config.confirm_timeout_secs);
            println!("  Dry Run:              {}", config.dry_run);

            println!("\n=== Schedule ===\n");
            println!("  Interval:             {}s", schedule.interval);
            println!("  Max Trades / Day:     {}", schedule.max_trades_per_day);
            println!("  Attempts / Iteration: {}", schedule.max_attempts);
            println!("  Retry Delay:          {}s", schedule.retry_delay);

            println!("\n=== Notifications ===\n");
            println!(
                "  Webhook:              {}",
                if webhook.webhook_url.is_some() { "configured" } else { "disabled" }
            );
            println!("  Format:               {}", webhook.webhook_format);
        }
    }

    Ok(())
}

fn build_executor(
    rpc_url: &str,
    jupiter_url: &str,
    config: SwapConfig,
    wallet: Wallet,
) -> Result<SwapExecutor> {
    let jupiter = JupiterClient::new(jupiter_url)?;
    let rpc = RpcClient::new(rpc_url)?;
    tracing::debug!(rpc = %rpc.url(), jupiter = %jupiter.base_url(), "Clients ready");
    Ok(SwapExecutor::new(config, jupiter, rpc, wallet))
}
