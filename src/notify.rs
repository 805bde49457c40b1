//! Best-effort status notifications over a webhook.
//!
//! Delivery failures are logged and swallowed; a notification never
//! affects the outcome of a swap iteration.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::{short_mint, SwapReceipt};

/// Events worth telling the operator about.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Started {
        wallet: String,
        input_mint: String,
        output_mint: String,
        amount: u64,
        max_trades_per_day: u32,
        interval_secs: u64,
        dry_run: bool,
    },
    SwapSucceeded {
        receipt: SwapReceipt,
        trades_today: u32,
        max_trades_per_day: u32,
    },
    SwapFailed {
        attempts: u32,
        error: String,
        trades_today: u32,
        max_trades_per_day: u32,
        timestamp: DateTime<Utc>,
    },
    /// Submitted, but the outcome is unknown; counted against the cap
    SwapUnconfirmed {
        signature: String,
        error: String,
        trades_today: u32,
        max_trades_per_day: u32,
    },
    DailyLimitReached {
        trades_today: u32,
        max_trades_per_day: u32,
        resets_at: DateTime<Utc>,
    },
    Stopped {
        trades_today: u32,
        timestamp: DateTime<Utc>,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Started { .. } => "started",
            Notification::SwapSucceeded { .. } => "swap_succeeded",
            Notification::SwapFailed { .. } => "swap_failed",
            Notification::SwapUnconfirmed { .. } => "swap_unconfirmed",
            Notification::DailyLimitReached { .. } => "daily_limit_reached",
            Notification::Stopped { .. } => "stopped",
        }
    }

    /// Human readable message.
    pub fn format_message(&self) -> String {
        match self {
            Notification::Started {
                wallet,
                input_mint,
                output_mint,
                amount,
                max_trades_per_day,
                interval_secs,
                dry_run,
            } => format!(
                "🚀 Swap bot started{} | wallet {} | {} {} -> {} every {}s | max {}/day",
                if *dry_run { " (DRY RUN)" } else { "" },
                short_mint(wallet),
                amount,
                short_mint(input_mint),
                short_mint(output_mint),
                interval_secs,
                max_trades_per_day
            ),
            Notification::SwapSucceeded {
                receipt,
                trades_today,
                max_trades_per_day,
            } => format!(
                "✅ Swap {} ({}/{} today): {} | {}",
                receipt.status.as_str(),
                trades_today,
                max_trades_per_day,
                receipt,
                receipt.explorer_url()
            ),
            Notification::SwapFailed {
                attempts,
                error,
                trades_today,
                max_trades_per_day,
                timestamp,
            } => format!(
                "❌ Swap failed after {} attempt(s) at {} ({}/{} today): {}",
                attempts,
                timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                trades_today,
                max_trades_per_day,
                error
            ),
            Notification::SwapUnconfirmed {
                signature,
                error,
                trades_today,
                max_trades_per_day,
            } => format!(
                "⚠️ Swap submitted but unconfirmed, not retrying ({}/{} today): {} | https://solscan.io/tx/{}",
                trades_today, max_trades_per_day, error, signature
            ),
            Notification::DailyLimitReached {
                trades_today,
                max_trades_per_day,
                resets_at,
            } => format!(
                "⏸️ Daily limit reached ({}/{}). Trading resumes at {}",
                trades_today,
                max_trades_per_day,
                resets_at.format("%Y-%m-%d %H:%M UTC")
            ),
            Notification::Stopped {
                trades_today,
                timestamp,
            } => format!(
                "🛑 Swap bot stopped at {} ({} trade(s) today)",
                timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                trades_today
            ),
        }
    }
}

/// Anything that can deliver a notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `notification`. Never fails; problems are logged.
    async fn notify(&self, notification: &Notification);
}

/// Payload shape expected by the webhook receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookFormat {
    /// `{"content": ..., "username": ...}`
    Discord,
    /// `{"text": ..., "username": ...}`
    Slack,
    /// The serialized notification, tagged by `type`
    Json,
}

impl FromStr for WebhookFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discord" => Ok(Self::Discord),
            "slack" => Ok(Self::Slack),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown webhook format '{}' (discord, slack, json)", other)),
        }
    }
}

impl std::fmt::Display for WebhookFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookFormat::Discord => write!(f, "discord"),
            WebhookFormat::Slack => write!(f, "slack"),
            WebhookFormat::Json => write!(f, "json"),
        }
    }
}

/// Webhook delivery settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// No URL means notifications are only logged
    pub url: Option<String>,
    pub format: WebhookFormat,
    pub username: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            format: WebhookFormat::Discord,
            username: "solswap".to_string(),
        }
    }
}

/// Posts notifications to a webhook.
pub struct WebhookNotifier {
    config: WebhookConfig,
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, http })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.url.is_some()
    }

    /// Request body for `notification` in the configured format.
    pub fn payload(&self, notification: &Notification) -> serde_json::Value {
        match self.config.format {
            WebhookFormat::Discord => serde_json::json!({
                "content": notification.format_message(),
                "username": self.config.username,
            }),
            WebhookFormat::Slack => serde_json::json!({
                "text": notification.format_message(),
                "username": self.config.username,
            }),
            WebhookFormat::Json => serde_json::to_value(notification)
                .unwrap_or_else(|_| serde_json::json!({ "type": notification.kind() })),
        }
    }

    async fn deliver(&self, url: &str, notification: &Notification) -> Result<()> {
        let response = self
            .http
            .post(url)
            .json(&self.payload(notification))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Webhook returned {}: {}", status, body);
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) {
        info!(kind = notification.kind(), "{}", notification.format_message());

        let Some(url) = self.config.url.as_deref() else {
            debug!("No webhook configured, skipping delivery");
            return;
        };

        if let Err(e) = self.deliver(url, notification).await {
            warn!(kind = notification.kind(), error = %e, "Failed to deliver notification");
        }
    }
}
