//! Bot runner: the fixed-interval swap loop.
//!
//! Each iteration:
//! - Resets the daily trade count when the UTC day changes
//! - Skips (and notifies once) when the daily cap is reached
//! - Attempts the swap a bounded number of times, waiting a fixed delay between attempts
//! - Stops retrying once a transaction was submitted with an unknown outcome,
//!   and counts it against the cap
//! - Notifies the outcome
//!
//! No error escapes an iteration; the loop only ends on shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::models::SwapReceipt;
use crate::notify::{Notification, Notifier};
use crate::trading::{DailyTradeCounter, SwapVenue, UnconfirmedSwap};

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Sleep between iterations
    pub interval: Duration,

    /// Swap attempts per iteration
    pub max_attempts: u32,

    /// Wait between failed attempts
    pub retry_delay: Duration,

    /// Swaps allowed per UTC day
    pub max_trades_per_day: u32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            max_attempts: 3,
            retry_delay: Duration::from_secs(10),
            max_trades_per_day: 1,
        }
    }
}

/// Cloneable handle used to stop the loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on shutdown. Returns true if shutdown was requested.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.notify.notified() => {}
        }
        self.is_triggered()
    }
}

/// What a single iteration did.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    Executed(SwapReceipt),
    LimitReached,
    Failed { attempts: u32, error: String },
    /// Submitted but never confirmed; it may still land
    Unconfirmed { signature: String, error: String },
    /// Shutdown arrived between attempts
    Interrupted,
}

/// Main bot runner.
pub struct Bot<V: SwapVenue, N: Notifier> {
    config: BotConfig,
    venue: V,
    notifier: N,
    counter: DailyTradeCounter,
    limit_notified_on: Option<NaiveDate>,
    announcement: Option<Notification>,
    shutdown: ShutdownHandle,
}

impl<V: SwapVenue, N: Notifier> Bot<V, N> {
    pub fn new(config: BotConfig, venue: V, notifier: N) -> Self {
        let counter = DailyTradeCounter::new(config.max_trades_per_day, Utc::now());
        Self {
            config,
            venue,
            notifier,
            counter,
            limit_notified_on: None,
            announcement: None,
            shutdown: ShutdownHandle::new(),
        }
    }

    /// Notification sent when `run` starts, paired with `Stopped` on exit.
    pub fn announce(mut self, notification: Notification) -> Self {
        self.announcement = Some(notification);
        self
    }

    /// Get shutdown handle for external control.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn trades_today(&self) -> u32 {
        self.counter.trades_today()
    }

    /// Main run loop.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            interval_secs = self.config.interval.as_secs(),
            max_attempts = self.config.max_attempts,
            max_trades_per_day = self.config.max_trades_per_day,
            "Starting swap loop"
        );

        if let Some(notification) = self.announcement.take() {
            self.notifier.notify(&notification).await;
        }

        while !self.shutdown.is_triggered() {
            match self.tick().await {
                TickOutcome::Executed(receipt) => {
                    debug!(signature = %receipt.signature, "Iteration executed a swap")
                }
                TickOutcome::LimitReached => debug!("Iteration skipped, daily limit reached"),
                TickOutcome::Failed { attempts, .. } => {
                    debug!(attempts = attempts, "Iteration failed, continuing")
                }
                TickOutcome::Unconfirmed { signature, .. } => {
                    debug!(signature = %signature, "Iteration left a swap unconfirmed, continuing")
                }
                TickOutcome::Interrupted => break,
            }

            if self.shutdown.sleep(self.config.interval).await {
                break;
            }
        }

        info!("Shutting down swap loop");
        self.notifier
            .notify(&Notification::Stopped {
                trades_today: self.counter.trades_today(),
                timestamp: Utc::now(),
            })
            .await;

        Ok(())
    }

    /// Single iteration of the main loop.
    pub async fn tick(&mut self) -> TickOutcome {
        self.tick_at(Utc::now()).await
    }

    /// Iteration evaluated as if the current time were `now`.
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.counter.roll(now) {
            info!(day = %self.counter.day(), "New UTC day, trade count reset");
        }

        if !self.counter.can_trade() {
            info!(
                trades_today = self.counter.trades_today(),
                max = self.counter.max_per_day(),
                "Daily trade limit reached, skipping"
            );
            if self.limit_notified_on != Some(self.counter.day()) {
                self.limit_notified_on = Some(self.counter.day());
                self.notifier
                    .notify(&Notification::DailyLimitReached {
                        trades_today: self.counter.trades_today(),
                        max_trades_per_day: self.counter.max_per_day(),
                        resets_at: self.counter.next_reset(),
                    })
                    .await;
            }
            return TickOutcome::LimitReached;
        }

        self.attempt_swap().await
    }

    /// Run the swap with bounded attempts, ignoring the daily cap.
    pub async fn attempt_swap(&mut self) -> TickOutcome {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.venue.execute_swap().await {
                Ok(receipt) => {
                    self.counter.record();
                    info!(
                        signature = %receipt.signature,
                        attempt = attempt,
                        trades_today = self.counter.trades_today(),
                        remaining = self.counter.remaining(),
                        "Swap succeeded"
                    );
                    self.notifier
                        .notify(&Notification::SwapSucceeded {
                            receipt: receipt.clone(),
                            trades_today: self.counter.trades_today(),
                            max_trades_per_day: self.counter.max_per_day(),
                        })
                        .await;
                    return TickOutcome::Executed(receipt);
                }
                Err(e) => {
                    if let Some(unconfirmed) = e.downcast_ref::<UnconfirmedSwap>() {
                        let signature = unconfirmed.signature.clone();
                        return self.settle_unconfirmed(signature, format!("{:#}", e)).await;
                    }
                    last_error = format!("{:#}", e);
                    warn!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %last_error,
                        "Swap attempt failed"
                    );
                }
            }

            if attempt < max_attempts && self.shutdown.sleep(self.config.retry_delay).await {
                return TickOutcome::Interrupted;
            }
        }

        error!(attempts = max_attempts, error = %last_error, "Swap failed, giving up until next interval");
        self.notifier
            .notify(&Notification::SwapFailed {
                attempts: max_attempts,
                error: last_error.clone(),
                trades_today: self.counter.trades_today(),
                max_trades_per_day: self.counter.max_per_day(),
                timestamp: Utc::now(),
            })
            .await;

        TickOutcome::Failed {
            attempts: max_attempts,
            error: last_error,
        }
    }

    /// A transaction may be in flight: count it and skip the remaining attempts.
    async fn settle_unconfirmed(&mut self, signature: String, error: String) -> TickOutcome {
        self.counter.record();
        error!(
            signature = %signature,
            error = %error,
            trades_today = self.counter.trades_today(),
            "Swap submitted but unconfirmed, not retrying this iteration"
        );
        self.notifier
            .notify(&Notification::SwapUnconfirmed {
                signature: signature.clone(),
                error: error.clone(),
                trades_today: self.counter.trades_today(),
                max_trades_per_day: self.counter.max_per_day(),
            })
            .await;

        TickOutcome::Unconfirmed { signature, error }
    }
}
