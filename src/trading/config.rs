//! Swap configuration.

use std::time::Duration;

use anyhow::Context;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::api::{ConfirmOptions, QuoteRequest, SendOptions};

/// USDC mint on Solana mainnet.
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
/// Wrapped SOL mint.
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Configuration for the swap executed each iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    /// Mint being sold
    pub input_mint: String,

    /// Mint being bought
    pub output_mint: String,

    /// Amount of `input_mint` to sell, in base units
    pub amount: u64,

    /// Slippage tolerance in basis points
    pub slippage_bps: u16,

    /// Restrict Jupiter to single-hop routes
    pub only_direct_routes: bool,

    /// Reject quotes whose price impact (percent) exceeds this
    pub max_price_impact_pct: Option<Decimal>,

    /// Fixed priority fee; Jupiter picks one when unset
    pub priority_fee_lamports: Option<u64>,

    /// Skip RPC preflight simulation on submit
    pub skip_preflight: bool,

    /// Rebroadcast attempts for the RPC node
    pub max_send_retries: Option<usize>,

    /// Give up waiting for confirmation after this many seconds
    pub confirm_timeout_secs: u64,

    /// Interval between signature status polls (milliseconds)
    pub confirm_poll_ms: u64,

    /// Sign and simulate, but never submit
    pub dry_run: bool,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            input_mint: USDC_MINT.to_string(),
            output_mint: WSOL_MINT.to_string(),
            amount: 1_000_000,                 // 1 USDC
            slippage_bps: 50,                  // 0.5%
            only_direct_routes: false,
            max_price_impact_pct: Some(dec!(1)), // 1%
            priority_fee_lamports: None,
            skip_preflight: false,
            max_send_retries: Some(3),
            confirm_timeout_secs: 60,
            confirm_poll_ms: 2000,
            dry_run: false,
        }
    }
}

impl SwapConfig {
    pub fn quote_request(&self) -> QuoteRequest {
        QuoteRequest {
            input_mint: self.input_mint.clone(),
            output_mint: self.output_mint.clone(),
            amount: self.amount,
            slippage_bps: self.slippage_bps,
            swap_mode: "ExactIn".to_string(),
            only_direct_routes: self.only_direct_routes,
        }
    }

    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            skip_preflight: self.skip_preflight,
            max_retries: self.max_send_retries,
        }
    }

    pub fn confirm_options(&self) -> ConfirmOptions {
        ConfirmOptions {
            timeout: Duration::from_secs(self.confirm_timeout_secs),
            poll_interval: Duration::from_millis(self.confirm_poll_ms),
        }
    }

    /// Check internal consistency before starting.
    pub fn validate(&self) -> anyhow::Result<()> {
        check_mint("Input", &self.input_mint)?;
        check_mint("Output", &self.output_mint)?;
        if self.input_mint == self.output_mint {
            anyhow::bail!("Input and output mint must differ");
        }
        if self.amount == 0 {
            anyhow::bail!("Swap amount must be greater than zero");
        }
        if self.slippage_bps > 10_000 {
            anyhow::bail!("Slippage of {} bps exceeds 100%", self.slippage_bps);
        }
        if self.confirm_poll_ms == 0 {
            anyhow::bail!("Confirmation poll interval must be greater than zero");
        }
        Ok(())
    }
}

/// A mint address is the base58 encoding of a 32-byte public key.
fn check_mint(side: &str, mint: &str) -> anyhow::Result<()> {
    let bytes = bs58::decode(mint)
        .into_vec()
        .with_context(|| format!("{} mint '{}' is not valid base58", side, mint))?;
    if bytes.len() != 32 {
        anyhow::bail!("{} mint '{}' decodes to {} bytes, expected 32", side, mint, bytes.len());
    }
    Ok(())
}
