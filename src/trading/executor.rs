//! Swap executor: quote, build, sign, submit, and confirm one swap.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ConfirmationState, JupiterClient, Quote, RpcClient};
use crate::models::{SwapReceipt, SwapStatus};
use crate::wallet::{RawTransaction, Wallet};

use super::SwapConfig;

/// A swap that was submitted but whose outcome could not be determined.
///
/// It may still land, so it must not be resubmitted within the same iteration.
#[derive(Debug, Clone)]
pub struct UnconfirmedSwap {
    pub signature: String,
    pub reason: String,
}

impl std::fmt::Display for UnconfirmedSwap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Transaction {} submitted but unconfirmed: {}", self.signature, self.reason)
    }
}

impl std::error::Error for UnconfirmedSwap {}

/// Something that can perform the configured swap once.
#[async_trait]
pub trait SwapVenue: Send + Sync {
    async fn execute_swap(&self) -> Result<SwapReceipt>;
}

/// Executes swaps through Jupiter and a Solana RPC node.
pub struct SwapExecutor {
    config: SwapConfig,
    jupiter: JupiterClient,
    rpc: RpcClient,
    wallet: Wallet,
}

impl SwapExecutor {
    pub fn new(config: SwapConfig, jupiter: JupiterClient, rpc: RpcClient, wallet: Wallet) -> Self {
        Self {
            config,
            jupiter,
            rpc,
            wallet,
        }
    }

    /// Fetch a quote for the configured swap.
    pub async fn quote(&self) -> Result<Quote> {
        self.jupiter.get_quote(&self.config.quote_request()).await
    }

    /// Run the full chain once.
    ///
    /// Errors carrying [`UnconfirmedSwap`] mean a transaction may be in flight.
    pub async fn execute(&self) -> Result<SwapReceipt> {
        let run_id = Uuid::new_v4();

        let quote = self.quote().await?;
        info!(
            run_id = %run_id,
            in_amount = %quote.response.in_amount,
            out_amount = %quote.response.out_amount,
            price_impact_pct = %quote.price_impact_pct(),
            route = %quote.route_labels(),
            "Quote received"
        );

        check_price_impact(&quote, self.config.max_price_impact_pct)?;

        let swap = self
            .jupiter
            .build_swap(&quote, &self.wallet.pubkey(), self.config.priority_fee_lamports)
            .await?;

        debug!(
            run_id = %run_id,
            last_valid_block_height = swap.last_valid_block_height,
            priority_fee = ?swap.prioritization_fee_lamports,
            "Swap transaction built"
        );

        let mut tx = RawTransaction::from_base64(&swap.swap_transaction)
            .context("Failed to decode swap transaction")?;
        let signature = tx.sign(&self.wallet)?;
        let encoded = tx.to_base64();

        if self.config.dry_run {
            let simulation = self
                .rpc
                .simulate_transaction(&encoded)
                .await
                .context("Failed to simulate transaction")?;

            if let Some(err) = simulation.err {
                for line in simulation.logs.unwrap_or_default() {
                    warn!(run_id = %run_id, "{}", line);
                }
                anyhow::bail!("Simulation failed: {}", err);
            }

            info!(
                run_id = %run_id,
                signature = %signature,
                units = ?simulation.units_consumed,
                "[DRY RUN] Swap simulated, not submitted"
            );

            return build_receipt(run_id, &quote, signature, SwapStatus::Simulated, None);
        }

        match self
            .rpc
            .send_transaction(&encoded, &self.config.send_options())
            .await
        {
            Ok(sent) if sent != signature => {
                warn!(expected = %signature, returned = %sent, "RPC returned a different signature");
            }
            Ok(_) => {}
            // the node may have received it; only the chain can tell
            Err(e) if outcome_unknown(&e) => {
                warn!(run_id = %run_id, signature = %signature, error = %e, "Submission outcome unknown, checking status");
            }
            Err(e) => return Err(e.context("Failed to submit transaction")),
        }

        info!(
            run_id = %run_id,
            signature = %signature,
            last_valid_block_height = swap.last_valid_block_height,
            "Transaction submitted, awaiting confirmation"
        );

        let state = self
            .rpc
            .confirm_signature(
                &signature,
                swap.last_valid_block_height,
                &self.config.confirm_options(),
            )
            .await
            .map_err(|e| {
                anyhow::Error::new(UnconfirmedSwap {
                    signature: signature.clone(),
                    reason: format!("{:#}", e),
                })
            })?;

        match state {
            ConfirmationState::Confirmed { slot } => {
                info!(run_id = %run_id, signature = %signature, slot = slot, "Swap confirmed");
                build_receipt(run_id, &quote, signature, SwapStatus::Confirmed, Some(slot))
            }
            ConfirmationState::Failed { error } => {
                anyhow::bail!("Transaction {} failed on chain: {}", signature, error)
            }
            ConfirmationState::Expired => anyhow::bail!(
                "Transaction {} expired before confirmation (block height passed {})",
                signature,
                swap.last_valid_block_height
            ),
            ConfirmationState::Pending => Err(anyhow::Error::new(UnconfirmedSwap {
                signature,
                reason: "still pending".to_string(),
            })),
        }
    }
}

/// Transport failures after the request may have reached the node.
fn outcome_unknown(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<reqwest::Error>())
        .any(|e| !e.is_connect() && !e.is_builder())
}

#[async_trait]
impl SwapVenue for SwapExecutor {
    async fn execute_swap(&self) -> Result<SwapReceipt> {
        self.execute().await
    }
}

/// Reject a quote whose price impact exceeds `max_pct` percent.
pub fn check_price_impact(quote: &Quote, max_pct: Option<Decimal>) -> Result<()> {
    let Some(max) = max_pct else {
        return Ok(());
    };
    let impact = quote.price_impact_pct();
    if impact > max {
        anyhow::bail!("Price impact {}% exceeds maximum {}%", impact.round_dp(4), max);
    }
    Ok(())
}

fn build_receipt(
    run_id: Uuid,
    quote: &Quote,
    signature: String,
    status: SwapStatus,
    slot: Option<u64>,
) -> Result<SwapReceipt> {
    Ok(SwapReceipt {
        run_id,
        signature,
        input_mint: quote.response.input_mint.clone(),
        output_mint: quote.response.output_mint.clone(),
        in_amount: quote.in_amount()?,
        out_amount: quote.out_amount()?,
        min_out_amount: quote.min_out_amount()?,
        price_impact_pct: quote.price_impact_pct(),
        route: quote.route_labels(),
        status,
        slot,
        executed_at: Utc::now(),
    })
}
