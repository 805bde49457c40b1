//! Result of one executed (or simulated) swap.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How far a swap got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    /// Landed and reached `confirmed` commitment
    Confirmed,
    /// Dry run: signed and simulated, never submitted
    Simulated,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Confirmed => "confirmed",
            SwapStatus::Simulated => "simulated",
        }
    }
}

/// Record of a swap produced by one loop iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapReceipt {
    /// Correlates logs and notifications for one iteration
    pub run_id: Uuid,

    /// Transaction signature (base58)
    pub signature: String,

    pub input_mint: String,
    pub output_mint: String,

    /// Input amount in base units
    pub in_amount: u64,

    /// Quoted output amount in base units
    pub out_amount: u64,

    /// Minimum output after slippage, in base units
    pub min_out_amount: u64,

    /// Price impact in percent
    pub price_impact_pct: Decimal,

    /// Route labels joined with `->`
    pub route: String,

    pub status: SwapStatus,

    /// Slot the transaction landed in (absent for simulations)
    pub slot: Option<u64>,

    pub executed_at: DateTime<Utc>,
}

impl SwapReceipt {
    /// Output base units per input base unit.
    pub fn rate(&self) -> Option<Decimal> {
        if self.in_amount == 0 {
            return None;
        }
        Some(Decimal::from(self.out_amount) / Decimal::from(self.in_amount))
    }

    /// Explorer link for the transaction.
    pub fn explorer_url(&self) -> String {
        format!("https://solscan.io/tx/{}", self.signature)
    }
}

impl std::fmt::Display for SwapReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {} | in {} | out {} (min {}) | impact {:.4}% | {}",
            short_mint(&self.input_mint),
            short_mint(&self.output_mint),
            self.in_amount,
            self.out_amount,
            self.min_out_amount,
            self.price_impact_pct,
            self.status.as_str()
        )?;
        if !self.route.is_empty() {
            write!(f, " via {}", self.route)?;
        }
        Ok(())
    }
}

/// Shorten a base58 address for display, e.g. `EPjF…Dt1v`.
pub fn short_mint(mint: &str) -> String {
    let chars: Vec<char> = mint.chars().collect();
    if chars.len() <= 10 {
        return mint.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}
