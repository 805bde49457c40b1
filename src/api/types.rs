//! Wire types for the Jupiter swap API and Solana JSON-RPC.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Query parameters for `GET /quote`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub input_mint: String,
    pub output_mint: String,
    pub amount: u64,
    pub slippage_bps: u16,
    pub swap_mode: String,
    pub only_direct_routes: bool,
}

/// Response from `GET /quote`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub input_mint: String,
    pub in_amount: String,
    pub output_mint: String,
    pub out_amount: String,
    pub other_amount_threshold: String,
    pub slippage_bps: u16,
    #[serde(default)]
    pub price_impact_pct: String,
    #[serde(default)]
    pub route_plan: Vec<RoutePlanStep>,
}

/// One leg of the route.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlanStep {
    pub swap_info: SwapInfo,
    #[serde(default)]
    pub percent: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInfo {
    #[serde(default)]
    pub label: String,
}

/// A quote as returned by the aggregator.
///
/// The raw JSON is kept verbatim because the swap endpoint wants it echoed back.
#[derive(Debug, Clone)]
pub struct Quote {
    pub response: QuoteResponse,
    raw: serde_json::Value,
}

impl Quote {
    pub fn from_value(raw: serde_json::Value) -> Result<Self> {
        let response = serde_json::from_value(raw.clone())
            .context("Failed to parse quote response")?;
        Ok(Self { response, raw })
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }

    pub fn in_amount(&self) -> Result<u64> {
        self.response
            .in_amount
            .parse()
            .context("Invalid inAmount in quote")
    }

    pub fn out_amount(&self) -> Result<u64> {
        self.response
            .out_amount
            .parse()
            .context("Invalid outAmount in quote")
    }

    /// Minimum output after slippage.
    pub fn min_out_amount(&self) -> Result<u64> {
        self.response
            .other_amount_threshold
            .parse()
            .context("Invalid otherAmountThreshold in quote")
    }

    /// Price impact as a percentage (the API reports a fraction).
    pub fn price_impact_pct(&self) -> Decimal {
        if self.response.price_impact_pct.is_empty() {
            return Decimal::ZERO;
        }
        Decimal::from_str(&self.response.price_impact_pct)
            .or_else(|_| Decimal::from_scientific(&self.response.price_impact_pct))
            .map(|fraction| fraction * Decimal::ONE_HUNDRED)
            .unwrap_or(Decimal::ZERO)
    }

    /// Output base units per input base unit.
    pub fn rate(&self) -> Option<Decimal> {
        let input = Decimal::from(self.in_amount().ok()?);
        let output = Decimal::from(self.out_amount().ok()?);
        if input.is_zero() {
            return None;
        }
        Some(output / input)
    }

    /// Route labels, e.g. `Whirlpool -> Raydium`. Split legs show their share.
    pub fn route_labels(&self) -> String {
        let labels: Vec<String> = self
            .response
            .route_plan
            .iter()
            .map(|step| {
                let label = if step.swap_info.label.is_empty() {
                    "unknown"
                } else {
                    step.swap_info.label.as_str()
                };
                match step.percent {
                    Some(pct) if pct < 100 => format!("{} ({}%)", label, pct),
                    _ => label.to_string(),
                }
            })
            .collect();
        labels.join(" -> ")
    }
}

/// Body for `POST /swap`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest<'a> {
    pub quote_response: &'a serde_json::Value,
    pub user_public_key: &'a str,
    pub wrap_and_unwrap_sol: bool,
    pub dynamic_compute_unit_limit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prioritization_fee_lamports: Option<u64>,
}

/// Response from `POST /swap`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapTransaction {
    /// Base64 serialized, unsigned transaction
    pub swap_transaction: String,
    pub last_valid_block_height: u64,
    #[serde(default)]
    pub prioritization_fee_lamports: Option<u64>,
}

/// JSON-RPC request envelope.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)
    }
}

/// Results wrapped in `{ context, value }`.
#[derive(Debug, Deserialize)]
pub struct RpcContextual<T> {
    pub value: T,
}

/// Entry of `getSignatureStatuses`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    pub err: Option<serde_json::Value>,
    pub confirmation_status: Option<String>,
}

/// Value of `simulateTransaction`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub logs: Option<Vec<String>>,
    #[serde(default)]
    pub units_consumed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn sample_quote() -> serde_json::Value {
        json!({
            "inputMint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            "inAmount": "10000000",
            "outputMint": "So11111111111111111111111111111111111111112",
            "outAmount": "65432100",
            "otherAmountThreshold": "65105000",
            "swapMode": "ExactIn",
            "slippageBps": 50,
            "platformFee": null,
            "priceImpactPct": "0.0012",
            "routePlan": [
                {
                    "swapInfo": {
                        "ammKey": "Czfq3xZZDmsdGdUyrNLtRhGc47cXcZtLG4crryfu44zE",
                        "label": "Orca (Whirlpools)",
                        "inputMint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                        "outputMint": "So11111111111111111111111111111111111111112",
                        "inAmount": "10000000",
                        "outAmount": "65432100",
                        "feeAmount": "1000",
                        "feeMint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
                    },
                    "percent": 100
                }
            ],
            "contextSlot": 290000000,
            "timeTaken": 0.01
        })
    }

    #[test]
    fn test_quote_parsing_keeps_raw() {
        let raw = sample_quote();
        let quote = Quote::from_value(raw.clone()).unwrap();

        assert_eq!(quote.raw(), &raw);
        assert_eq!(quote.in_amount().unwrap(), 10_000_000);
        assert_eq!(quote.out_amount().unwrap(), 65_432_100);
        assert_eq!(quote.min_out_amount().unwrap(), 65_105_000);
        assert_eq!(quote.response.slippage_bps, 50);
        assert_eq!(quote.route_labels(), "Orca (Whirlpools)");
        assert_eq!(quote.price_impact_pct(), dec!(0.12));
        assert_eq!(quote.rate(), Some(dec!(6.54321)));
    }

    #[test]
    fn test_quote_missing_optional_fields() {
        let mut raw = sample_quote();
        let obj = raw.as_object_mut().unwrap();
        obj.remove("priceImpactPct");
        obj.remove("routePlan");

        let quote = Quote::from_value(raw).unwrap();
        assert_eq!(quote.price_impact_pct(), Decimal::ZERO);
        assert_eq!(quote.route_labels(), "");
    }

    #[test]
    fn test_swap_request_serialization() {
        let raw = sample_quote();
        let body = SwapRequest {
            quote_response: &raw,
            user_public_key: "Wallet111",
            wrap_and_unwrap_sol: true,
            dynamic_compute_unit_limit: true,
            prioritization_fee_lamports: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["userPublicKey"], "Wallet111");
        assert_eq!(value["quoteResponse"]["outAmount"], "65432100");
        assert!(value.get("prioritizationFeeLamports").is_none());
    }

    #[test]
    fn test_rpc_envelopes() {
        let ok: RpcResponse<RpcContextual<Vec<Option<SignatureStatus>>>> =
            serde_json::from_value(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "context": { "slot": 82 },
                    "value": [
                        { "slot": 72, "confirmations": 10, "err": null, "status": { "Ok": null }, "confirmationStatus": "confirmed" },
                        null
                    ]
                }
            }))
            .unwrap();
        let statuses = ok.result.unwrap().value;
        assert_eq!(statuses[0].as_ref().unwrap().confirmation_status.as_deref(), Some("confirmed"));
        assert!(statuses[1].is_none());

        let failed: RpcResponse<String> = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "error": { "code": -32002, "message": "Transaction simulation failed" }
        }))
        .unwrap();
        assert!(failed.result.is_none());
        assert_eq!(
            failed.error.unwrap().to_string(),
            "RPC error -32002: Transaction simulation failed"
        );
    }
}
