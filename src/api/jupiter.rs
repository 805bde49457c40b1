//! Jupiter aggregator client: quotes and swap transaction construction.

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::types::{Quote, QuoteRequest, SwapRequest, SwapTransaction};

/// Jupiter swap API base URL.
pub const JUPITER_URL: &str = "https://quote-api.jup.ag/v6";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Jupiter quote and swap endpoints.
pub struct JupiterClient {
    http: Client,
    base_url: String,
}

impl JupiterClient {
    /// Create a client against `base_url` (no trailing slash needed).
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the best quote for an exact-in swap.
    pub async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote> {
        let url = format!("{}/quote", self.base_url);

        debug!(
            url = %url,
            input = %request.input_mint,
            output = %request.output_mint,
            amount = request.amount,
            "Fetching quote"
        );

        let response = self
            .http
            .get(&url)
            .query(request)
            .send()
            .await
            .context("Failed to fetch quote")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Quote request failed: {} - {}", status, body);
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse quote response")?;

        Quote::from_value(raw)
    }

    /// Ask Jupiter to build the unsigned swap transaction for `quote`.
    pub async fn build_swap(
        &self,
        quote: &Quote,
        user_public_key: &str,
        prioritization_fee_lamports: Option<u64>,
    ) -> Result<SwapTransaction> {
        let url = format!("{}/swap", self.base_url);

        let body = SwapRequest {
            quote_response: quote.raw(),
            user_public_key,
            wrap_and_unwrap_sol: true,
            dynamic_compute_unit_limit: true,
            prioritization_fee_lamports,
        };

        debug!(url = %url, user = %user_public_key, "Building swap transaction");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to request swap transaction")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Swap build failed: {} - {}", status, text);
        }

        response
            .json()
            .await
            .context("Failed to parse swap response")
    }
}
