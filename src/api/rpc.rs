//! Minimal Solana JSON-RPC client: submit, simulate, and confirm transactions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use backoff::ExponentialBackoffBuilder;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use super::types::{
    RpcContextual, RpcRequest, RpcResponse, SignatureStatus, SimulationResult,
};

/// Public mainnet endpoint.
pub const MAINNET_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for `sendTransaction`.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub skip_preflight: bool,
    /// Leave rebroadcasting to the RPC node when `None`
    pub max_retries: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendConfig {
    encoding: &'static str,
    skip_preflight: bool,
    preflight_commitment: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_retries: Option<usize>,
}

/// How often to poll for confirmation, and how long the node may stay unreachable.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmOptions {
    /// Give up once polls have failed for this long in a row
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Where a submitted transaction stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationState {
    Pending,
    Confirmed { slot: u64 },
    Failed { error: String },
    /// Blockhash expired before the transaction landed
    Expired,
}

/// Decide the state of a transaction from its status and the current block height.
pub fn classify(
    status: Option<&SignatureStatus>,
    block_height: u64,
    last_valid_block_height: u64,
) -> ConfirmationState {
    match status {
        Some(s) if s.err.is_some() => ConfirmationState::Failed {
            error: s.err.as_ref().map(|e| e.to_string()).unwrap_or_default(),
        },
        Some(s) => match s.confirmation_status.as_deref() {
            Some("confirmed") | Some("finalized") => ConfirmationState::Confirmed { slot: s.slot },
            _ => ConfirmationState::Pending,
        },
        None if block_height > last_valid_block_height => ConfirmationState::Expired,
        None => ConfirmationState::Pending,
    }
}

/// JSON-RPC client for a single Solana endpoint.
pub struct RpcClient {
    http: Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<P: Serialize, T: DeserializeOwned>(&self, method: &str, params: P) -> Result<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to call {}", method))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} request failed: {} - {}", method, status, body);
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(err) = body.error {
            anyhow::bail!("{} failed: {}", method, err);
        }

        body.result
            .ok_or_else(|| anyhow!("{} returned no result", method))
    }

    /// Submit a signed base64 transaction; returns its signature.
    pub async fn send_transaction(&self, encoded: &str, options: &SendOptions) -> Result<String> {
        let config = SendConfig {
            encoding: "base64",
            skip_preflight: options.skip_preflight,
            preflight_commitment: "confirmed",
            max_retries: options.max_retries,
        };
        self.call("sendTransaction", json!([encoded, config])).await
    }

    /// Simulate a signed base64 transaction without submitting it.
    pub async fn simulate_transaction(&self, encoded: &str) -> Result<SimulationResult> {
        let result: RpcContextual<SimulationResult> = self
            .call(
                "simulateTransaction",
                json!([encoded, { "encoding": "base64", "sigVerify": true, "commitment": "confirmed" }]),
            )
            .await?;
        Ok(result.value)
    }

    pub async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>> {
        let result: RpcContextual<Vec<Option<SignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": false }]),
            )
            .await?;
        Ok(result.value.into_iter().next().flatten())
    }

    pub async fn get_block_height(&self) -> Result<u64> {
        self.call("getBlockHeight", json!([{ "commitment": "confirmed" }]))
            .await
    }

    /// Balance in lamports.
    pub async fn get_balance(&self, pubkey: &str) -> Result<u64> {
        let result: RpcContextual<u64> = self
            .call("getBalance", json!([pubkey, { "commitment": "confirmed" }]))
            .await?;
        Ok(result.value)
    }

    async fn poll_confirmation(&self, signature: &str, last_valid_block_height: u64) -> Result<ConfirmationState> {
        let status = self.get_signature_status(signature).await?;
        let block_height = if status.is_none() {
            self.get_block_height().await?
        } else {
            0
        };
        Ok(classify(status.as_ref(), block_height, last_valid_block_height))
    }

    /// Poll at a fixed interval until `signature` reaches a final state:
    /// confirmed, failed on chain, or expired.
    ///
    /// A pending transaction is polled for as long as its blockhash is valid.
    /// `options.timeout` only bounds how long polls may keep failing; when it
    /// runs out the fate of the transaction is unknown and an error is returned.
    pub async fn confirm_signature(
        &self,
        signature: &str,
        last_valid_block_height: u64,
        options: &ConfirmOptions,
    ) -> Result<ConfirmationState> {
        let schedule = ExponentialBackoffBuilder::new()
            .with_initial_interval(options.poll_interval)
            .with_max_interval(options.poll_interval)
            .with_multiplier(1.0)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build();

        let last_answer = Mutex::new(Instant::now());

        backoff::future::retry(schedule, || async {
            let state = match self.poll_confirmation(signature, last_valid_block_height).await {
                Ok(state) => state,
                Err(e) => {
                    let silent_for = last_answer
                        .lock()
                        .map(|at| at.elapsed())
                        .unwrap_or_default();
                    if silent_for >= options.timeout {
                        return Err(backoff::Error::permanent(e.context(format!(
                            "No confirmation status for {} within {:?}",
                            signature, options.timeout
                        ))));
                    }
                    warn!(signature = %signature, error = %e, "Confirmation poll failed");
                    return Err(backoff::Error::transient(e));
                }
            };

            if let Ok(mut at) = last_answer.lock() {
                *at = Instant::now();
            }

            debug!(signature = %signature, state = ?state, "Confirmation poll");

            match state {
                ConfirmationState::Pending => Err(backoff::Error::transient(anyhow!(
                    "Transaction {} still pending",
                    signature
                ))),
                state => Ok(state),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_server::{self, rpc_error, rpc_result, signature_status};
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    fn fast() -> ConfirmOptions {
        ConfirmOptions {
            timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(20),
        }
    }

    fn landed(slot: u64, err: serde_json::Value) -> serde_json::Value {
        json!({ "slot": slot, "confirmations": 0, "err": err, "confirmationStatus": "confirmed" })
    }

    fn status(confirmation: Option<&str>, err: Option<serde_json::Value>) -> SignatureStatus {
        SignatureStatus {
            slot: 1234,
            err,
            confirmation_status: confirmation.map(str::to_string),
        }
    }

    #[test]
    fn test_classify_confirmed_and_finalized() {
        for level in ["confirmed", "finalized"] {
            let s = status(Some(level), None);
            assert_eq!(
                classify(Some(&s), 0, 100),
                ConfirmationState::Confirmed { slot: 1234 }
            );
        }
    }

    #[test]
    fn test_classify_processed_is_pending() {
        let s = status(Some("processed"), None);
        assert_eq!(classify(Some(&s), 500, 100), ConfirmationState::Pending);
    }

    #[test]
    fn test_classify_error_wins() {
        let s = status(
            Some("confirmed"),
            Some(json!({ "InstructionError": [2, { "Custom": 6001 }] })),
        );
        match classify(Some(&s), 0, 100) {
            ConfirmationState::Failed { error } => assert!(error.contains("6001")),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_classify_unknown_signature() {
        assert_eq!(classify(None, 100, 100), ConfirmationState::Pending);
        assert_eq!(classify(None, 101, 100), ConfirmationState::Expired);
    }

    #[test]
    fn test_send_config_serialization() {
        let config = SendConfig {
            encoding: "base64",
            skip_preflight: true,
            preflight_commitment: "confirmed",
            max_retries: None,
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["skipPreflight"], true);
        assert_eq!(value["preflightCommitment"], "confirmed");
        assert!(value.get("maxRetries").is_none());
    }

    #[tokio::test]
    async fn test_confirm_keeps_polling_while_blockhash_valid() {
        let polls = Arc::new(AtomicU32::new(0));
        let seen = polls.clone();
        let url = test_server::serve(move |req| match req.rpc_method() {
            "getSignatureStatuses" => {
                // unknown for longer than the timeout, then lands
                if seen.fetch_add(1, Ordering::SeqCst) < 8 {
                    signature_status(None)
                } else {
                    signature_status(Some(landed(55, json!(null))))
                }
            }
            "getBlockHeight" => rpc_result(json!(10)),
            _ => (404, String::new()),
        })
        .await;

        let rpc = RpcClient::new(&url).unwrap();
        let state = rpc.confirm_signature("sig", 1000, &fast()).await.unwrap();

        assert_eq!(state, ConfirmationState::Confirmed { slot: 55 });
        assert!(polls.load(Ordering::SeqCst) >= 9);
    }

    #[tokio::test]
    async fn test_confirm_reports_on_chain_failure() {
        let url = test_server::serve(|req| match req.rpc_method() {
            "getSignatureStatuses" => {
                signature_status(Some(landed(60, json!({ "InstructionError": [3, { "Custom": 6001 }] }))))
            }
            _ => (404, String::new()),
        })
        .await;

        let rpc = RpcClient::new(&url).unwrap();
        match rpc.confirm_signature("sig", 1000, &fast()).await.unwrap() {
            ConfirmationState::Failed { error } => assert!(error.contains("6001")),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_confirm_detects_expiry() {
        let url = test_server::serve(|req| match req.rpc_method() {
            "getSignatureStatuses" => signature_status(None),
            "getBlockHeight" => rpc_result(json!(1001)),
            _ => (404, String::new()),
        })
        .await;

        let rpc = RpcClient::new(&url).unwrap();
        let state = rpc.confirm_signature("sig", 1000, &fast()).await.unwrap();
        assert_eq!(state, ConfirmationState::Expired);
    }

    #[tokio::test]
    async fn test_confirm_gives_up_when_node_unreachable() {
        let url = test_server::serve(|_| (503, "upstream down".to_string())).await;

        let rpc = RpcClient::new(&url).unwrap();
        let err = rpc.confirm_signature("sig", 1000, &fast()).await.unwrap_err();

        let text = format!("{:#}", err);
        assert!(text.contains("No confirmation status for sig"));
        assert!(text.contains("503"));
    }

    #[tokio::test]
    async fn test_rpc_error_object_becomes_error() {
        let url = test_server::serve(|_| rpc_error(-32005, "Node is behind by 120 slots")).await;

        let rpc = RpcClient::new(&url).unwrap();
        let err = rpc.get_block_height().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "getBlockHeight failed: RPC error -32005: Node is behind by 120 slots"
        );
    }

    #[tokio::test]
    async fn test_http_error_carries_status_and_body() {
        let url = test_server::serve(|_| (429, "rate limited".to_string())).await;

        let rpc = RpcClient::new(&url).unwrap();
        let err = rpc.get_balance("Wallet111").await.unwrap_err().to_string();
        assert!(err.contains("getBalance request failed"));
        assert!(err.contains("429"));
        assert!(err.contains("rate limited"));
    }

    #[tokio::test]
    async fn test_send_transaction_request_shape() {
        let captured = Arc::new(std::sync::Mutex::new(serde_json::Value::Null));
        let sink = captured.clone();
        let url = test_server::serve(move |req| {
            *sink.lock().unwrap() = req.body.clone();
            rpc_result(json!("5ig"))
        })
        .await;

        let rpc = RpcClient::new(&url).unwrap();
        let options = SendOptions {
            skip_preflight: false,
            max_retries: Some(3),
        };
        assert_eq!(rpc.send_transaction("AQID", &options).await.unwrap(), "5ig");

        let body = captured.lock().unwrap().clone();
        assert_eq!(body["method"], "sendTransaction");
        assert_eq!(body["params"][0], "AQID");
        assert_eq!(body["params"][1]["encoding"], "base64");
        assert_eq!(body["params"][1]["maxRetries"], 3);
    }
}
