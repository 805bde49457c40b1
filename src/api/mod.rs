//! Clients for the Jupiter swap API and the Solana RPC endpoint.

mod jupiter;
mod rpc;
mod types;

#[cfg(test)]
pub(crate) mod test_server;

pub use jupiter::{JupiterClient, JUPITER_URL};
pub use rpc::{ConfirmOptions, ConfirmationState, RpcClient, SendOptions, MAINNET_RPC_URL};
pub use types::*;
