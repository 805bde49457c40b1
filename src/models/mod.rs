//! Data models for swap results.

mod swap;

pub use swap::{short_mint, SwapReceipt, SwapStatus};
