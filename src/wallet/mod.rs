//! Wallet key handling and transaction signing.

mod keypair;
mod transaction;

pub use keypair::Wallet;
pub use transaction::RawTransaction;

#[cfg(test)]
pub(crate) use transaction::unsigned_tx;
