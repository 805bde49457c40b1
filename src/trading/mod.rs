//! Trading logic: swap configuration, execution, and the daily cap.

mod config;
mod daily_limit;
mod executor;

pub use config::{SwapConfig, USDC_MINT, WSOL_MINT};
pub use daily_limit::DailyTradeCounter;
pub use executor::{check_price_impact, SwapExecutor, SwapVenue, UnconfirmedSwap};
