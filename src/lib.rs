//! Testnet token faucet.
//!
//! One POST endpoint sends a fixed amount to an address by running the
//! wallet CLI, at most once per address per rate limit window.

pub mod clock;
pub mod config;
pub mod dispenser;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod router;
pub mod service;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Args, ChainEnv, FaucetConfig, WalletConfig};
pub use dispenser::{CliWallet, Wallet, WalletOutput};
pub use error::{FaucetError, FaucetResult};
pub use models::{Address, DispenseReceipt, TransactionId};
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use router::app;
pub use service::FaucetService;
pub use state::AppState;
