mod faucet;
mod health;
mod index;
mod metrics;

pub use faucet::faucet_handler;
pub use health::health_handler;
pub use index::{index_handler, render_index};
pub use metrics::metrics_handler;
