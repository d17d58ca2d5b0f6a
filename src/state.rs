use std::sync::Arc;

use crate::service::FaucetService;

// app's shared state

pub struct AppState {
    pub faucet: Arc<FaucetService>,
    pub index_html: String, // rendered once at startup
}
