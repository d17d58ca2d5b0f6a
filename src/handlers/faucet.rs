use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use std::sync::Arc;
use tracing::debug;

use crate::error::{FaucetError, FaucetResult};
use crate::metrics::{INVALID_ADDRESS, REQUEST_TOTAL};
use crate::models::{FaucetRequest, FaucetResponse};
use crate::state::AppState;

// POST /faucet
pub async fn faucet_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FaucetRequest>, JsonRejection>,
) -> FaucetResult<Json<FaucetResponse>> {
    REQUEST_TOTAL.inc();

    // an unreadable body is reported like a missing address
    let address = match payload {
        Ok(Json(request)) => request.address.unwrap_or_default(),
        Err(rejection) => {
            INVALID_ADDRESS.inc();
            debug!(error = %rejection.body_text(), "Rejected faucet request body");
            return Err(FaucetError::InvalidAddress(
                "request body must be JSON with an address field".to_string(),
            ));
        }
    };

    let receipt = state.faucet.dispense(&address).await?;

    Ok(Json(FaucetResponse {
        success: true,
        txhash: receipt.tx_hash,
        amount: receipt.amount,
        message: format!("{} sent successfully!", state.faucet.config().amount_label),
    }))
}
