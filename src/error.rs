//! Error types for the faucet service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Faucet errors, each mapped to exactly one HTTP status
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaucetError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Please wait {} between requests", describe_window(.window))]
    RateLimited {
        next_request: DateTime<Utc>,
        window: Duration,
    },

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

impl FaucetError {
    pub fn status(&self) -> StatusCode {
        match self {
            FaucetError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            FaucetError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            FaucetError::TransactionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            FaucetError::InvalidAddress(reason) => json!({
                "error": "Invalid Akash address",
                "reason": reason,
            }),
            FaucetError::RateLimited { next_request, .. } => json!({
                "error": self.to_string(),
                "nextRequest": iso_timestamp(next_request),
            }),
            // details were already truncated by the dispenser
            FaucetError::TransactionFailed(details) => json!({
                "error": "Transaction failed",
                "details": details,
            }),
        };

        (status, Json(body)).into_response()
    }
}

pub type FaucetResult<T> = Result<T, FaucetError>;

/// `2024-05-01T12:00:00.000Z`
pub fn iso_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn describe_window(window: &Duration) -> String {
    let secs = window.as_secs();
    match secs {
        3600 => "1 hour".to_string(),
        s if s > 0 && s % 3600 == 0 => format!("{} hours", s / 3600),
        60 => "1 minute".to_string(),
        s if s > 0 && s % 60 == 0 => format!("{} minutes", s / 60),
        s => format!("{} seconds", s),
    }
}
