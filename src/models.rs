use crate::error::{FaucetError, FaucetResult};
use serde::{Deserialize, Serialize};
use std::fmt;

// bech32 data part alphabet
const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";
pub const MIN_ADDRESS_LEN: usize = 40;
pub const MAX_ADDRESS_LEN: usize = 90;

/// A recipient address that passed validation and is safe to hand to the
/// wallet command as a single argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    pub fn parse(raw: &str, prefix: &str) -> FaucetResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FaucetError::InvalidAddress("address is required".to_string()));
        }

        let Some(data) = raw.strip_prefix(prefix) else {
            return Err(FaucetError::InvalidAddress(format!(
                "address must start with {}",
                prefix
            )));
        };

        if raw.len() < MIN_ADDRESS_LEN || raw.len() > MAX_ADDRESS_LEN {
            return Err(FaucetError::InvalidAddress(format!(
                "address length must be between {} and {} characters",
                MIN_ADDRESS_LEN, MAX_ADDRESS_LEN
            )));
        }

        if !data.chars().all(|c| BECH32_CHARSET.contains(c)) {
            return Err(FaucetError::InvalidAddress(
                "address contains characters outside the bech32 alphabet".to_string(),
            ));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash reported by the wallet, or `unknown` when its output carried none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionId {
    Hash(String),
    Unknown,
}

impl TransactionId {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionId::Hash(hash) => hash,
            TransactionId::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TransactionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// Successful dispense
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispenseReceipt {
    pub address: Address,
    pub tx_hash: TransactionId,
    pub amount: String,
}

// POST /faucet body
#[derive(Debug, Deserialize)]
pub struct FaucetRequest {
    #[serde(default)]
    pub address: Option<String>,
}

// POST /faucet success body
#[derive(Debug, Serialize)]
pub struct FaucetResponse {
    pub success: bool,
    pub txhash: TransactionId,
    pub amount: String,
    pub message: String,
}
