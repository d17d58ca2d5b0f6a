use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

// ten years; keeps `last + window` inside chrono's range
pub const MAX_RATE_WINDOW_SECS: u64 = 10 * 365 * 24 * 60 * 60;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "akash-faucet")]
#[command(about = "Testnet token faucet backed by the akash CLI")]
pub struct Args {
    /// Port to run the server on
    #[arg(short, long, env = "FAUCET_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Wallet binary invoked for every dispense
    #[arg(long, env = "FAUCET_WALLET_BINARY", default_value = "akash")]
    pub wallet_binary: String,

    /// Key name of the funding wallet in the keyring
    #[arg(long, env = "FAUCET_SENDER", default_value = "faucet-wallet")]
    pub sender: String,

    /// Amount passed to `tx bank send`
    #[arg(long, env = "FAUCET_AMOUNT", default_value = "500000000uakt")]
    pub amount: String,

    /// Human readable amount shown in responses and on the page
    #[arg(long, env = "FAUCET_AMOUNT_LABEL", default_value = "500 AKT")]
    pub amount_label: String,

    /// Required recipient address prefix
    #[arg(long, env = "FAUCET_ADDRESS_PREFIX", default_value = "akash1")]
    pub address_prefix: String,

    #[arg(long, env = "FAUCET_KEYRING_BACKEND", default_value = "test")]
    pub keyring_backend: String,

    #[arg(long, env = "FAUCET_GAS", default_value = "auto")]
    pub gas: String,

    #[arg(long, env = "FAUCET_GAS_ADJUSTMENT", default_value = "1.5")]
    pub gas_adjustment: String,

    #[arg(long, env = "FAUCET_GAS_PRICES", default_value = "0.025uakt")]
    pub gas_prices: String,

    #[arg(long, env = "FAUCET_SIGN_MODE", default_value = "amino-json")]
    pub sign_mode: String,

    #[arg(long, env = "FAUCET_CHAIN_ID", default_value = "testnet-8")]
    pub chain_id: String,

    /// RPC node the wallet broadcasts to
    #[arg(
        long,
        env = "FAUCET_NODE",
        default_value = "https://testnetrpc.akashnet.net:443"
    )]
    pub node: String,

    /// Rate limit window in seconds (one dispense per address per window)
    #[arg(
        long,
        env = "FAUCET_RATE_WINDOW",
        default_value_t = 24 * 60 * 60,
        value_parser = clap::value_parser!(u64).range(1..=MAX_RATE_WINDOW_SECS)
    )]
    pub rate_window: u64,

    /// Max characters of wallet error output returned to callers
    #[arg(long, env = "FAUCET_DETAIL_LIMIT", default_value_t = 200)]
    pub detail_limit: usize,

    /// Max wallet processes running at once
    #[arg(long, env = "FAUCET_MAX_CONCURRENT", default_value_t = 4)]
    pub max_concurrent: usize,

    /// Kill the wallet process after this many seconds (no limit if unset)
    #[arg(long, env = "FAUCET_COMMAND_TIMEOUT")]
    pub command_timeout: Option<u64>,

    /// How often elapsed rate limit records are swept, in seconds
    #[arg(long, env = "FAUCET_PRUNE_INTERVAL", default_value_t = 3600)]
    pub prune_interval: u64,

    /// Directory served for paths not handled by the API
    #[arg(long, env = "FAUCET_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Chain settings exported to the wallet process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEnv {
    pub keyring_backend: String,
    pub gas: String,
    pub gas_adjustment: String,
    pub gas_prices: String,
    pub sign_mode: String,
    pub chain_id: String,
    pub node: String,
}

impl ChainEnv {
    pub fn vars(&self) -> [(&'static str, &str); 7] {
        [
            ("AKASH_KEYRING_BACKEND", self.keyring_backend.as_str()),
            ("AKASH_GAS", self.gas.as_str()),
            ("AKASH_GAS_ADJUSTMENT", self.gas_adjustment.as_str()),
            ("AKASH_GAS_PRICES", self.gas_prices.as_str()),
            ("AKASH_SIGN_MODE", self.sign_mode.as_str()),
            ("AKASH_CHAIN_ID", self.chain_id.as_str()),
            ("AKASH_NODE", self.node.as_str()),
        ]
    }
}

impl Default for ChainEnv {
    fn default() -> Self {
        Self {
            keyring_backend: "test".to_string(),
            gas: "auto".to_string(),
            gas_adjustment: "1.5".to_string(),
            gas_prices: "0.025uakt".to_string(),
            sign_mode: "amino-json".to_string(),
            chain_id: "testnet-8".to_string(),
            node: "https://testnetrpc.akashnet.net:443".to_string(),
        }
    }
}

/// Wallet invocation settings
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub binary: String,
    pub sender: String,
    pub amount: String,
    pub chain: ChainEnv,
    pub timeout: Option<Duration>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            binary: "akash".to_string(),
            sender: "faucet-wallet".to_string(),
            amount: "500000000uakt".to_string(),
            chain: ChainEnv::default(),
            timeout: None,
        }
    }
}

/// Settings for the dispense path
#[derive(Debug, Clone)]
pub struct FaucetConfig {
    pub address_prefix: String,
    pub amount: String,
    pub amount_label: String,
    pub rate_window: Duration,
    pub detail_limit: usize,
    pub max_concurrent: usize,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            address_prefix: "akash1".to_string(),
            amount: "500000000uakt".to_string(),
            amount_label: "500 AKT".to_string(),
            rate_window: Duration::from_secs(24 * 60 * 60),
            detail_limit: 200,
            max_concurrent: 4,
        }
    }
}

impl Args {
    pub fn chain_env(&self) -> ChainEnv {
        ChainEnv {
            keyring_backend: self.keyring_backend.clone(),
            gas: self.gas.clone(),
            gas_adjustment: self.gas_adjustment.clone(),
            gas_prices: self.gas_prices.clone(),
            sign_mode: self.sign_mode.clone(),
            chain_id: self.chain_id.clone(),
            node: self.node.clone(),
        }
    }

    pub fn wallet_config(&self) -> WalletConfig {
        WalletConfig {
            binary: self.wallet_binary.clone(),
            sender: self.sender.clone(),
            amount: self.amount.clone(),
            chain: self.chain_env(),
            timeout: self.command_timeout.map(Duration::from_secs),
        }
    }

    pub fn faucet_config(&self) -> FaucetConfig {
        FaucetConfig {
            address_prefix: self.address_prefix.clone(),
            amount: self.amount.clone(),
            amount_label: self.amount_label.clone(),
            rate_window: Duration::from_secs(self.rate_window),
            detail_limit: self.detail_limit,
            // a zero permit semaphore would block every dispense forever
            max_concurrent: self.max_concurrent.max(1),
        }
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval.max(1))
    }
}
