//! Dispense path: validate, rate limit, run the wallet, record.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::FaucetConfig;
use crate::dispenser::{Wallet, settle};
use crate::error::{FaucetError, FaucetResult};
use crate::metrics::{
    DISPENSE_FAILURE, DISPENSE_LATENCY, DISPENSE_SUCCESS, INVALID_ADDRESS, RATE_LIMITED,
    TRACKED_ADDRESSES,
};
use crate::models::{Address, DispenseReceipt};
use crate::rate_limit::{RateLimitDecision, RateLimiter};

pub struct FaucetService {
    config: FaucetConfig,
    wallet: Arc<dyn Wallet>,
    clock: Arc<dyn Clock>,
    limiter: Arc<RateLimiter>,
    permits: Arc<Semaphore>, // caps concurrent wallet processes
}

impl FaucetService {
    pub fn new(config: FaucetConfig, wallet: Arc<dyn Wallet>, clock: Arc<dyn Clock>) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_window));
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            config,
            wallet,
            clock,
            limiter,
            permits,
        }
    }

    pub fn config(&self) -> &FaucetConfig {
        &self.config
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Send the configured amount to `raw_address`.
    ///
    /// Validation happens before the rate limiter or the wallet is touched.
    /// Requests for the same address are serialized, so two concurrent
    /// requests never both reach the wallet inside one window. The address
    /// is recorded with the admission time, and only when the wallet run
    /// succeeded. The wallet run and the recording happen on their own task,
    /// so dropping this future does not cut them short.
    pub async fn dispense(&self, raw_address: &str) -> FaucetResult<DispenseReceipt> {
        let address = match Address::parse(raw_address, &self.config.address_prefix) {
            Ok(address) => address,
            Err(e) => {
                INVALID_ADDRESS.inc();
                debug!(error = %e, "Rejected address");
                return Err(e);
            }
        };

        let guard = self.limiter.lock(address.as_str()).await;
        let now = self.clock.now();

        if let RateLimitDecision::Denied { retry_after } = self.limiter.check(address.as_str(), now) {
            RATE_LIMITED.inc();
            info!(address = %address, next_request = %retry_after, "Address is rate limited");
            return Err(FaucetError::RateLimited {
                next_request: retry_after,
                window: self.limiter.window(),
            });
        }

        info!(address = %address, amount = %self.config.amount_label, "Sending tokens");

        let wallet = Arc::clone(&self.wallet);
        let limiter = Arc::clone(&self.limiter);
        let permits = Arc::clone(&self.permits);
        let detail_limit = self.config.detail_limit;
        let amount = self.config.amount.clone();

        // Detached from the request: once the wallet runs, the outcome is
        // recorded even if the caller has gone away.
        let task = tokio::spawn(async move {
            let _guard = guard;

            let run = {
                let _permit = match permits.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return Err(FaucetError::TransactionFailed(
                            "faucet is shutting down".to_string(),
                        ));
                    }
                };
                let started = Instant::now();
                let run = wallet.send(&address).await;
                DISPENSE_LATENCY.observe(started.elapsed().as_secs_f64());
                run
            };

            match settle(run, detail_limit) {
                Ok(tx_hash) => {
                    limiter.record(address.as_str(), now);
                    DISPENSE_SUCCESS.inc();
                    TRACKED_ADDRESSES.set(limiter.tracked() as f64);
                    info!(address = %address, txhash = %tx_hash, "Transaction successful");

                    Ok(DispenseReceipt {
                        address,
                        tx_hash,
                        amount,
                    })
                }
                Err(e) => {
                    DISPENSE_FAILURE.inc();
                    error!(address = %address, error = %e, "Transaction failed");
                    Err(e)
                }
            }
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                DISPENSE_FAILURE.inc();
                error!(error = %e, "Dispense task did not complete");
                Err(FaucetError::TransactionFailed("internal error".to_string()))
            }
        }
    }

    /// Stop handing out wallet permits. Requests still waiting for one fail
    /// with `TransactionFailed`, runs already in progress finish normally.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Drop rate limit records whose window has elapsed.
    pub fn prune(&self) -> usize {
        let removed = self.limiter.prune(self.clock.now());
        TRACKED_ADDRESSES.set(self.limiter.tracked() as f64);
        removed
    }
}

// Background sweeper - keeps the rate limit map bounded by live windows
pub async fn run_pruner(service: Arc<FaucetService>, every: Duration) {
    let mut interval = interval(every);

    info!("Rate limit sweeper started (interval: {:?})", every);

    loop {
        interval.tick().await;

        let removed = service.prune();
        if removed > 0 {
            info!(removed, tracked = service.limiter().tracked(), "Swept elapsed rate limit records");
        } else if service.limiter().tracked() > 100_000 {
            warn!(tracked = service.limiter().tracked(), "Rate limit map is large");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::dispenser::WalletOutput;
    use crate::models::TransactionId;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ADDR: &str = "akash1qpzry9x8gf2tvdw0s3jn54khce6mua7lqpzry9";

    // Wallet that replays a fixed output and counts calls
    struct ScriptedWallet {
        output: Mutex<WalletOutput>,
        delay: Duration,
        calls: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedWallet {
        fn new(success: bool, stdout: &str, stderr: &str) -> Self {
            Self {
                output: Mutex::new(WalletOutput {
                    success,
                    code: Some(if success { 0 } else { 1 }),
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                }),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn set_output(&self, success: bool, stdout: &str, stderr: &str) {
            *self.output.lock().unwrap() = WalletOutput {
                success,
                code: Some(if success { 0 } else { 1 }),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            };
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Wallet for ScriptedWallet {
        async fn send(&self, _recipient: &Address) -> io::Result<WalletOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(self.output.lock().unwrap().clone())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn service(wallet: Arc<ScriptedWallet>, clock: Arc<ManualClock>) -> FaucetService {
        FaucetService::new(FaucetConfig::default(), wallet, clock)
    }

    #[tokio::test]
    async fn invalid_address_never_reaches_wallet_or_limiter() {
        let wallet = Arc::new(ScriptedWallet::new(true, "txhash: ABC123", ""));
        let svc = service(wallet.clone(), Arc::new(ManualClock::new(t0())));

        for raw in ["", "cosmos1qpzry9x8gf2tvdw0s3jn54khce6mua7lqpzry9", "akash1short"] {
            assert!(matches!(svc.dispense(raw).await, Err(FaucetError::InvalidAddress(_))));
        }
        assert_eq!(wallet.calls(), 0);
        assert_eq!(svc.limiter().tracked(), 0);
    }

    #[tokio::test]
    async fn success_reports_hash_and_records_address() {
        let wallet = Arc::new(ScriptedWallet::new(true, "code: 0\ntxhash: ABC123\n", ""));
        let svc = service(wallet.clone(), Arc::new(ManualClock::new(t0())));

        let receipt = svc.dispense(ADDR).await.unwrap();
        assert_eq!(receipt.tx_hash, TransactionId::Hash("ABC123".into()));
        assert_eq!(receipt.amount, "500000000uakt");
        assert_eq!(receipt.address.as_str(), ADDR);
        assert_eq!(svc.limiter().last_dispense(ADDR), Some(t0()));
    }

    #[tokio::test]
    async fn second_request_inside_window_is_rate_limited() {
        let wallet = Arc::new(ScriptedWallet::new(true, "txhash: ABC123", ""));
        let clock = Arc::new(ManualClock::new(t0()));
        let svc = service(wallet.clone(), clock.clone());

        svc.dispense(ADDR).await.unwrap();
        clock.advance(TimeDelta::minutes(5));

        match svc.dispense(ADDR).await {
            Err(FaucetError::RateLimited { next_request, window }) => {
                assert_eq!(next_request, t0() + TimeDelta::hours(24));
                assert_eq!(window, Duration::from_secs(86_400));
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
        assert_eq!(wallet.calls(), 1);
    }

    #[tokio::test]
    async fn address_is_eligible_again_after_window() {
        let wallet = Arc::new(ScriptedWallet::new(true, "txhash: ABC123", ""));
        let clock = Arc::new(ManualClock::new(t0()));
        let svc = service(wallet.clone(), clock.clone());

        svc.dispense(ADDR).await.unwrap();
        clock.set(t0() + TimeDelta::hours(24));

        svc.dispense(ADDR).await.unwrap();
        assert_eq!(wallet.calls(), 2);
        assert_eq!(svc.limiter().last_dispense(ADDR), Some(t0() + TimeDelta::hours(24)));
    }

    #[tokio::test]
    async fn missing_hash_is_still_a_success() {
        let wallet = Arc::new(ScriptedWallet::new(true, "code: 0\n", ""));
        let svc = service(wallet, Arc::new(ManualClock::new(t0())));

        let receipt = svc.dispense(ADDR).await.unwrap();
        assert_eq!(receipt.tx_hash, TransactionId::Unknown);
        assert!(svc.limiter().last_dispense(ADDR).is_some());
    }

    #[tokio::test]
    async fn failure_does_not_consume_the_window() {
        let long_error = "Error: ".to_string() + &"insufficient funds ".repeat(40);
        let wallet = Arc::new(ScriptedWallet::new(false, "", &long_error));
        let svc = service(wallet.clone(), Arc::new(ManualClock::new(t0())));

        match svc.dispense(ADDR).await {
            Err(FaucetError::TransactionFailed(details)) => {
                assert!(details.chars().count() <= 200);
                assert!(details.starts_with("Error: insufficient funds"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(svc.limiter().last_dispense(ADDR).is_none());

        wallet.set_output(true, "txhash: BEEF", "");
        let receipt = svc.dispense(ADDR).await.unwrap();
        assert_eq!(receipt.tx_hash, TransactionId::Hash("BEEF".into()));
    }

    #[tokio::test]
    async fn concurrent_requests_for_one_address_reach_wallet_once() {
        let wallet = Arc::new(
            ScriptedWallet::new(true, "txhash: ABC123", "").with_delay(Duration::from_millis(50)),
        );
        let svc = service(wallet.clone(), Arc::new(ManualClock::new(t0())));

        let (a, b) = tokio::join!(svc.dispense(ADDR), svc.dispense(ADDR));
        let outcomes = [a, b];

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(FaucetError::RateLimited { .. })))
                .count(),
            1
        );
        assert_eq!(wallet.calls(), 1);
    }

    #[tokio::test]
    async fn wallet_concurrency_is_capped() {
        let wallet = Arc::new(
            ScriptedWallet::new(true, "txhash: ABC123", "").with_delay(Duration::from_millis(20)),
        );
        let config = FaucetConfig {
            max_concurrent: 1,
            ..FaucetConfig::default()
        };
        let svc = FaucetService::new(config, wallet.clone(), Arc::new(ManualClock::new(t0())));

        let (a, b, c) = tokio::join!(
            svc.dispense("akash1qpzry9x8gf2tvdw0s3jn54khce6mua7lqpzry9"),
            svc.dispense("akash1qpzry9x8gf2tvdw0s3jn54khce6mua7lqpzry8"),
            svc.dispense("akash1qpzry9x8gf2tvdw0s3jn54khce6mua7lqpzry7"),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(wallet.calls(), 3);
        assert_eq!(wallet.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn abandoned_request_still_records_the_transfer() {
        let wallet = Arc::new(
            ScriptedWallet::new(true, "txhash: ABC123", "").with_delay(Duration::from_millis(200)),
        );
        let svc = Arc::new(service(wallet.clone(), Arc::new(ManualClock::new(t0()))));

        let request = tokio::spawn({
            let svc = svc.clone();
            async move { svc.dispense(ADDR).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        request.abort();
        assert!(request.await.unwrap_err().is_cancelled());
        assert_eq!(wallet.calls(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(svc.limiter().last_dispense(ADDR), Some(t0()));

        assert!(matches!(
            svc.dispense(ADDR).await,
            Err(FaucetError::RateLimited { .. })
        ));
        assert_eq!(wallet.calls(), 1);
    }

    #[tokio::test]
    async fn closed_faucet_refuses_new_wallet_runs() {
        let wallet = Arc::new(ScriptedWallet::new(true, "txhash: ABC123", ""));
        let svc = service(wallet.clone(), Arc::new(ManualClock::new(t0())));
        svc.close();

        assert_eq!(
            svc.dispense(ADDR).await.unwrap_err(),
            FaucetError::TransactionFailed("faucet is shutting down".into())
        );
        assert_eq!(wallet.calls(), 0);
        assert!(svc.limiter().last_dispense(ADDR).is_none());
    }

    #[tokio::test]
    async fn prune_uses_the_injected_clock() {
        let wallet = Arc::new(ScriptedWallet::new(true, "txhash: ABC123", ""));
        let clock = Arc::new(ManualClock::new(t0()));
        let svc = service(wallet, clock.clone());

        svc.dispense(ADDR).await.unwrap();
        assert_eq!(svc.prune(), 0);

        clock.advance(TimeDelta::hours(25));
        assert_eq!(svc.prune(), 1);
        assert_eq!(svc.limiter().tracked(), 0);
    }
}
