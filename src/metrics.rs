use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("faucet_requests_total", "Total number of faucet requests").unwrap();
    pub static ref DISPENSE_SUCCESS: Counter =
        register_counter!("faucet_dispense_success_total", "Successful dispenses").unwrap();
    pub static ref DISPENSE_FAILURE: Counter =
        register_counter!("faucet_dispense_failure_total", "Failed wallet invocations").unwrap();
    pub static ref RATE_LIMITED: Counter =
        register_counter!("faucet_rate_limited_total", "Requests rejected by the address rate limit").unwrap();
    pub static ref INVALID_ADDRESS: Counter =
        register_counter!("faucet_invalid_address_total", "Requests rejected for a malformed address").unwrap();
    pub static ref DISPENSE_LATENCY: Histogram = register_histogram!(
        "faucet_dispense_latency_seconds",
        "Wallet command latency in seconds",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]
    )
    .unwrap();
    pub static ref TRACKED_ADDRESSES: Gauge =
        register_gauge!("faucet_tracked_addresses", "Addresses currently inside their rate limit window").unwrap();
}
