use axum::{extract::State, response::Html};
use std::sync::Arc;

use crate::config::FaucetConfig;
use crate::error::describe_window;
use crate::models::MIN_ADDRESS_LEN;
use crate::state::AppState;

const INDEX_TEMPLATE: &str = include_str!("../../static/index.html");

/// Fill the page template once at startup.
pub fn render_index(config: &FaucetConfig, chain_id: &str) -> String {
    INDEX_TEMPLATE
        .replace("{{chain_id}}", chain_id)
        .replace("{{amount_label}}", &config.amount_label)
        .replace("{{address_prefix}}", &config.address_prefix)
        .replace("{{min_length}}", &MIN_ADDRESS_LEN.to_string())
        .replace("{{window}}", &describe_window(&config.rate_window))
}

pub async fn index_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.index_html.clone())
}
