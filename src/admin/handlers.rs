use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct ProxyStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub backend: String,
    pub strip_volatile_keys: bool,
    pub strip_timestamp_prefixes: bool,
    pub targets: Vec<String>,
    pub in_flight: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<ProxyStatus> {
    let config = &state.config;
    let max = config.backend.max_connections;

    Json(ProxyStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        backend: config.backend.base_url.clone(),
        strip_volatile_keys: config.normalization.strip_volatile_keys,
        strip_timestamp_prefixes: config.normalization.strip_timestamp_prefixes,
        targets: config.targets.iter().map(|t| t.path.clone()).collect(),
        in_flight: max.saturating_sub(state.permits.available_permits()),
    })
}
