//! Commodity price proxy in front of the data.gov.in AGMARKNET resource.

use crate::api::response::Envelope;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use response_cache::keys::composite_key;
use serde_json::Value;
use tracing::debug;
use upstreams::market::{FALLBACK_COMMODITIES, FALLBACK_STATES, MarketQuery, distinct_values};

fn has_records(response: &Value) -> bool {
    response
        .get("records")
        .and_then(Value::as_array)
        .is_some_and(|records| !records.is_empty())
}

/// Dropdown queries are cached; record listings always go upstream.
/// Responses without records are never cached.
async fn fetch(state: &AppState, query: &MarketQuery) -> Value {
    if !query.is_dropdown() {
        return state.upstreams.market.query(query).await;
    }

    let key = composite_key("agmarknet", query.cache_params());
    if let Some(cached) = state.cache.get_dropdown_data::<Value>(&key) {
        debug!(%key, "serving dropdown data from cache");
        return cached;
    }

    let response = state.upstreams.market.query(query).await;
    if has_records(&response) {
        state.cache.set_dropdown_data(&key, &response, None);
    }
    response
}

/// The upstream body is passed through unchanged.
pub async fn prices(State(state): State<AppState>, Query(query): Query<MarketQuery>) -> Json<Value> {
    Json(fetch(&state, &query).await)
}

pub async fn states(State(state): State<AppState>) -> Envelope<Vec<String>> {
    let response = fetch(&state, &MarketQuery::dropdown()).await;
    Envelope::ok(distinct_values(&response, "state", &FALLBACK_STATES))
}

pub async fn commodities(State(state): State<AppState>) -> Envelope<Vec<String>> {
    let response = fetch(&state, &MarketQuery::dropdown()).await;
    Envelope::ok(distinct_values(&response, "commodity", &FALLBACK_COMMODITIES))
}
