//! Commodity market prices from the AGMARKNET open data API.

use crate::config::ServiceConfig;
use crate::errors::UpstreamError;
use crate::http::{Call, DATA_TIMEOUT, endpoint, fallback_after, send_json};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use tracing::{debug, warn};
use url::Url;

pub const RESOURCE_ID: &str = "9ef84268-d588-465a-a308-a864a43d0070";

pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 200;
pub const MAX_DROPDOWN_LIMIT: u64 = 2000;

const RECORDS: Call = Call {
    service: "AGMARKNET",
    endpoint: "records",
    timeout: DATA_TIMEOUT,
};

pub const FALLBACK_STATES: [&str; 36] = [
    "Andhra Pradesh",
    "Arunachal Pradesh",
    "Assam",
    "Bihar",
    "Chhattisgarh",
    "Goa",
    "Gujarat",
    "Haryana",
    "Himachal Pradesh",
    "Jharkhand",
    "Karnataka",
    "Kerala",
    "Madhya Pradesh",
    "Maharashtra",
    "Manipur",
    "Meghalaya",
    "Mizoram",
    "Nagaland",
    "Odisha",
    "Punjab",
    "Rajasthan",
    "Sikkim",
    "Tamil Nadu",
    "Telangana",
    "Tripura",
    "Uttar Pradesh",
    "Uttarakhand",
    "West Bengal",
    "Delhi",
    "Jammu and Kashmir",
    "Ladakh",
    "Chandigarh",
    "Dadra and Nagar Haveli and Daman and Diu",
    "Lakshadweep",
    "Puducherry",
    "Andaman and Nicobar Islands",
];

pub const FALLBACK_COMMODITIES: [&str; 19] = [
    "Wheat", "Rice", "Maize", "Bajra", "Jowar", "Ragi", "Pulses", "Potato", "Tomato", "Onion",
    "Garlic", "Ginger", "Turmeric", "Cotton", "Sugarcane", "Tea", "Coffee", "Cardamom", "Pepper",
];

/// Query parameters accepted by the price proxy. Values are kept as sent
/// and interpreted by the accessors below.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct MarketQuery {
    pub commodity: Option<String>,
    pub market: Option<String>,
    pub date: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub variety: Option<String>,
    pub grade: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub dropdown: Option<String>,
}

impl MarketQuery {
    pub fn dropdown() -> Self {
        MarketQuery {
            dropdown: Some("true".to_string()),
            limit: Some(MAX_DROPDOWN_LIMIT.to_string()),
            ..MarketQuery::default()
        }
    }

    pub fn is_dropdown(&self) -> bool {
        self.dropdown.as_deref() == Some("true")
    }

    /// The requested limit rounded down, or the default when absent, below
    /// one or not a number.
    pub fn requested_limit(&self) -> u64 {
        self.limit
            .as_deref()
            .and_then(|limit| limit.trim().parse::<f64>().ok())
            .filter(|limit| limit.is_finite() && *limit >= 1.0)
            .map(|limit| limit.floor() as u64)
            .unwrap_or(DEFAULT_LIMIT)
    }

    /// The limit sent upstream, capped at 2000 for dropdowns and 200 otherwise.
    pub fn effective_limit(&self) -> u64 {
        let max = if self.is_dropdown() {
            MAX_DROPDOWN_LIMIT
        } else {
            MAX_LIMIT
        };
        self.requested_limit().min(max)
    }

    pub fn effective_offset(&self) -> u64 {
        self.offset
            .as_deref()
            .and_then(|offset| offset.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Upstream filter name and value for every filter that is set.
    pub fn filters(&self) -> Vec<(&'static str, &str)> {
        [
            ("commodity", &self.commodity),
            ("market", &self.market),
            ("arrival_date", &self.date),
            ("state", &self.state),
            ("district", &self.district),
            ("variety", &self.variety),
            ("grade", &self.grade),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .filter(|value| !value.is_empty())
                .map(|value| (name, value))
        })
        .collect()
    }

    /// Cache key parameters; two queries that hit the same upstream URL
    /// share them.
    pub fn cache_params(&self) -> Vec<(&'static str, String)> {
        let mut params: Vec<(&'static str, String)> = self
            .filters()
            .into_iter()
            .map(|(name, value)| (name, value.to_string()))
            .collect();
        params.push(("limit", self.effective_limit().to_string()));
        params.push(("offset", self.effective_offset().to_string()));
        params.push(("dropdown", self.is_dropdown().to_string()));
        params
    }
}

/// Empty records envelope served when no data can be fetched.
pub fn empty_records(query: &MarketQuery) -> Value {
    json!({
        "records": [],
        "total": 0,
        "count": 0,
        "limit": query.effective_limit(),
        "offset": query.effective_offset(),
    })
}

/// Distinct non-empty values of `field` across `response.records`, merged
/// with `fallback` and sorted.
pub fn distinct_values(response: &Value, field: &str, fallback: &[&str]) -> Vec<String> {
    let from_records = response
        .get("records")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|record| record.get(field).and_then(Value::as_str))
        .filter(|value| !value.is_empty());

    from_records
        .chain(fallback.iter().copied())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Clone)]
struct LiveMarket {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl LiveMarket {
    async fn query(&self, query: &MarketQuery) -> Result<Value, UpstreamError> {
        let url = endpoint(&self.base_url, RESOURCE_ID)?;
        let mut params: Vec<(String, String)> = vec![
            ("api-key".to_string(), self.api_key.clone()),
            ("format".to_string(), "json".to_string()),
            ("limit".to_string(), query.effective_limit().to_string()),
            ("offset".to_string(), query.effective_offset().to_string()),
        ];
        params.extend(
            query
                .filters()
                .into_iter()
                .map(|(name, value)| (format!("filters[{name}]"), value.to_string())),
        );

        let response: Value = send_json(RECORDS, self.client.get(url).query(&params)).await?;
        if !response.is_object() {
            return Err(UpstreamError::InvalidResponse {
                service: RECORDS.service,
                reason: "expected a JSON object".to_string(),
            });
        }

        let received = response
            .get("records")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        debug!(received, limit = query.effective_limit(), "AGMARKNET records received");
        Ok(response)
    }
}

#[derive(Clone)]
enum Source {
    Live(LiveMarket),
    Simulated,
}

#[derive(Clone)]
pub struct MarketClient(Source);

impl MarketClient {
    pub fn new(config: &ServiceConfig, client: reqwest::Client) -> Self {
        let Some(api_key) = config.credential() else {
            warn!("AGMARKNET API key not configured, market queries return no records");
            return Self::simulated();
        };

        match config.parsed_base_url() {
            Ok(base_url) => MarketClient(Source::Live(LiveMarket {
                client,
                base_url,
                api_key: api_key.to_string(),
            })),
            Err(err) => {
                warn!(error = %err, "AGMARKNET base URL is invalid, market queries return no records");
                Self::simulated()
            }
        }
    }

    pub fn simulated() -> Self {
        MarketClient(Source::Simulated)
    }

    pub fn is_live(&self) -> bool {
        matches!(self.0, Source::Live(_))
    }

    /// The upstream response body as received.
    pub async fn query(&self, query: &MarketQuery) -> Value {
        let Source::Live(live) = &self.0 else {
            return empty_records(query);
        };
        live.query(query).await.unwrap_or_else(|err| {
            fallback_after(RECORDS, &err);
            empty_records(query)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::spawn_upstream;
    use axum::Router;
    use axum::extract::Query;
    use axum::routing::get;
    use std::collections::HashMap;

    fn with_limit(limit: &str, dropdown: bool) -> MarketQuery {
        MarketQuery {
            limit: Some(limit.to_string()),
            dropdown: dropdown.then(|| "true".to_string()),
            ..MarketQuery::default()
        }
    }

    #[test]
    fn limit_is_clamped_by_mode() {
        assert_eq!(with_limit("5000", false).effective_limit(), 200);
        assert_eq!(with_limit("5000", true).effective_limit(), 2000);
        assert_eq!(with_limit("150", false).effective_limit(), 150);
        assert_eq!(with_limit("150.5", false).effective_limit(), 150);
        assert_eq!(with_limit("2500.5", true).effective_limit(), 2000);
        assert_eq!(with_limit("0.5", false).effective_limit(), 10);
        assert_eq!(with_limit("abc", false).effective_limit(), 10);
        assert_eq!(with_limit("0", true).effective_limit(), 10);
        assert_eq!(MarketQuery::default().effective_limit(), 10);
    }

    #[test]
    fn dropdown_only_when_true() {
        let mut query = MarketQuery::default();
        assert!(!query.is_dropdown());
        query.dropdown = Some("yes".into());
        assert!(!query.is_dropdown());
        assert!(MarketQuery::dropdown().is_dropdown());
        assert_eq!(MarketQuery::dropdown().effective_limit(), 2000);
    }

    #[test]
    fn date_filters_on_arrival_date() {
        let query = MarketQuery {
            date: Some("01/05/2024".into()),
            commodity: Some("Onion".into()),
            market: Some(String::new()),
            ..MarketQuery::default()
        };
        assert_eq!(
            query.filters(),
            vec![("commodity", "Onion"), ("arrival_date", "01/05/2024")]
        );
    }

    #[test]
    fn distinct_values_merge_fallback() {
        let response = json!({"records": [
            {"state": "Kerala"}, {"state": "Atlantis"}, {"state": "Kerala"}, {"state": ""}, {"district": "x"}
        ]});
        let states = distinct_values(&response, "state", &["Goa", "Kerala"]);
        assert_eq!(states, ["Atlantis", "Goa", "Kerala"]);

        let states = distinct_values(&json!({}), "state", &FALLBACK_STATES);
        assert_eq!(states.len(), FALLBACK_STATES.len());
        assert!(states.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn simulated_returns_empty_envelope() {
        let body = MarketClient::simulated().query(&with_limit("500", false)).await;
        assert_eq!(
            body,
            json!({"records": [], "total": 0, "count": 0, "limit": 200, "offset": 0})
        );
    }

    #[tokio::test]
    async fn live_query_sends_clamped_limit_and_filters() {
        let app = Router::new().route(
            &format!("/{RESOURCE_ID}"),
            get(|Query(params): Query<HashMap<String, String>>| async move {
                axum::Json(json!({
                    "records": [{"state": "Goa"}],
                    "echo": params,
                }))
            }),
        );
        let base = spawn_upstream(app).await;
        let config = ServiceConfig {
            api_key: Some("key".into()),
            base_url: base.to_string(),
        };
        let client = MarketClient::new(&config, reqwest::Client::new());

        let query = MarketQuery {
            state: Some("Goa".into()),
            ..with_limit("900", false)
        };
        let body = client.query(&query).await;
        let echo = &body["echo"];
        assert_eq!(echo["api-key"], json!("key"));
        assert_eq!(echo["format"], json!("json"));
        assert_eq!(echo["limit"], json!("200"));
        assert_eq!(echo["offset"], json!("0"));
        assert_eq!(echo["filters[state]"], json!("Goa"));
    }
}
