use crate::api::response::{Envelope, timestamp};
use crate::state::AppState;
use crate::validation::{ValidJson, Validate, ValidationErrors};
use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};
use shared::timing::Stopwatch;
use upstreams::Language;
use upstreams::sms::{
    AlertType, SmsHistoryEntry, SmsMessage, SmsReceipt, Subscription, SubscriptionReceipt,
};

const ALERT_TYPES: [&str; 5] = ["weather", "crop", "market", "insurance", "emergency"];
const LANGUAGES: [&str; 5] = ["english", "hindi", "marathi", "gujarati", "punjabi"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    message: Option<String>,
    #[serde(rename = "type")]
    alert_type: Option<String>,
    phone_number: Option<String>,
}

impl Validate for SendRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("message", self.message.as_deref());
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            errors.length("message", message, 1, 160);
        }
        errors.required("type", self.alert_type.as_deref());
        if let Some(alert_type) = self.alert_type.as_deref().filter(|t| !t.is_empty()) {
            errors.one_of("type", alert_type, &ALERT_TYPES);
        }
        errors.required("phoneNumber", self.phone_number.as_deref());
        if let Some(phone) = self.phone_number.as_deref().filter(|p| !p.is_empty()) {
            errors.phone_number("phoneNumber", phone);
        }
        errors.into_result()
    }
}

pub async fn send(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<SendRequest>,
) -> Envelope<SmsReceipt> {
    let stopwatch = Stopwatch::start();
    let sms = SmsMessage {
        message: request.message.unwrap_or_default(),
        alert_type: request
            .alert_type
            .as_deref()
            .and_then(AlertType::from_name)
            .unwrap_or(AlertType::Weather),
        phone_number: request.phone_number.unwrap_or_default(),
    };
    Envelope::timed(state.upstreams.sms.send(&sms), &stopwatch)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    phone_number: Option<String>,
    alert_types: Option<Vec<String>>,
    language: Option<String>,
    location: Option<String>,
}

impl Validate for SubscribeRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("phoneNumber", self.phone_number.as_deref());
        if let Some(phone) = self.phone_number.as_deref().filter(|p| !p.is_empty()) {
            errors.phone_number("phoneNumber", phone);
        }
        match &self.alert_types {
            None => errors.push("alertTypes", "\"alertTypes\" is required"),
            Some(types) if types.is_empty() => {
                errors.push("alertTypes", "\"alertTypes\" must contain at least 1 items")
            }
            Some(_) => {}
        }
        if let Some(language) = &self.language {
            errors.one_of("language", language, &LANGUAGES);
        }
        errors.required("location", self.location.as_deref());
        errors.into_result()
    }
}

pub async fn subscribe(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<SubscribeRequest>,
) -> Envelope<SubscriptionReceipt> {
    let stopwatch = Stopwatch::start();
    let subscription = Subscription {
        phone_number: request.phone_number.unwrap_or_default(),
        alert_types: request.alert_types.unwrap_or_default(),
        language: request
            .language
            .as_deref()
            .and_then(Language::from_name)
            .unwrap_or_default(),
        location: request.location.unwrap_or_default(),
        active: true,
    };
    Envelope::timed(state.upstreams.sms.subscribe(subscription), &stopwatch)
}

pub async fn history(State(state): State<AppState>) -> Envelope<Vec<SmsHistoryEntry>> {
    Envelope::ok(state.upstreams.sms.history())
}

pub async fn subscriptions(State(state): State<AppState>) -> Envelope<Vec<Subscription>> {
    Envelope::ok(state.upstreams.sms.subscriptions())
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "healthy",
        "timestamp": timestamp(),
        "message": "SMS service operational",
    }))
}
