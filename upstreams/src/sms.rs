//! Simulated SMS alert delivery. Nothing leaves the process.

use crate::language::Language;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

const PREVIEW_CHARS: usize = 50;
const DEMO_PHONE: &str = "6290277345";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Weather,
    Crop,
    Market,
    Insurance,
    Emergency,
}

impl AlertType {
    pub const ALL: [AlertType; 5] = [
        AlertType::Weather,
        AlertType::Crop,
        AlertType::Market,
        AlertType::Insurance,
        AlertType::Emergency,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            AlertType::Weather => "weather",
            AlertType::Crop => "crop",
            AlertType::Market => "market",
            AlertType::Insurance => "insurance",
            AlertType::Emergency => "emergency",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SmsMessage {
    pub message: String,
    pub alert_type: AlertType,
    pub phone_number: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsReceipt {
    pub message_id: String,
    pub status: &'static str,
    pub phone_number: String,
    /// First characters of the message followed by `...`.
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub phone_number: String,
    pub alert_types: Vec<String>,
    pub language: Language,
    pub location: String,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionReceipt {
    pub subscription_id: String,
    pub message: &'static str,
    pub subscription: SubscriptionRecord,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsHistoryEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub message: String,
    pub timestamp: String,
    pub status: &'static str,
    pub phone_number: String,
}

fn preview(message: &str) -> String {
    let mut preview: String = message.chars().take(PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

fn iso(at: chrono::DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SmsClient;

impl SmsClient {
    pub fn send(&self, sms: &SmsMessage) -> SmsReceipt {
        let message = preview(&sms.message);
        info!(
            phone_number = %sms.phone_number,
            alert_type = sms.alert_type.as_str(),
            preview = %message,
            "SMS sent"
        );

        SmsReceipt {
            message_id: format!("sms_{}", Utc::now().timestamp_millis()),
            status: "sent",
            phone_number: sms.phone_number.clone(),
            message,
        }
    }

    /// `subscription.active` is forced on.
    pub fn subscribe(&self, mut subscription: Subscription) -> SubscriptionReceipt {
        subscription.active = true;
        let now = Utc::now();
        info!(phone_number = %subscription.phone_number, "subscribed to alerts");

        SubscriptionReceipt {
            subscription_id: format!("sub_{}", now.timestamp_millis()),
            message: "Successfully subscribed to alerts",
            subscription: SubscriptionRecord {
                subscription,
                created_at: iso(now),
            },
        }
    }

    pub fn history(&self) -> Vec<SmsHistoryEntry> {
        let now = Utc::now();
        vec![
            SmsHistoryEntry {
                id: "sms_1".to_string(),
                alert_type: AlertType::Weather,
                message: "Heavy rainfall expected in the next 24 hours".to_string(),
                timestamp: iso(now - ChronoDuration::hours(1)),
                status: "sent",
                phone_number: DEMO_PHONE.to_string(),
            },
            SmsHistoryEntry {
                id: "sms_2".to_string(),
                alert_type: AlertType::Crop,
                message: "Time to harvest your wheat crop".to_string(),
                timestamp: iso(now - ChronoDuration::hours(2)),
                status: "sent",
                phone_number: DEMO_PHONE.to_string(),
            },
        ]
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        vec![Subscription {
            phone_number: DEMO_PHONE.to_string(),
            alert_types: vec!["weather".to_string(), "crop".to_string()],
            language: Language::English,
            location: "Maharashtra".to_string(),
            active: true,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn send_truncates_preview() {
        let sms = SmsMessage {
            message: "x".repeat(120),
            alert_type: AlertType::Weather,
            phone_number: "9876543210".into(),
        };
        let receipt = SmsClient.send(&sms);
        assert_eq!(receipt.status, "sent");
        assert!(receipt.message_id.starts_with("sms_"));
        assert_eq!(receipt.message, format!("{}...", "x".repeat(50)));

        let short = SmsMessage {
            message: "Rain soon".into(),
            ..sms
        };
        assert_eq!(SmsClient.send(&short).message, "Rain soon...");
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        let hindi = "बारिश".repeat(20);
        let preview = preview(&hindi);
        assert_eq!(preview.chars().count(), 53);
    }

    #[test]
    fn subscription_serializes_flat() {
        let receipt = SmsClient.subscribe(Subscription {
            phone_number: "9876543210".into(),
            alert_types: vec!["market".into()],
            language: Language::Punjabi,
            location: "Ludhiana".into(),
            active: false,
        });
        let value = serde_json::to_value(&receipt).unwrap();
        assert_eq!(value["message"], json!("Successfully subscribed to alerts"));
        assert_eq!(value["subscription"]["active"], json!(true));
        assert_eq!(value["subscription"]["language"], json!("punjabi"));
        assert!(value["subscription"]["createdAt"].is_string());
    }

    #[test]
    fn demo_lists() {
        let history = SmsClient.history();
        assert_eq!(history.len(), 2);
        assert_eq!(serde_json::to_value(&history[0]).unwrap()["type"], json!("weather"));
        assert_eq!(SmsClient.subscriptions()[0].alert_types, ["weather", "crop"]);
        assert_eq!(AlertType::from_name("insurance"), Some(AlertType::Insurance));
        assert_eq!(AlertType::from_name("spam"), None);
    }
}
