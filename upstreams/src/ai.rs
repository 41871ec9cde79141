//! Chat, crop recommendation and disease diagnosis completions from Gemini.

use crate::config::AiConfig;
use crate::errors::UpstreamError;
use crate::http::{Call, TEXT_TIMEOUT, VISION_TIMEOUT, endpoint, fallback_after, send_json};
use crate::language::Language;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use url::Url;

const SERVICE: &str = "Gemini";
const CHAT: Call = Call {
    service: SERVICE,
    endpoint: "chat",
    timeout: TEXT_TIMEOUT,
};
const CROPS: Call = Call {
    service: SERVICE,
    endpoint: "crop-recommendations",
    timeout: TEXT_TIMEOUT,
};
const DIAGNOSIS: Call = Call {
    service: "Gemini Vision",
    endpoint: "disease-diagnosis",
    timeout: VISION_TIMEOUT,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropRecommendation {
    pub crop_name: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub expected_yield: String,
    #[serde(default)]
    pub investment_required: String,
    #[serde(default)]
    pub roi: String,
}

impl CropRecommendation {
    fn fixed(
        crop_name: &str,
        confidence: f64,
        reasons: [&str; 3],
        expected_yield: &str,
        investment_required: &str,
        roi: &str,
    ) -> Self {
        CropRecommendation {
            crop_name: crop_name.to_string(),
            confidence,
            reasons: reasons.iter().map(|r| r.to_string()).collect(),
            expected_yield: expected_yield.to_string(),
            investment_required: investment_required.to_string(),
            roi: roi.to_string(),
        }
    }
}

/// Farm description a crop recommendation is asked for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropQuery {
    pub soil_type: String,
    pub climate: String,
    pub season: String,
    /// Hectares.
    pub farm_size: f64,
    pub location: String,
}

/// Served when a completion arrives but holds no parseable list.
pub fn unparsed_recommendations() -> Vec<CropRecommendation> {
    vec![
        CropRecommendation::fixed(
            "Wheat",
            0.92,
            [
                "Suitable for current soil conditions",
                "Good market demand",
                "Optimal planting season",
            ],
            "25-30 quintals/hectare",
            "₹15,000-20,000/hectare",
            "25-30%",
        ),
        CropRecommendation::fixed(
            "Cotton",
            0.85,
            [
                "High market price",
                "Suitable climate",
                "Government support available",
            ],
            "15-20 quintals/hectare",
            "₹25,000-30,000/hectare",
            "35-40%",
        ),
        CropRecommendation::fixed(
            "Sugarcane",
            0.78,
            [
                "Long-term crop",
                "Guaranteed purchase",
                "Good for large farms",
            ],
            "400-500 quintals/hectare",
            "₹40,000-50,000/hectare",
            "20-25%",
        ),
    ]
}

/// Served when no completion is available at all.
pub fn seasonal_recommendations(season: &str) -> Vec<CropRecommendation> {
    if season.to_lowercase().contains("kharif") {
        vec![CropRecommendation::fixed(
            "Rice",
            0.9,
            ["Monsoon crop", "High demand", "Government MSP available"],
            "40-50 quintals/hectare",
            "₹20,000-25,000/hectare",
            "20-25%",
        )]
    } else {
        vec![CropRecommendation::fixed(
            "Wheat",
            0.92,
            ["Winter crop", "Stable prices", "Good storage life"],
            "25-30 quintals/hectare",
            "₹15,000-20,000/hectare",
            "25-30%",
        )]
    }
}

pub fn fallback_diagnosis(crop_type: &str) -> String {
    format!(
        "Unable to analyze the image at the moment. Please try again or consult with a local agricultural expert. \
         Common issues in {crop_type} include fungal infections, nutrient deficiencies, and pest damage. \
         Consider regular monitoring and preventive measures."
    )
}

/// Extracts the JSON array spanning the first `[` to the last `]` of a
/// completion.
pub fn parse_crop_recommendations(text: &str) -> Vec<CropRecommendation> {
    let candidate = match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            warn!("AI response holds no JSON array, using fallback recommendations");
            return unparsed_recommendations();
        }
    };

    match serde_json::from_str(candidate) {
        Ok(recommendations) => recommendations,
        Err(err) => {
            warn!(error = %err, "failed to parse JSON from AI response, using fallback recommendations");
            unparsed_recommendations()
        }
    }
}

fn chat_prompt(message: &str, language: Language, context: Option<&Value>) -> String {
    let context = context
        .map(Value::to_string)
        .unwrap_or_else(|| "General agricultural query".to_string());

    format!(
        "You are KrishakSure AI, an expert agricultural assistant for Indian farmers.\n\
         Respond in {language}.\n\n\
         Keep responses practical, actionable, and culturally appropriate for Indian farming practices.\n\
         Include specific advice about timing, quantities, costs in Indian Rupees, and local resources.\n\n\
         Context: {context}\n\n\
         User question: {message}",
        language = language.prompt_label(),
    )
}

fn crops_prompt(query: &CropQuery) -> String {
    format!(
        "As an agricultural expert for {location}, India, recommend the top 3 crops for:\n\
         - Soil type: {soil}\n\
         - Climate: {climate}\n\
         - Season: {season}\n\
         - Farm size: {size} hectares\n\n\
         Provide specific recommendations with expected yield, investment, and ROI in INR.\n\
         Format the response as a JSON array with objects containing: cropName, confidence, reasons (array), expectedYield, investmentRequired, roi.",
        location = query.location,
        soil = query.soil_type,
        climate = query.climate,
        season = query.season,
        size = query.farm_size,
    )
}

fn diagnosis_prompt(crop_type: &str) -> String {
    format!(
        "Analyze this {crop_type} plant image for diseases, pests, or nutrient deficiencies.\n\
         Provide diagnosis, treatment recommendations, and prevention measures.\n\
         Include cost-effective solutions available in India."
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: String },
    Image { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'static str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    max_output_tokens: u32,
}

impl GenerationConfig {
    const fn with_temperature(temperature: f32) -> Self {
        GenerationConfig {
            temperature,
            top_k: None,
            top_p: None,
            max_output_tokens: 1024,
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let part = candidate.content.parts.into_iter().next()?;
        Some(part.text).filter(|text| !text.is_empty())
    }
}

#[derive(Clone)]
struct LiveAi {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    chat_model: String,
    vision_model: String,
}

impl LiveAi {
    async fn generate(
        &self,
        call: Call,
        model: &str,
        parts: Vec<Part<'_>>,
        generation_config: GenerationConfig,
    ) -> Result<String, UpstreamError> {
        let url = endpoint(&self.base_url, &format!("models/{model}:generateContent"))?;
        let body = GenerateRequest {
            contents: [Content { parts }],
            generation_config,
        };
        let request = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body);

        let response: GenerateResponse = send_json(call, request).await?;
        response
            .into_text()
            .ok_or_else(|| UpstreamError::InvalidResponse {
                service: call.service,
                reason: "no candidate text".to_string(),
            })
    }
}

#[derive(Clone)]
enum Source {
    Live(LiveAi),
    Simulated,
}

#[derive(Clone)]
pub struct AiClient(Source);

impl AiClient {
    pub fn new(config: &AiConfig, client: reqwest::Client) -> Self {
        let Some(api_key) = config.service.credential() else {
            warn!("Gemini API key not configured, serving canned AI responses");
            return Self::simulated();
        };

        match config.service.parsed_base_url() {
            Ok(base_url) => AiClient(Source::Live(LiveAi {
                client,
                base_url,
                api_key: api_key.to_string(),
                chat_model: config.chat_model.clone(),
                vision_model: config.vision_model.clone(),
            })),
            Err(err) => {
                warn!(error = %err, "Gemini base URL is invalid, serving canned AI responses");
                Self::simulated()
            }
        }
    }

    pub fn simulated() -> Self {
        AiClient(Source::Simulated)
    }

    pub fn is_live(&self) -> bool {
        matches!(self.0, Source::Live(_))
    }

    pub async fn chat(&self, message: &str, language: Language, context: Option<&Value>) -> String {
        let Source::Live(live) = &self.0 else {
            return language.fallback_reply().to_string();
        };

        let parts = vec![Part::Text {
            text: chat_prompt(message, language, context),
        }];
        let generation_config = GenerationConfig {
            top_k: Some(40),
            top_p: Some(0.95),
            ..GenerationConfig::with_temperature(0.7)
        };

        live.generate(CHAT, &live.chat_model, parts, generation_config)
            .await
            .unwrap_or_else(|err| {
                fallback_after(CHAT, &err);
                language.fallback_reply().to_string()
            })
    }

    pub async fn crop_recommendations(&self, query: &CropQuery) -> Vec<CropRecommendation> {
        let Source::Live(live) = &self.0 else {
            return seasonal_recommendations(&query.season);
        };

        let parts = vec![Part::Text {
            text: crops_prompt(query),
        }];
        match live
            .generate(CROPS, &live.chat_model, parts, GenerationConfig::with_temperature(0.5))
            .await
        {
            Ok(text) => parse_crop_recommendations(&text),
            Err(err) => {
                fallback_after(CROPS, &err);
                seasonal_recommendations(&query.season)
            }
        }
    }

    /// `image_base64` is sent as JPEG inline data; size limits are the
    /// caller's concern.
    pub async fn diagnose_disease(&self, image_base64: &str, crop_type: &str) -> String {
        let Source::Live(live) = &self.0 else {
            return fallback_diagnosis(crop_type);
        };

        let parts = vec![
            Part::Text {
                text: diagnosis_prompt(crop_type),
            },
            Part::Image {
                inline_data: InlineData {
                    mime_type: "image/jpeg",
                    data: image_base64,
                },
            },
        ];

        live.generate(
            DIAGNOSIS,
            &live.vision_model,
            parts,
            GenerationConfig::with_temperature(0.3),
        )
        .await
        .unwrap_or_else(|err| {
            fallback_after(DIAGNOSIS, &err);
            fallback_diagnosis(crop_type)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::testutils::spawn_upstream;
    use axum::Router;
    use axum::extract::{Path, Query};
    use axum::routing::post;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn query(season: &str) -> CropQuery {
        CropQuery {
            soil_type: "black".into(),
            climate: "tropical".into(),
            season: season.into(),
            farm_size: 2.5,
            location: "Pune".into(),
        }
    }

    fn live(base_url: &Url) -> AiClient {
        let config = AiConfig {
            service: ServiceConfig {
                api_key: Some("k".into()),
                base_url: base_url.to_string(),
            },
            ..AiConfig::default()
        };
        AiClient::new(&config, reqwest::Client::new())
    }

    fn completion(text: &str) -> Value {
        json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
    }

    #[test]
    fn parses_array_embedded_in_prose() {
        let text = r#"Here you go:
```json
[{"cropName": "Soybean", "confidence": 0.8, "reasons": ["Rain fed"], "expectedYield": "10 q/ha", "investmentRequired": "₹10,000", "roi": "30%"}]
```
Good luck [farmer]."#;
        // The last `]` belongs to the trailing prose, so this does not parse.
        assert_eq!(parse_crop_recommendations(text), unparsed_recommendations());

        let text = r#"Sure. [{"cropName": "Soybean", "confidence": 0.8, "reasons": ["Rain fed"], "expectedYield": "10 q/ha", "investmentRequired": "₹10,000", "roi": "30%"}] Thanks."#;
        let parsed = parse_crop_recommendations(text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].crop_name, "Soybean");
        assert_eq!(parsed[0].reasons, vec!["Rain fed"]);
    }

    #[test]
    fn unparseable_text_yields_three_fixed_crops() {
        for text in ["no json here", "] backwards [", "[not json]", r#"{"cropName": "x"}"#] {
            let parsed = parse_crop_recommendations(text);
            let names: Vec<&str> = parsed.iter().map(|c| c.crop_name.as_str()).collect();
            assert_eq!(names, ["Wheat", "Cotton", "Sugarcane"]);
            assert_eq!(parsed[2].confidence, 0.78);
        }
    }

    #[test]
    fn seasonal_fallback() {
        assert_eq!(seasonal_recommendations("Kharif 2024")[0].crop_name, "Rice");
        assert_eq!(seasonal_recommendations("rabi")[0].crop_name, "Wheat");
        assert_eq!(seasonal_recommendations("")[0].confidence, 0.92);
    }

    #[test]
    fn chat_prompt_embeds_language_and_context() {
        let prompt = chat_prompt("When to sow?", Language::Hindi, None);
        assert!(prompt.contains("Respond in Hindi (Devanagari script)."));
        assert!(prompt.contains("Context: General agricultural query"));
        assert!(prompt.ends_with("User question: When to sow?"));

        let context = json!({"crop": "wheat"});
        let prompt = chat_prompt("?", Language::English, Some(&context));
        assert!(prompt.contains(r#"Context: {"crop":"wheat"}"#));
    }

    #[tokio::test]
    async fn simulated_client_answers_locally() {
        let client = AiClient::simulated();
        assert_eq!(
            client.chat("hi", Language::Marathi, None).await,
            Language::Marathi.fallback_reply()
        );
        assert_eq!(client.crop_recommendations(&query("kharif")).await[0].crop_name, "Rice");
        assert!(client.diagnose_disease("AAAA", "tomato").await.contains("Common issues in tomato"));
    }

    #[tokio::test]
    async fn live_chat_sends_generation_config() {
        let seen: Arc<Mutex<Vec<(String, Value)>>> = Arc::default();
        let recorder = seen.clone();
        let app = Router::new().route(
            "/models/{model}",
            post(
                move |Path(model): Path<String>,
                      Query(params): Query<HashMap<String, String>>,
                      axum::Json(body): axum::Json<Value>| {
                    let recorder = recorder.clone();
                    async move {
                        assert_eq!(params.get("key").map(String::as_str), Some("k"));
                        recorder.lock().unwrap().push((model, body));
                        axum::Json(completion("Sow after the first rains."))
                    }
                },
            ),
        );
        let base = spawn_upstream(app).await;

        let reply = live(&base).chat("When to sow?", Language::English, None).await;
        assert_eq!(reply, "Sow after the first rains.");

        let seen = seen.lock().unwrap();
        let (model, body) = &seen[0];
        assert_eq!(model, "gemini-pro:generateContent");
        assert_eq!(body["generationConfig"]["temperature"], json!(0.7));
        assert_eq!(body["generationConfig"]["topK"], json!(40));
        assert_eq!(body["generationConfig"]["maxOutputTokens"], json!(1024));
    }

    #[tokio::test]
    async fn live_crops_parse_or_fall_back() {
        let app = Router::new().route(
            "/models/{model}",
            post(|| async {
                axum::Json(completion(
                    r#"[{"cropName": "Millet", "confidence": 0.7, "reasons": [], "expectedYield": "", "investmentRequired": "", "roi": ""}]"#,
                ))
            }),
        );
        let base = spawn_upstream(app).await;
        let crops = live(&base).crop_recommendations(&query("rabi")).await;
        assert_eq!(crops[0].crop_name, "Millet");

        let app = Router::new().route(
            "/models/{model}",
            post(|| async { axum::Json(json!({"candidates": []})) }),
        );
        let base = spawn_upstream(app).await;
        let crops = live(&base).crop_recommendations(&query("kharif")).await;
        assert_eq!(crops, seasonal_recommendations("kharif"));
    }

    #[tokio::test]
    async fn live_diagnosis_uses_vision_model_with_inline_image() {
        let app = Router::new().route(
            "/models/{model}",
            post(|Path(model): Path<String>, axum::Json(body): axum::Json<Value>| async move {
                assert_eq!(model, "gemini-pro-vision:generateContent");
                let parts = &body["contents"][0]["parts"];
                assert_eq!(parts[1]["inline_data"]["mime_type"], json!("image/jpeg"));
                assert_eq!(parts[1]["inline_data"]["data"], json!("QUJD"));
                assert_eq!(body["generationConfig"]["temperature"], json!(0.3));
                axum::Json(completion("Leaf blight."))
            }),
        );
        let base = spawn_upstream(app).await;
        assert_eq!(live(&base).diagnose_disease("QUJD", "rice").await, "Leaf blight.");
    }
}
