use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::config::{Config, SafetyProfile};
use crate::llm::{GenerateFuture, PreparedImage, VisionModel};
use crate::utils::http::build_http_client;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    Other(IgnoredAny),
}

#[derive(Debug, Clone, Default)]
struct GenerationSettings {
    temperature: Option<f32>,
    top_k: Option<i32>,
    top_p: Option<f32>,
    max_output_tokens: Option<i32>,
}

/// Client for the `generateContent` endpoint of the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    api_base: Url,
    model: String,
    generation: GenerationSettings,
    safety: SafetyProfile,
    timeout: Duration,
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn build_safety_settings(profile: SafetyProfile) -> Option<Vec<Value>> {
    let threshold = match profile {
        SafetyProfile::Default => return None,
        SafetyProfile::Standard => "BLOCK_MEDIUM_AND_ABOVE",
        SafetyProfile::Permissive => "OFF",
    };

    Some(vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
    ])
}

fn build_generation_config(settings: &GenerationSettings) -> Option<Value> {
    let mut map = Map::new();
    if let Some(temperature) = settings.temperature {
        map.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(top_k) = settings.top_k {
        map.insert("topK".to_string(), json!(top_k));
    }
    if let Some(top_p) = settings.top_p {
        map.insert("topP".to_string(), json!(top_p));
    }
    if let Some(max_output_tokens) = settings.max_output_tokens {
        map.insert("maxOutputTokens".to_string(), json!(max_output_tokens));
    }

    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let mut summarized_contents = Vec::new();
        for content in contents {
            let role = content
                .get("role")
                .and_then(|value| value.as_str())
                .unwrap_or("user");
            let parts = content
                .get("parts")
                .and_then(|value| value.as_array())
                .map(|parts| summarize_gemini_parts(parts))
                .unwrap_or_default();
            summarized_contents.push(json!({ "role": role, "parts": parts }));
        }
        summary.insert("contents".to_string(), Value::Array(summarized_contents));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    if let Some(safety) = payload
        .get("safetySettings")
        .and_then(|value| value.as_array())
    {
        summary.insert("safetySettingsCount".to_string(), json!(safety.len()));
    }

    Value::Object(summary)
}

fn summarize_gemini_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut text_preview = None;

    let candidates = response.candidates.as_deref().unwrap_or(&[]);
    for candidate in candidates {
        let parts = candidate
            .content
            .as_ref()
            .and_then(|content| content.parts.as_deref())
            .unwrap_or(&[]);
        for part in parts {
            if let GeminiPart::Text { text } = part {
                text_parts += 1;
                if text_preview.is_none() && !text.trim().is_empty() {
                    text_preview = Some(truncate_for_log(text, 200));
                }
            }
        }
    }

    json!({
        "candidates": candidates.len(),
        "textParts": text_parts,
        "finishReason": candidates.first().and_then(|candidate| candidate.finish_reason.clone()),
        "textPreview": text_preview
    })
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn extract_text_from_response(response: GeminiResponse) -> Result<String> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(anyhow!("Gemini blocked the request: {}", reason));
    }

    let Some(candidate) = response.candidates.unwrap_or_default().into_iter().next() else {
        return Err(anyhow!("Gemini returned no candidates"));
    };
    let text: String = candidate
        .content
        .and_then(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| match part {
            GeminiPart::Text { text } => Some(text),
            GeminiPart::Other(_) => None,
        })
        .collect();

    if text.is_empty() {
        return Err(anyhow!(
            "Gemini returned no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ));
    }
    Ok(text)
}

impl GeminiClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(GeminiClient {
            http: build_http_client()?,
            api_key: config.gemini_api_key.clone(),
            api_base: config.gemini_api_base.clone(),
            model: config.gemini_model.clone(),
            generation: GenerationSettings {
                temperature: config.gemini_temperature,
                top_k: config.gemini_top_k,
                top_p: config.gemini_top_p,
                max_output_tokens: config.gemini_max_output_tokens,
            },
            safety: config.gemini_safety_settings,
            timeout: config.gemini_timeout,
        })
    }

    fn redact_api_key(&self, text: &str) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn endpoint(&self) -> Result<Url> {
        self.api_base
            .join(&format!("models/{}:generateContent", self.model))
            .context("Failed to build Gemini endpoint URL")
    }

    fn build_payload(&self, prompt: &str, image: &PreparedImage) -> Value {
        let encoded = general_purpose::STANDARD.encode(&image.bytes);
        let mut payload = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    { "inlineData": { "mimeType": image.mime_type, "data": encoded } }
                ]
            }]
        });

        if let Some(object) = payload.as_object_mut() {
            if let Some(generation_config) = build_generation_config(&self.generation) {
                object.insert("generationConfig".to_string(), generation_config);
            }
            if let Some(safety_settings) = build_safety_settings(self.safety) {
                object.insert("safetySettings".to_string(), Value::Array(safety_settings));
            }
        }
        payload
    }

    async fn call_gemini_api(&self, payload: Value) -> Result<GeminiResponse> {
        let url = self.endpoint()?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_gemini_payload(&payload);
            debug!(target: "llm.gemini", model = %self.model, payload = %payload_summary);
        }

        let response = match self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let err_text = self.redact_api_key(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, status={:?})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect(),
                    err.status()
                );
                if err.is_timeout() {
                    return Err(anyhow!(
                        "Gemini request timed out after {}s",
                        self.timeout.as_secs()
                    ));
                }
                return Err(anyhow!("Gemini request failed: {}", err_text));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = message.unwrap_or(body_summary);
            return Err(anyhow!(
                "Gemini request failed with status {}: {}",
                status,
                self.redact_api_key(&detail)
            ));
        }

        let value = response
            .json::<GeminiResponse>()
            .await
            .map_err(|err| anyhow!("Failed to read Gemini response: {}", self.redact_api_key(&err.to_string())))?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let response_summary = summarize_gemini_response(&value);
            debug!(target: "llm.gemini", model = %self.model, response = %response_summary);
        }
        Ok(value)
    }
}

impl VisionModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate<'a>(&'a self, prompt: &'a str, image: &'a PreparedImage) -> GenerateFuture<'a> {
        Box::pin(async move {
            let payload = self.build_payload(prompt, image);
            let metadata = json!({
                "mimeType": image.mime_type,
                "imageBytes": image.bytes.len(),
            });
            log_llm_timing("gemini", &self.model, "critique", Some(metadata), || async {
                let response = self.call_gemini_api(payload).await?;
                extract_text_from_response(response)
            })
            .await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn client(pairs: &[(&str, &str)]) -> GeminiClient {
        let mut vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        vars.insert("GEMINI_API_KEY".to_string(), "test-key".to_string());
        let config = Config::from_vars(&vars).unwrap();
        GeminiClient::from_config(&config).unwrap()
    }

    fn image() -> PreparedImage {
        PreparedImage {
            bytes: vec![1, 2, 3],
            mime_type: "image/png".to_string(),
            dimensions: Some((1, 1)),
        }
    }

    #[test]
    fn builds_endpoint_from_base_and_model() {
        let client = client(&[("GEMINI_MODEL", "gemini-2.0-flash")]);
        assert_eq!(
            client.endpoint().unwrap().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn payload_carries_prompt_then_inline_image() {
        let client = client(&[]);
        let payload = client.build_payload("rate this ad", &image());
        let parts = payload.pointer("/contents/0/parts").unwrap();
        assert_eq!(parts[0], json!({ "text": "rate this ad" }));
        assert_eq!(
            parts[1],
            json!({ "inlineData": { "mimeType": "image/png", "data": "AQID" } })
        );
        assert!(payload.get("generationConfig").is_none());
        assert!(payload.get("safetySettings").is_none());
    }

    #[test]
    fn payload_includes_configured_generation_settings() {
        let client = client(&[
            ("GEMINI_TEMPERATURE", "0.2"),
            ("GEMINI_MAX_OUTPUT_TOKENS", "1024"),
            ("GEMINI_SAFETY_SETTINGS", "standard"),
        ]);
        let payload = client.build_payload("p", &image());
        assert_eq!(payload["generationConfig"]["maxOutputTokens"], json!(1024));
        assert!(payload["generationConfig"].get("topK").is_none());
        let safety = payload["safetySettings"].as_array().unwrap();
        assert_eq!(safety.len(), 4);
        assert_eq!(safety[0]["threshold"], json!("BLOCK_MEDIUM_AND_ABOVE"));
    }

    #[test]
    fn summary_never_contains_image_data() {
        let client = client(&[]);
        let payload = client.build_payload("p", &image());
        let summary = summarize_gemini_payload(&payload).to_string();
        assert!(!summary.contains("AQID"));
        assert!(summary.contains("\"dataLen\":4"));
    }

    #[test]
    fn extracts_and_joins_text_parts() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(extract_text_from_response(response).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn split_reply_keeps_every_part_and_stays_valid_json() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [
                {
                    "content": { "parts": [
                        { "text": "{\"feedback\": \"Strong swo" },
                        { "text": " " },
                        { "inlineData": { "mimeType": "image/png", "data": "AQID" } },
                        { "text": "osh placement.\"}" }
                    ] }
                },
                { "content": { "parts": [{ "text": "second candidate" }] } }
            ]
        }))
        .unwrap();
        let text = extract_text_from_response(response).unwrap();
        assert_eq!(text, "{\"feedback\": \"Strong swo osh placement.\"}");
        let value = crate::critique::normalize::parse_reply(&text).unwrap();
        assert_eq!(value["feedback"], json!("Strong swo osh placement."));
    }

    #[test]
    fn reports_blocked_and_empty_replies() {
        let blocked: GeminiResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        let err = extract_text_from_response(blocked).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));

        let empty: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{ "finishReason": "MAX_TOKENS" }]
        }))
        .unwrap();
        let err = extract_text_from_response(empty).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn error_body_prefers_api_message() {
        let (message, _) =
            summarize_error_body(r#"{"error": {"code": 400, "message": "API key not valid"}}"#);
        assert_eq!(message.as_deref(), Some("API key not valid"));
        let (message, summary) = summarize_error_body("  ");
        assert!(message.is_none());
        assert_eq!(summary, "empty response body");
    }

    #[test]
    fn redacts_api_key() {
        let client = client(&[]);
        assert_eq!(
            client.redact_api_key("bad url ?key=test-key"),
            "bad url ?key=[redacted]"
        );
    }
}
