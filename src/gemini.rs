use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use crate::{Error, Result};

pub const DEFAULT_MODEL: &str = "gemini-flash-latest";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A text-in, text-out generative model.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// The two shapes a generation response can arrive in.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GenerateResponse {
    DirectText { text: String },
    Candidates {
        #[serde(default)]
        candidates: Vec<Candidate>,
    },
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Pull the generated text out of either response shape.
pub fn extract_text(resp: GenerateResponse) -> Result<String> {
    match resp {
        GenerateResponse::DirectText { text } if !text.trim().is_empty() => Ok(text),
        GenerateResponse::DirectText { .. } => Err(Error::ModelUnexpectedResponse("empty text".to_string())),
        GenerateResponse::Candidates { candidates } => {
            let Some(first) = candidates.into_iter().next() else {
                return Err(Error::ModelUnexpectedResponse("no candidates returned".to_string()));
            };
            let text: String = first
                .content
                .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
                .unwrap_or_default();
            if text.trim().is_empty() {
                let reason = first.finish_reason.as_deref().unwrap_or("unknown");
                return Err(Error::ModelUnexpectedResponse(format!(
                    "candidate has no text (finish reason: {reason})"
                )));
            }
            Ok(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    reason: Option<String>,
}

/// Map a non-success API answer onto the error taxonomy.
pub fn classify_failure(status: u16, body: &str) -> Error {
    let parsed = serde_json::from_str::<ApiErrorBody>(body).ok().map(|b| b.error);
    let message = parsed
        .as_ref()
        .map(|e| e.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect());
    let api_status = parsed.as_ref().map(|e| e.status.as_str()).unwrap_or("");
    let key_invalid = parsed
        .as_ref()
        .is_some_and(|e| e.details.iter().any(|d| d.reason.as_deref() == Some("API_KEY_INVALID")));

    if status == 401 || status == 403 || key_invalid || matches!(api_status, "UNAUTHENTICATED" | "PERMISSION_DENIED") {
        return Error::ModelAuth(message);
    }
    if status == 429 || api_status == "RESOURCE_EXHAUSTED" {
        return Error::RateLimited(format!("Gemini API: {message}"));
    }
    Error::ModelCallFailed(format!("HTTP {status}: {message}"))
}

/// Model listing entry
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "supportedGenerationMethods", default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods.iter().any(|m| m == "generateContent")
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

/// Google Gemini REST client
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        GeminiClient {
            client,
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Every model visible to this API key, following pagination.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self
                .client
                .get(format!("{API_BASE}/models"))
                .header("x-goog-api-key", &self.api_key);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token)]);
            }
            let resp = req.send().await.map_err(|e| Error::ModelCallFailed(e.to_string()))?;
            let status = resp.status();
            let body = resp.text().await.map_err(|e| Error::ModelCallFailed(e.to_string()))?;
            if !status.is_success() {
                return Err(classify_failure(status.as_u16(), &body));
            }
            let page: ModelList =
                serde_json::from_str(&body).map_err(|e| Error::ModelUnexpectedResponse(e.to_string()))?;
            models.extend(page.models);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(models)
    }
}

#[async_trait]
impl TextModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{API_BASE}/models/{}:generateContent", self.model);
        debug!("Calling Gemini model {} ({} prompt chars)", self.model, prompt.chars().count());

        let body = serde_json::json!({
            "contents": [
                {
                    "parts": [{ "text": prompt }]
                }
            ]
        });

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ModelCallFailed(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::ModelCallFailed(e.to_string()))?;
        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &text));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| Error::ModelUnexpectedResponse(e.to_string()))?;
        extract_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> GenerateResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_extract_direct_text() {
        let resp = parse(serde_json::json!({ "text": "Here is the summary." }));
        assert_eq!(extract_text(resp).unwrap(), "Here is the summary.");
    }

    #[test]
    fn test_extract_candidates() {
        let resp = parse(serde_json::json!({
            "candidates": [
                {
                    "content": { "role": "model", "parts": [{ "text": "Summary " }, { "text": "of the video." }] },
                    "finishReason": "STOP"
                }
            ],
            "usageMetadata": { "promptTokenCount": 10 }
        }));
        assert!(matches!(resp, GenerateResponse::Candidates { .. }));
        assert_eq!(extract_text(resp).unwrap(), "Summary of the video.");
    }

    #[test]
    fn test_extract_no_candidates() {
        let resp = parse(serde_json::json!({ "candidates": [] }));
        assert!(matches!(extract_text(resp), Err(Error::ModelUnexpectedResponse(_))));

        let resp = parse(serde_json::json!({}));
        assert!(matches!(extract_text(resp), Err(Error::ModelUnexpectedResponse(_))));
    }

    #[test]
    fn test_extract_blocked_candidate() {
        let resp = parse(serde_json::json!({ "candidates": [{ "finishReason": "SAFETY" }] }));
        let err = extract_text(resp).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_classify_invalid_key() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT","details":[{"@type":"type.googleapis.com/google.rpc.ErrorInfo","reason":"API_KEY_INVALID"}]}}"#;
        assert!(matches!(classify_failure(400, body), Error::ModelAuth(m) if m.starts_with("API key not valid")));
    }

    #[test]
    fn test_classify_permission_denied() {
        let body = r#"{"error":{"code":403,"message":"Method doesn't allow unregistered callers.","status":"PERMISSION_DENIED"}}"#;
        assert!(matches!(classify_failure(403, body), Error::ModelAuth(_)));
    }

    #[test]
    fn test_classify_quota() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(classify_failure(429, body).is_rate_limited());
    }

    #[test]
    fn test_classify_other() {
        let err = classify_failure(500, "upstream exploded");
        assert!(matches!(err, Error::ModelCallFailed(m) if m == "HTTP 500: upstream exploded"));
    }

    #[test]
    fn test_model_info_filter() {
        let list: ModelList = serde_json::from_value(serde_json::json!({
            "models": [
                { "name": "models/gemini-flash-latest", "displayName": "Gemini Flash", "supportedGenerationMethods": ["generateContent", "countTokens"] },
                { "name": "models/text-embedding-004", "supportedGenerationMethods": ["embedContent"] }
            ]
        }))
        .unwrap();
        let usable: Vec<_> = list.models.iter().filter(|m| m.supports_generate_content()).collect();
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].display_name, "Gemini Flash");
        assert!(list.next_page_token.is_none());
    }
}
