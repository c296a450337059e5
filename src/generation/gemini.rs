//! Google Gemini `generateContent` backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Generator;
use crate::config::GenerationConfig;
use crate::retrieval::prompt::GenerationRequest;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    system_instruction: GeminiContent<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

/// Gemini REST client. The API key travels in a header and is never logged.
pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl std::fmt::Debug for GeminiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGenerator")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"***")
            .finish()
    }
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .context("no Gemini API key: set GEMINI_API_KEY or generation.api_key")?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.trim_start_matches("models/").to_string(),
            api_key,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn body<'a>(&self, request: &'a GenerationRequest) -> GeminiRequest<'a> {
        let generation_config = (self.temperature.is_some() || self.max_output_tokens.is_some())
            .then_some(GeminiGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            });
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart {
                    text: &request.user_payload,
                }],
            }],
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: &request.system_instruction,
                }],
            },
            generation_config,
        }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        tracing::debug!(model = %self.model, "sending generateContent request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.body(request))
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        let body = response.text().await.context("failed to read Gemini response")?;

        if !status.is_success() {
            let detail = serde_json::from_str::<GeminiError>(&body)
                .map(|e| format!("{} {}", e.error.status, e.error.message))
                .unwrap_or_default();
            tracing::warn!(status = %status, detail = %detail, "Gemini API error response");
            anyhow::bail!("Gemini returned HTTP {status}: {detail}");
        }

        extract_text(&body)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(body: &str) -> Result<String> {
    let parsed: GeminiResponse =
        serde_json::from_str(body).context("failed to parse Gemini response")?;
    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    let text = text.trim();
    anyhow::ensure!(!text.is_empty(), "Gemini returned no text");
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::mood::MoodLabel;

    fn config() -> GenerationConfig {
        GenerationConfig {
            api_key: Some("secret-key".into()),
            model: "models/gemini-2.0-flash".into(),
            ..GenerationConfig::default()
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            query: "q".into(),
            mood: MoodLabel::neutral(),
            context: "ctx".into(),
            system_instruction: "system".into(),
            user_payload: "payload".into(),
            omitted_facts: 0,
        }
    }

    #[test]
    fn test_requires_api_key() {
        let config = GenerationConfig {
            api_key: None,
            ..GenerationConfig::default()
        };
        assert!(GeminiGenerator::new(&config).is_err());
    }

    #[test]
    fn test_endpoint_strips_models_prefix() {
        let generator = GeminiGenerator::new(&config()).unwrap();
        assert_eq!(
            generator.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_debug_masks_key() {
        let generator = GeminiGenerator::new(&config()).unwrap();
        let debug = format!("{generator:?}");
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn test_body_shape() {
        let generator = GeminiGenerator::new(&config()).unwrap();
        let request = request();
        let json = serde_json::to_value(generator.body(&request)).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "payload");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "system");
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn test_extract_text() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Day 1: "},{"text":"Hanoi\n"}]}}]}"#;
        assert_eq!(extract_text(body).unwrap(), "Day 1: Hanoi");
        assert!(extract_text(r#"{"candidates":[]}"#).is_err());
        assert!(extract_text("<html>").is_err());
    }
}
