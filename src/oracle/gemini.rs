//! Gemini-backed oracle.
//!
//! Sends each image inline (base64) to the `generateContent` endpoint
//! together with a prompt asking for the five-field JSON analysis.

use crate::error::OracleError;
use crate::models::{AnalysisResult, ImageInput};
use crate::oracle::parse::parse_analysis;
use crate::oracle::Oracle;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Settings for the Gemini oracle.
#[derive(Debug, Clone)]
pub struct OracleSettings {
    pub api_url: String,
    pub model_name: String,
    /// API key; `None` or blank means the oracle is not configured.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com".to_string(),
            model_name: "gemini-2.0-flash-exp".to_string(),
            api_key: None,
            temperature: 0.4,
            timeout_seconds: 120,
        }
    }
}

/// `generateContent` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

/// `generateContent` response body.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Oracle backed by Google's Gemini API.
pub struct GeminiOracle {
    settings: OracleSettings,
    http_client: reqwest::Client,
}

impl GeminiOracle {
    /// Build the oracle. A missing API key is not an error here; it is
    /// reported by [`Oracle::check_ready`] before a batch is dispatched.
    pub fn new(settings: OracleSettings) -> Result<Self, OracleError> {
        info!(
            "Initializing Gemini oracle with model {} at {}",
            settings.model_name, settings.api_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| {
                OracleError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    fn api_key(&self) -> Result<&str, OracleError> {
        match self.settings.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(OracleError::Configuration(
                "Gemini API key not configured (set GEMINI_API_KEY)".to_string(),
            )),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.model_name
        )
    }

    fn build_request(&self, image: &ImageInput) -> GenerateRequest {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&image.bytes);

        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        text: Some(ANALYSIS_PROMPT.to_string()),
                        inline_data: None,
                    },
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: image.format.mime_type().to_string(),
                            data: encoded,
                        }),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
            },
        }
    }

    /// Send one image and return the raw response text.
    async fn send_image(&self, image: &ImageInput) -> Result<String, OracleError> {
        let api_key = self.api_key()?;
        let request = self.build_request(image);

        debug!(
            "Sending {} ({} bytes, {}) to {}",
            image.name,
            image.bytes.len(),
            image.format,
            self.settings.model_name
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Transport(format!(
                        "request timed out after {}s",
                        self.settings.timeout_seconds
                    ))
                } else if e.is_connect() {
                    OracleError::Transport(format!(
                        "cannot connect to Gemini at {}",
                        self.settings.api_url
                    ))
                } else {
                    OracleError::from(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let generated: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| OracleError::Validation {
                reason: format!("unexpected Gemini response envelope: {}", e),
                raw: body.clone(),
            })?;

        generated.text().ok_or_else(|| OracleError::Validation {
            reason: "no text in Gemini response".to_string(),
            raw: body,
        })
    }
}

#[async_trait]
impl Oracle for GeminiOracle {
    fn model(&self) -> &str {
        &self.settings.model_name
    }

    fn check_ready(&self) -> Result<(), OracleError> {
        self.api_key().map(|_| ())
    }

    async fn analyze(&self, image: &ImageInput) -> Result<AnalysisResult, OracleError> {
        let text = self.send_image(image).await?;
        parse_analysis(&text)
    }
}

/// Prompt sent alongside every image.
const ANALYSIS_PROMPT: &str = r#"Analyze this artwork and provide:
1. The artistic style
2. Historical period
3. Key insights about the composition, technique, and meaning
4. Related artists who might have influenced this work
5. Art movements this piece connects to
Format the response as JSON with these fields:
{
  "style": "string",
  "period": "string",
  "insights": ["string"],
  "connections": {
    "artists": ["string"],
    "movements": ["string"]
  }
}
Only output the JSON object, no other text."#;
