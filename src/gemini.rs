use log::error;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::AppError;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Fixed assistant text shown when the model returns no usable candidate.
pub const BLOCKED_PLACEHOLDER: &str = "The response was blocked by the safety policy.";

/// Client for the generative-language REST API. One blocking call per turn,
/// no retry, no timeout beyond what the transport imposes.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
        }
    }

    /// Sends one turn with the persona as a standing instruction and returns
    /// the structured outcome. A safety block is a normal outcome here, not
    /// an error; only transport/API failures surface as `AppError`.
    pub async fn generate(&self, persona: &str, user_text: &str) -> Result<ChatOutcome, AppError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part { text: user_text.to_string() }],
            }],
            system_instruction: Some(Content {
                role: "system".to_string(),
                parts: vec![Part { text: persona.to_string() }],
            }),
        };

        let url = format!(
            "{}/{model}:generateContent?key={api_key}",
            BASE_URL,
            model = self.model,
            api_key = self.api_key
        );

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("model request failed: {}", e);
                AppError::fail("language model request failed")
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("model request rejected: {} {}", status, body);
            let msg = parse_api_error(&body)
                .unwrap_or_else(|| format!("language model returned {}", status));
            return Err(AppError::fail(msg));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            error!("model response unreadable: {}", e);
            AppError::fail("language model response unreadable")
        })?;

        Ok(ChatOutcome::from_response(parsed))
    }
}

/// Structured result of one model turn (no serialized-blob plumbing in code;
/// the blob only exists in the persisted `raw_json` column).
#[derive(Debug)]
pub enum ChatOutcome {
    Reply {
        text: String,
        diagnostics: TurnDiagnostics,
    },
    Blocked {
        feedback: Option<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct TurnDiagnostics {
    pub prompt_token_count: i64,
    pub candidates_token_count: i64,
    pub total_token_count: i64,
    pub finish_reason: String,
    pub safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Serialize)]
pub struct SafetyRating {
    pub category: String,
    pub probability: String,
}

impl ChatOutcome {
    pub fn from_response(response: GenerateContentResponse) -> Self {
        let usage = response.usage_metadata.unwrap_or_default();
        let candidate = response
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next();

        let text = candidate.as_ref().and_then(|c| c.text());
        match (candidate, text) {
            (Some(candidate), Some(text)) if !text.trim().is_empty() => ChatOutcome::Reply {
                text,
                diagnostics: TurnDiagnostics {
                    prompt_token_count: usage.prompt_token_count,
                    candidates_token_count: usage.candidates_token_count,
                    total_token_count: usage.total_token_count,
                    finish_reason: candidate
                        .finish_reason
                        .unwrap_or_else(|| "FINISH_REASON_UNSPECIFIED".to_string()),
                    safety_ratings: candidate
                        .safety_ratings
                        .filter(|r| !r.is_empty())
                        .map(|ratings| {
                            ratings
                                .into_iter()
                                .map(|r| SafetyRating {
                                    category: r.category.unwrap_or_else(|| "UNSPECIFIED".to_string()),
                                    probability: r
                                        .probability
                                        .unwrap_or_else(|| "NEGLIGIBLE".to_string()),
                                })
                                .collect()
                        })
                        .unwrap_or_else(|| {
                            vec![SafetyRating {
                                category: "UNSPECIFIED".to_string(),
                                probability: "NEGLIGIBLE".to_string(),
                            }]
                        }),
                },
            },
            _ => ChatOutcome::Blocked {
                feedback: response
                    .prompt_feedback
                    .map(|f| f.to_string())
                    .filter(|f| f != "null"),
            },
        }
    }

    /// Assistant text for this outcome, the placeholder when blocked.
    pub fn assistant_text(&self) -> &str {
        match self {
            ChatOutcome::Reply { text, .. } => text,
            ChatOutcome::Blocked { .. } => BLOCKED_PLACEHOLDER,
        }
    }

    /// Diagnostic payload persisted next to the assistant turn. Keeps the
    /// established log format of the store.
    pub fn raw_json(&self) -> String {
        let value = match self {
            ChatOutcome::Reply { diagnostics, .. } => serde_json::json!({
                "usage_metadata": {
                    "prompt_token_count": diagnostics.prompt_token_count,
                    "candidates_token_count": diagnostics.candidates_token_count,
                    "total_token_count": diagnostics.total_token_count,
                },
                "finish_reason": &diagnostics.finish_reason,
                "safety_ratings": &diagnostics.safety_ratings,
            }),
            ChatOutcome::Blocked { feedback } => serde_json::json!({
                "error": "Blocked by Safety Filter",
                "feedback": feedback.clone().unwrap_or_else(|| "No feedback".to_string()),
            }),
        };
        value.to_string()
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
    pub usage_metadata: Option<UsageMetadata>,
    pub prompt_feedback: Option<serde_json::Value>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: i64,
    #[serde(default)]
    pub candidates_token_count: i64,
    #[serde(default)]
    pub total_token_count: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
    pub safety_ratings: Option<Vec<SafetyRatingDto>>,
}

impl Candidate {
    fn text(&self) -> Option<String> {
        self.content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.text.clone())
    }
}

#[derive(Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

#[derive(Deserialize)]
pub struct SafetyRatingDto {
    pub category: Option<String>,
    pub probability: Option<String>,
}

fn parse_api_error(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(|s| s.to_string())
}
