//! Gemini generateContent client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::relay::engine::ModelClient;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    api_key: String,
    model: String,
    system_instruction: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    /// The system instruction is fixed at construction and sent with every
    /// request; per-message prompts only carry the persona and the text.
    pub fn new(api_key: String, model: String, system_instruction: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        let system_instruction =
            if system_instruction.is_empty() { None } else { Some(system_instruction) };

        Self { api_key, model, system_instruction, client }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent?key={}", GEMINI_API_BASE, self.model, self.api_key)
    }

    fn build_request(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content { parts: vec![Part { text: prompt.to_string() }] }],
            system_instruction: self
                .system_instruction
                .as_ref()
                .map(|s| Content { parts: vec![Part { text: s.clone() }] }),
        }
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, String> {
        let request = self.build_request(prompt);

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("HTTP error: {e}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {e}"))?;

        debug!("Gemini response status: {status}");

        if !status.is_success() {
            return Err(format!("API error {status}: {body}"));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| format!("Failed to parse response: {e}"))?;

        if let Some(error) = parsed.error {
            return Err(format!("Gemini error: {}", error.message));
        }

        let candidates = parsed.candidates.ok_or("No candidates in response")?;
        let candidate = candidates.first().ok_or("Empty candidates array")?;
        let content = candidate.content.as_ref().ok_or("No content in candidate")?;

        let text: String = content
            .parts
            .iter()
            .flatten()
            .filter_map(|p| p.text.as_deref())
            .collect();

        if text.is_empty() {
            return Err("No text in response".to_string());
        }

        Ok(text)
    }
}
