use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{ImageProvider, PromptImprover, check_status, heuristic_improve, http_error};
use crate::error::{MediaError, MediaResult};

const SERVICE: &str = "openai";

pub const CHAT_MODEL: &str = "gpt-4o-mini";
pub const IMAGE_MODEL: &str = "gpt-image-1";

const IMPROVE_SYSTEM_PROMPT: &str = "You are an expert creative prompt engineer for image and video generation. \
Rewrite the user's idea into a single, concise, production-ready prompt that maximizes visual specificity: \
subjects, style, composition, camera, lighting, mood, colors, resolution, aspect ratio, and temporal motion cues (if video). \
Avoid verbosity, no preambles, just the improved prompt.";

/// Chat completions and image generation against an OpenAI-compatible API.
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, api_key: &str, base_url: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> MediaResult<T> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| http_error(SERVICE, e))?;
        let resp = check_status(SERVICE, resp).await?;
        let unreadable = |e: reqwest::Error| {
            MediaError::provider(format!("{SERVICE} response was not understood: {e}"))
        };
        resp.json::<T>().await.map_err(unreadable)
    }
}

#[async_trait]
impl PromptImprover for OpenAiClient {
    #[tracing::instrument(skip_all)]
    async fn improve(&self, prompt: &str) -> MediaResult<String> {
        let resp: ChatResponse = self
            .post(
                "/chat/completions",
                json!({
                    "model": CHAT_MODEL,
                    "temperature": 0.7,
                    "messages": [
                        { "role": "system", "content": IMPROVE_SYSTEM_PROMPT },
                        { "role": "user", "content": prompt },
                    ],
                }),
            )
            .await?;

        let reply = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if reply.is_empty() {
            tracing::debug!("empty completion; using heuristic rewrite");
            return Ok(heuristic_improve(prompt));
        }
        Ok(reply)
    }
}

#[async_trait]
impl ImageProvider for OpenAiClient {
    #[tracing::instrument(skip_all)]
    async fn generate(&self, prompt: &str) -> MediaResult<String> {
        let resp: ImagesResponse = self
            .post(
                "/images/generations",
                json!({
                    "model": IMAGE_MODEL,
                    "prompt": prompt,
                    "size": "1024x1024",
                    "quality": "high",
                }),
            )
            .await?;

        let b64 = resp
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| MediaError::provider("No image from model"))?;
        Ok(format!("data:image/png;base64,{b64}"))
    }
}
