use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{VideoProvider, check_status, http_error};
use crate::{
    config::ProviderConfig,
    error::{MediaError, MediaResult},
};

const SERVICE: &str = "replicate";
const VIDEO_EXTENSIONS: [&str; 3] = [".mp4", ".webm", ".gif"];

/// Text-to-video predictions on Replicate.
#[derive(Clone, Debug)]
pub struct ReplicateClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
    model: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Value,
    #[serde(default)]
    urls: PredictionUrls,
}

#[derive(Debug, Default, Deserialize)]
struct PredictionUrls {
    #[serde(default)]
    get: Option<String>,
}

impl Prediction {
    fn is_pending(&self) -> bool {
        matches!(self.status.as_str(), "starting" | "processing")
    }
}

/// Choose the first output URL that looks like a video, else the first string output.
pub fn pick_video_url(output: &Value) -> Option<String> {
    let urls: Vec<&str> = match output {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    urls.iter()
        .find(|u| VIDEO_EXTENSIONS.iter().any(|ext| u.ends_with(ext)))
        .or_else(|| urls.first())
        .filter(|u| !u.is_empty())
        .map(|u| u.to_string())
}

impl ReplicateClient {
    pub fn new(http: reqwest::Client, token: &str, cfg: &ProviderConfig) -> Self {
        Self {
            http,
            token: token.to_string(),
            base_url: cfg.replicate_base_url.trim_end_matches('/').to_string(),
            model: cfg.replicate_model.clone(),
            poll_interval: cfg.poll_interval,
            poll_timeout: cfg.poll_timeout,
        }
    }

    async fn read(&self, resp: reqwest::Response) -> MediaResult<Prediction> {
        let resp = check_status(SERVICE, resp).await?;
        resp.json::<Prediction>().await.map_err(|e| {
            MediaError::provider(format!("{SERVICE} prediction was not understood: {e}"))
        })
    }

    async fn create(&self, prompt: &str) -> MediaResult<Prediction> {
        let resp = self
            .http
            .post(format!("{}/models/{}/predictions", self.base_url, self.model))
            .bearer_auth(&self.token)
            .header("Prefer", "wait")
            .json(&json!({
                "input": {
                    "prompt": prompt,
                    "guidance_scale": 7.5,
                    "num_frames": 48,
                    "fps": 16,
                    "width": 720,
                    "height": 480,
                }
            }))
            .send()
            .await
            .map_err(|e| http_error(SERVICE, e))?;
        self.read(resp).await
    }

    async fn poll(&self, mut prediction: Prediction) -> MediaResult<Prediction> {
        let deadline = tokio::time::Instant::now() + self.poll_timeout;
        while prediction.is_pending() {
            let Some(url) = prediction.urls.get.clone() else {
                return Err(MediaError::provider(
                    "replicate prediction is pending but has no status url",
                ));
            };
            if tokio::time::Instant::now() + self.poll_interval > deadline {
                return Err(MediaError::provider(format!(
                    "replicate prediction did not finish within {}s",
                    self.poll_timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
            tracing::debug!(status = %prediction.status, "polling replicate prediction");

            let resp = self
                .http
                .get(url)
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|e| http_error(SERVICE, e))?;
            prediction = self.read(resp).await?;
        }
        Ok(prediction)
    }
}

#[async_trait]
impl VideoProvider for ReplicateClient {
    #[tracing::instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> MediaResult<Option<String>> {
        let prediction = self.create(prompt).await?;
        let prediction = self.poll(prediction).await?;

        match prediction.status.as_str() {
            "failed" | "canceled" => {
                let reason = match &prediction.error {
                    Value::String(s) => s.clone(),
                    Value::Null => prediction.status.clone(),
                    other => other.to_string(),
                };
                Err(MediaError::provider(format!(
                    "replicate prediction {}: {reason}",
                    prediction.status
                )))
            }
            _ => Ok(pick_video_url(&prediction.output)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_video_extensions() {
        let out = json!(["https://x/a.png", "https://x/b.webm", "https://x/c.mp4"]);
        assert_eq!(pick_video_url(&out).as_deref(), Some("https://x/b.webm"));
    }

    #[test]
    fn falls_back_to_first_output() {
        let out = json!(["https://x/a.png", "https://x/b.png"]);
        assert_eq!(pick_video_url(&out).as_deref(), Some("https://x/a.png"));
        assert_eq!(
            pick_video_url(&json!("https://x/only.gif")).as_deref(),
            Some("https://x/only.gif")
        );
    }

    #[test]
    fn empty_output_is_none() {
        assert_eq!(pick_video_url(&Value::Null), None);
        assert_eq!(pick_video_url(&json!([])), None);
        assert_eq!(pick_video_url(&json!([""])), None);
    }
}
