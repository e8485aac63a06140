//! Third-party collaborators: prompt improvement, image generation and video generation.
//!
//! Each collaborator has a remote implementation and, where the application can do without the
//! remote service, a local one. [`Providers::from_config`] picks between them based on which
//! credentials are present.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::ProviderConfig,
    error::{MediaError, MediaResult},
};

pub mod openai;
pub mod placeholder;
pub mod replicate;

pub use openai::OpenAiClient;
pub use placeholder::{HeuristicImprover, PlaceholderImages, heuristic_improve};
pub use replicate::ReplicateClient;

#[async_trait]
pub trait PromptImprover: Send + Sync {
    async fn improve(&self, prompt: &str) -> MediaResult<String>;
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Returns a data URI or a remote URL.
    async fn generate(&self, prompt: &str) -> MediaResult<String>;
}

#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// `Ok(None)` means the provider produced nothing usable.
    async fn generate(&self, prompt: &str) -> MediaResult<Option<String>>;
}

/// The collaborator set handed to the orchestrator.
#[derive(Clone)]
pub struct Providers {
    pub improver: Arc<dyn PromptImprover>,
    pub images: Arc<dyn ImageProvider>,
    pub videos: Option<Arc<dyn VideoProvider>>,
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("videos", &self.videos.is_some())
            .finish_non_exhaustive()
    }
}

impl Providers {
    /// Remote providers for every configured credential, local stand-ins otherwise.
    /// There is no local video provider; the orchestrator synthesizes the fallback clip itself.
    pub fn from_config(cfg: &ProviderConfig) -> MediaResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("agentic-media/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MediaError::capability(format!("failed to build http client: {e}")))?;

        let (improver, images): (Arc<dyn PromptImprover>, Arc<dyn ImageProvider>) =
            match cfg.openai_api_key.as_deref() {
                Some(key) => {
                    let openai =
                        Arc::new(OpenAiClient::new(http.clone(), key, &cfg.openai_base_url));
                    (
                        openai.clone() as Arc<dyn PromptImprover>,
                        openai as Arc<dyn ImageProvider>,
                    )
                }
                None => {
                    tracing::info!(
                        "OPENAI_API_KEY not set; using local prompt and image stand-ins"
                    );
                    (
                        Arc::new(HeuristicImprover) as Arc<dyn PromptImprover>,
                        Arc::new(PlaceholderImages) as Arc<dyn ImageProvider>,
                    )
                }
            };

        let videos = cfg.replicate_api_token.as_deref().map(|token| {
            Arc::new(ReplicateClient::new(http.clone(), token, cfg)) as Arc<dyn VideoProvider>
        });
        if videos.is_none() {
            tracing::info!("REPLICATE_API_TOKEN not set; videos will use the local fallback clip");
        }

        Ok(Self {
            improver,
            images,
            videos,
        })
    }
}

/// Turn a non-success response into a provider error carrying the response body.
pub(crate) async fn check_status(
    service: &str,
    resp: reqwest::Response,
) -> MediaResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(MediaError::provider(format!("{service} returned {status}: {}", body.trim())))
}

pub(crate) fn http_error(service: &str, e: reqwest::Error) -> MediaError {
    MediaError::provider(format!("{service} request failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_select_local_providers() {
        let p = Providers::from_config(&ProviderConfig::default()).unwrap();
        assert!(p.videos.is_none());
    }

    #[test]
    fn replicate_token_enables_video_provider() {
        let cfg = ProviderConfig {
            replicate_api_token: Some("r8_test".into()),
            ..ProviderConfig::default()
        };
        let p = Providers::from_config(&cfg).unwrap();
        assert!(p.videos.is_some());
    }
}
