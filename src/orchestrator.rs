use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{MediaError, MediaResult},
    providers::Providers,
    recorder::FfmpegRecorder,
    store::{ClipStore, StoredClip, media_url},
    synth::ClipSynthesizer,
    text::FontTextPainter,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

/// Where a media reference came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Provider,
    Fallback,
}

/// Reference to generated media: a data URI, a remote URL, or a `/media/{id}` path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub mime_type: String,
    pub origin: Origin,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub improved: Option<String>,
    #[serde(default)]
    pub kind: MediaKind,
}

impl GenerateRequest {
    /// The improved prompt when one was supplied, the idea itself otherwise.
    pub fn active_prompt(&self) -> &str {
        match self.improved.as_deref() {
            Some(improved) if !improved.trim().is_empty() => improved,
            _ => &self.prompt,
        }
    }
}

/// Best-effort media type of a data URI or URL.
pub fn mime_type_of(url: &str, default: &str) -> String {
    if let Some(rest) = url.strip_prefix("data:") {
        if let Some(mime) = rest.split([';', ',']).next().filter(|m| !m.is_empty()) {
            return mime.to_string();
        }
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("gif") => "image/gif",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => default,
    }
    .to_string()
}

fn require_prompt(prompt: &str) -> MediaResult<()> {
    if prompt.is_empty() {
        return Err(MediaError::validation("Missing prompt"));
    }
    Ok(())
}

/// Routes each request to a provider or to the local fallback clip.
pub struct Orchestrator {
    providers: Providers,
    synthesizer: ClipSynthesizer,
    clips: Arc<ClipStore>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.providers)
            .field("synthesizer", &self.synthesizer)
            .field("clips", &self.clips.len())
            .finish()
    }
}

impl Orchestrator {
    pub fn new(providers: Providers, synthesizer: ClipSynthesizer) -> Self {
        Self {
            providers,
            synthesizer,
            clips: Arc::new(ClipStore::new()),
        }
    }

    /// Production wiring: HTTP providers per configured credential, font painter, ffmpeg recorder.
    pub fn from_config(cfg: &AppConfig) -> MediaResult<Self> {
        let providers = Providers::from_config(&cfg.providers)?;
        let painters = FontTextPainter::factory(cfg.font.clone(), cfg.clip.font_size_px);
        let recorder = Arc::new(FfmpegRecorder::default());
        let synthesizer = ClipSynthesizer::new(cfg.clip.clone(), painters, recorder)?;
        Ok(Self::new(providers, synthesizer))
    }

    pub fn clips(&self) -> &Arc<ClipStore> {
        &self.clips
    }

    pub async fn improve(&self, prompt: &str) -> MediaResult<String> {
        require_prompt(prompt)?;
        self.providers.improver.improve(prompt).await
    }

    pub async fn generate_image(&self, prompt: &str) -> MediaResult<String> {
        require_prompt(prompt)?;
        self.providers.images.generate(prompt).await
    }

    /// One attempt at the remote video provider. `Ok(None)` when none is configured.
    pub async fn provider_video(&self, prompt: &str) -> MediaResult<Option<String>> {
        require_prompt(prompt)?;
        match &self.providers.videos {
            Some(videos) => videos.generate(prompt).await,
            None => Ok(None),
        }
    }

    /// Provider video if it yields a URL, otherwise the locally synthesized clip.
    #[tracing::instrument(skip_all)]
    pub async fn generate_video(&self, prompt: &str) -> MediaResult<MediaRef> {
        require_prompt(prompt)?;
        match &self.providers.videos {
            Some(videos) => match videos.generate(prompt).await {
                Ok(Some(url)) => {
                    tracing::info!("using provider video");
                    return Ok(MediaRef {
                        mime_type: mime_type_of(&url, "video/mp4"),
                        url,
                        origin: Origin::Provider,
                    });
                }
                Ok(None) => tracing::warn!("video provider gave no url; synthesizing fallback"),
                Err(e) => {
                    tracing::warn!(error = %e, "video provider failed; synthesizing fallback")
                }
            },
            None => tracing::info!("no video provider configured; synthesizing fallback"),
        }
        self.synthesize_fallback(prompt).await
    }

    /// Render, record and store the fallback clip for `prompt`.
    pub async fn synthesize_fallback(&self, prompt: &str) -> MediaResult<MediaRef> {
        let clip = self.synthesizer.synthesize(prompt).await?;
        let mime_type = clip.mime_type.clone();
        let id = self.clips.insert(StoredClip {
            data: clip.data,
            mime_type: clip.mime_type,
        });
        tracing::info!(%id, "stored fallback clip");
        Ok(MediaRef {
            url: media_url(&id),
            mime_type,
            origin: Origin::Fallback,
        })
    }

    pub async fn generate(&self, req: &GenerateRequest) -> MediaResult<MediaRef> {
        let prompt = req.active_prompt();
        require_prompt(prompt)?;
        match req.kind {
            MediaKind::Image => {
                let url = self.generate_image(prompt).await?;
                Ok(MediaRef {
                    mime_type: mime_type_of(&url, "image/png"),
                    url,
                    origin: Origin::Provider,
                })
            }
            MediaKind::Video => self.generate_video(prompt).await,
        }
    }

    pub fn clip(&self, id: &Uuid) -> MediaResult<StoredClip> {
        self.clips
            .get(id)
            .ok_or_else(|| MediaError::not_found(format!("no media with id {id}")))
    }

    pub fn release(&self, id: &Uuid) -> MediaResult<()> {
        if self.clips.release(id) {
            tracing::debug!(%id, "released clip");
            Ok(())
        } else {
            Err(MediaError::not_found(format!("no media with id {id}")))
        }
    }
}
