use std::{net::SocketAddr, time::Duration};

use crate::{
    error::{MediaError, MediaResult},
    text::FontSource,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REPLICATE_BASE_URL: &str = "https://api.replicate.com/v1";
pub const DEFAULT_REPLICATE_MODEL: &str = "pika-labs/pika-1.4";

/// Geometry and timing of the procedurally rendered fallback clip.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipSettings {
    pub width: u32,
    pub height: u32,
    pub duration_ms: u64,
    /// Capture rate of the recorded stream.
    pub fps: u32,
    /// Rate of the render loop ticker.
    pub refresh_hz: u32,
    /// Pause between the last render and stopping the recorder.
    pub settle_ms: u64,
    pub font_size_px: f32,
}

impl Default for ClipSettings {
    fn default() -> Self {
        Self {
            width: 720,
            height: 480,
            duration_ms: 3000,
            fps: 30,
            refresh_hz: 60,
            settle_ms: 150,
            font_size_px: 28.0,
        }
    }
}

impl ClipSettings {
    pub fn validate(&self) -> MediaResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MediaError::capability("cannot render a clip with zero width or height"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(MediaError::validation(
                "clip width/height must be even (required for yuv420p output)",
            ));
        }
        if self.width > u32::from(u16::MAX) || self.height > u32::from(u16::MAX) {
            return Err(MediaError::capability(format!(
                "clip size {}x{} exceeds the rasterizer limit of {}",
                self.width,
                self.height,
                u16::MAX
            )));
        }
        if self.fps == 0 || self.refresh_hz == 0 {
            return Err(MediaError::validation("clip fps/refresh_hz must be non-zero"));
        }
        if self.duration_ms == 0 {
            return Err(MediaError::validation("clip duration_ms must be non-zero"));
        }
        if !self.font_size_px.is_finite() || self.font_size_px <= 0.0 {
            return Err(MediaError::validation("clip font_size_px must be > 0"));
        }
        Ok(())
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.refresh_hz.max(1)))
    }
}

/// Credentials and endpoints of the third-party collaborators. A missing key selects the
/// local placeholder implementation for that collaborator.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub replicate_api_token: Option<String>,
    pub replicate_base_url: String,
    pub replicate_model: String,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            replicate_api_token: None,
            replicate_base_url: DEFAULT_REPLICATE_BASE_URL.to_string(),
            replicate_model: DEFAULT_REPLICATE_MODEL.to_string(),
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub providers: ProviderConfig,
    pub clip: ClipSettings,
    pub font: FontSource,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            providers: ProviderConfig::default(),
            clip: ClipSettings::default(),
            font: FontSource::System,
        }
    }
}

/// Treat blank strings (e.g. `OPENAI_API_KEY=`) as unset.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ClipSettings::default().validate().unwrap();
        let d = ClipSettings::default();
        assert_eq!((d.width, d.height), (720, 480));
        assert_eq!((d.duration_ms, d.fps), (3000, 30));
        assert_eq!(d.settle_ms, 150);
    }

    #[test]
    fn validation_catches_bad_values() {
        let odd = ClipSettings {
            width: 721,
            ..ClipSettings::default()
        };
        assert!(odd.validate().is_err());

        let no_fps = ClipSettings {
            fps: 0,
            ..ClipSettings::default()
        };
        assert!(no_fps.validate().is_err());

        let no_duration = ClipSettings {
            duration_ms: 0,
            ..ClipSettings::default()
        };
        assert!(no_duration.validate().is_err());
    }

    #[test]
    fn blank_keys_are_unset() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some("k".into())), Some("k".into()));
        assert_eq!(non_blank(None), None);
    }
}
