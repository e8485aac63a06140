#![forbid(unsafe_code)]

//! Prompt-to-media generation with a locally synthesized fallback clip.
//!
//! Requests go through the [`Orchestrator`], which asks the configured providers for an image or
//! a video. When no video provider is configured, or it fails or returns nothing, a short clip of
//! the prompt typing itself out over a hue-cycling backdrop is rendered in real time, recorded as
//! WebM/VP9 and stored in memory under a `/media/{id}` reference.

pub mod blur;
pub mod capture;
pub mod color;
pub mod composite;
pub mod config;
pub mod error;
pub mod frame;
pub mod layout;
pub mod orchestrator;
pub mod providers;
pub mod recorder;
pub mod server;
pub mod store;
pub mod surface;
pub mod synth;
pub mod text;
pub mod timeline;

pub use capture::CaptureStream;
pub use color::Color;
pub use config::{AppConfig, ClipSettings, ProviderConfig};
pub use error::{MediaError, MediaResult};
pub use frame::{FrameInfo, FrameRenderer};
pub use orchestrator::{GenerateRequest, MediaKind, MediaRef, Orchestrator, Origin};
pub use providers::{ImageProvider, PromptImprover, Providers, VideoProvider};
pub use recorder::{ChunkSender, FfmpegRecorder, RecordConfig, Recorder, RecordingSession};
pub use store::{ClipStore, StoredClip};
pub use surface::Surface;
pub use synth::{Clip, ClipSynthesizer, SynthStats};
pub use text::{FontSource, FontTextPainter, PainterFactory, PlacedLine, TextPainter};
