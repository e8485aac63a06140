use std::{sync::Arc, time::Duration};

use bytes::{Bytes, BytesMut};
use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    capture::CaptureStream,
    config::ClipSettings,
    error::{MediaError, MediaResult},
    frame::FrameRenderer,
    recorder::{RecordConfig, Recorder, RecordingSession},
    surface::Surface,
    text::PainterFactory,
};

/// Counters describing one synthesis session. Times are milliseconds since recording started.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SynthStats {
    pub rendered_frames: u64,
    pub captured_frames: u64,
    pub last_tick_ms: f64,
    pub stopped_at_ms: f64,
    pub chunk_count: usize,
}

/// A fully assembled clip.
#[derive(Clone, Debug)]
pub struct Clip {
    pub data: Bytes,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub stats: SynthStats,
}

/// Renders the animated text clip in real time and records it.
pub struct ClipSynthesizer {
    settings: ClipSettings,
    painters: PainterFactory,
    recorder: Arc<dyn Recorder>,
}

impl std::fmt::Debug for ClipSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipSynthesizer")
            .field("settings", &self.settings)
            .field("mime_type", &self.recorder.mime_type())
            .finish()
    }
}

impl ClipSynthesizer {
    pub fn new(
        settings: ClipSettings,
        painters: PainterFactory,
        recorder: Arc<dyn Recorder>,
    ) -> MediaResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            painters,
            recorder,
        })
    }

    /// Render the single frame shown at `elapsed_ms`, without recording.
    pub fn render_still(&self, text: &str, elapsed_ms: f64) -> MediaResult<Surface> {
        let mut canvas = Canvas::open(&self.settings, &self.painters)?;
        canvas.draw(text, elapsed_ms, self.settings.duration_ms as f64)?;
        Ok(canvas.surface)
    }

    /// Record the clip for `text`. Resolves once the recorder has stopped and every chunk has
    /// been assembled.
    ///
    /// A failure after recording started aborts the session and discards partial output.
    #[tracing::instrument(skip_all, fields(chars = text.chars().count()))]
    pub async fn synthesize(&self, text: &str) -> MediaResult<Clip> {
        let settings = self.settings.clone();
        let painters = Arc::clone(&self.painters);
        let setup = move || Canvas::open(&settings, &painters);
        let canvas = blocking("canvas setup", setup).await?;

        let cfg = RecordConfig {
            width: self.settings.width,
            height: self.settings.height,
            fps: self.settings.fps,
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let collector = tokio::spawn(collect_chunks(rx));

        let mut session = self.recorder.start(&cfg, tx).await?;
        let start = Instant::now();

        let mut stats = match self
            .drive(canvas, session.as_mut(), Arc::from(text), start)
            .await
        {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = %e, "clip capture failed; aborting recorder");
                session.abort().await;
                collector.abort();
                return Err(e);
            }
        };

        stats.stopped_at_ms = elapsed_ms(start);
        session.stop().await?;

        let chunks = collector
            .await
            .map_err(|e| MediaError::encode(format!("chunk collector failed: {e}")))?;
        stats.chunk_count = chunks.len();
        let data = assemble(chunks)?;

        tracing::info!(
            bytes = data.len(),
            frames = stats.captured_frames,
            chunks = stats.chunk_count,
            "fallback clip assembled"
        );

        Ok(Clip {
            data,
            mime_type: self.recorder.mime_type().to_string(),
            width: self.settings.width,
            height: self.settings.height,
            stats,
        })
    }

    /// Ticker-driven render loop. Each frame is drawn on the blocking pool so the runtime keeps
    /// serving other tasks while the clip records.
    async fn drive(
        &self,
        mut canvas: Canvas,
        session: &mut dyn RecordingSession,
        text: Arc<str>,
        start: Instant,
    ) -> MediaResult<SynthStats> {
        let duration_ms = self.settings.duration_ms as f64;
        let mut capture = CaptureStream::new(self.settings.fps);
        let mut ticker = tokio::time::interval(self.settings.refresh_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut stats = SynthStats::default();
        loop {
            ticker.tick().await;
            let t = elapsed_ms(start);
            let text = Arc::clone(&text);
            canvas = blocking("frame render", move || {
                canvas.draw(&text, t, duration_ms)?;
                Ok(canvas)
            })
            .await?;
            stats.rendered_frames += 1;
            stats.last_tick_ms = t;
            capture.publish(t, &canvas.surface, session).await?;
            if t >= duration_ms {
                break;
            }
        }

        tokio::time::sleep(Duration::from_millis(self.settings.settle_ms)).await;
        let settled = elapsed_ms(start);
        capture.publish(settled, &canvas.surface, session).await?;
        stats.captured_frames = capture.published();

        tracing::debug!(
            rendered = stats.rendered_frames,
            captured = stats.captured_frames,
            "render loop finished"
        );
        Ok(stats)
    }
}

/// Frame renderer plus the surface it draws on. Both move to the blocking pool for each frame.
struct Canvas {
    renderer: FrameRenderer,
    surface: Surface,
}

impl Canvas {
    fn open(settings: &ClipSettings, painters: &PainterFactory) -> MediaResult<Self> {
        let surface = Surface::new(settings.width, settings.height)?;
        let renderer = FrameRenderer::new(painters()?, settings.width, settings.height)?;
        Ok(Self { renderer, surface })
    }

    fn draw(&mut self, text: &str, elapsed_ms: f64, target_ms: f64) -> MediaResult<()> {
        let surface = &mut self.surface;
        self.renderer.render(surface, elapsed_ms, text, target_ms)?;
        Ok(())
    }
}

/// Run CPU-bound work off the async workers.
async fn blocking<T, F>(what: &str, work: F) -> MediaResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> MediaResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| MediaError::Other(anyhow::anyhow!("{what} task failed: {e}")))?
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

async fn collect_chunks(mut rx: mpsc::UnboundedReceiver<Bytes>) -> Vec<Bytes> {
    let mut chunks = Vec::new();
    while let Some(chunk) = rx.recv().await {
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
    }
    chunks
}

fn assemble(chunks: Vec<Bytes>) -> MediaResult<Bytes> {
    if chunks.is_empty() {
        return Err(MediaError::encode("recorder produced no data"));
    }
    let total = chunks.iter().map(Bytes::len).sum();
    let mut out = BytesMut::with_capacity(total);
    for chunk in &chunks {
        out.extend_from_slice(chunk);
    }
    Ok(out.freeze())
}
