#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use agentic_media::{
    ClipSettings, ClipSynthesizer, Color, MediaError, MediaResult, PainterFactory, PlacedLine,
    RecordConfig, Recorder, RecordingSession, Surface, TextPainter,
    recorder::ChunkSender,
};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;

/// Everything the test doubles observed, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Started,
    Painted,
    Frame,
    Stopped,
    Aborted,
}

#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<(Event, Instant)>>>);

impl EventLog {
    pub fn push(&self, e: Event) {
        self.0.lock().unwrap().push((e, Instant::now()));
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
    }

    pub fn timed(&self) -> Vec<(Event, Instant)> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, e: &Event) -> usize {
        self.0.lock().unwrap().iter().filter(|(x, _)| x == e).count()
    }
}

/// Fixed-advance painter drawing each line as a solid 20px-tall block above its baseline.
pub struct BlockPainter {
    pub log: Option<EventLog>,
}

impl TextPainter for BlockPainter {
    fn measure(&mut self, text: &str) -> f32 {
        text.chars().count() as f32 * 14.0
    }

    fn paint_lines(
        &mut self,
        layer: &mut Surface,
        lines: &[PlacedLine],
        color: Color,
    ) -> MediaResult<()> {
        if let Some(log) = &self.log {
            log.push(Event::Painted);
        }
        let px = color.to_premul_rgba8();
        let (w, h) = (layer.width(), layer.height());
        for line in lines {
            let x0 = line.x.max(0.0) as u32;
            let x1 = ((line.x + self.measure(&line.text)).max(0.0) as u32).min(w);
            let y0 = (line.baseline - 20.0).max(0.0) as u32;
            let y1 = (line.baseline.max(0.0) as u32).min(h);
            for y in y0..y1 {
                for x in x0..x1 {
                    let idx = ((y * w + x) * 4) as usize;
                    layer.data_mut()[idx..idx + 4].copy_from_slice(&px);
                }
            }
        }
        Ok(())
    }
}

pub fn block_painters(log: Option<EventLog>) -> PainterFactory {
    Arc::new(move || Ok(Box::new(BlockPainter { log: log.clone() }) as Box<dyn TextPainter>))
}

/// Block painter that holds its thread on every paint, as a real font rasterizer does.
pub struct SlowPainter {
    inner: BlockPainter,
    delay: Duration,
}

impl TextPainter for SlowPainter {
    fn measure(&mut self, text: &str) -> f32 {
        self.inner.measure(text)
    }

    fn paint_lines(
        &mut self,
        layer: &mut Surface,
        lines: &[PlacedLine],
        color: Color,
    ) -> MediaResult<()> {
        std::thread::sleep(self.delay);
        self.inner.paint_lines(layer, lines, color)
    }
}

pub fn slow_painters(delay: Duration) -> PainterFactory {
    Arc::new(move || {
        let inner = BlockPainter { log: None };
        Ok(Box::new(SlowPainter { inner, delay }) as Box<dyn TextPainter>)
    })
}

pub fn missing_font_painters() -> PainterFactory {
    Arc::new(|| Err(MediaError::capability("no system fonts available for text rendering")))
}

/// In-memory recorder: a header chunk on start, one chunk per frame, a trailer on stop.
#[derive(Clone, Default)]
pub struct MemoryRecorder {
    pub log: EventLog,
    /// Fail the write of frame number `n` (0-based).
    pub fail_at_frame: Option<u64>,
    pub fail_on_stop: bool,
}

pub const HEADER: &[u8] = b"\x1a\x45\xdf\xa3";
pub const TRAILER: &[u8] = b"END";

struct MemorySession {
    log: EventLog,
    chunks: ChunkSender,
    frames: u64,
    frame_len: usize,
    fail_at_frame: Option<u64>,
    fail_on_stop: bool,
}

#[async_trait]
impl Recorder for MemoryRecorder {
    fn mime_type(&self) -> &str {
        "video/webm"
    }

    async fn start(
        &self,
        cfg: &RecordConfig,
        chunks: ChunkSender,
    ) -> MediaResult<Box<dyn RecordingSession>> {
        cfg.validate()?;
        self.log.push(Event::Started);
        let _ = chunks.send(Bytes::from_static(HEADER));
        Ok(Box::new(MemorySession {
            log: self.log.clone(),
            chunks,
            frames: 0,
            frame_len: cfg.width as usize * cfg.height as usize * 4,
            fail_at_frame: self.fail_at_frame,
            fail_on_stop: self.fail_on_stop,
        }))
    }
}

#[async_trait]
impl RecordingSession for MemorySession {
    async fn write_frame(&mut self, frame: &Surface) -> MediaResult<()> {
        assert_eq!(frame.data().len(), self.frame_len);
        if self.fail_at_frame == Some(self.frames) {
            return Err(MediaError::encode("encoder rejected frame"));
        }
        self.log.push(Event::Frame);
        let _ = self
            .chunks
            .send(Bytes::copy_from_slice(&(self.frames as u32).to_le_bytes()));
        // Empty chunks are legal and must be ignored by the assembler.
        let _ = self.chunks.send(Bytes::new());
        self.frames += 1;
        Ok(())
    }

    async fn stop(self: Box<Self>) -> MediaResult<()> {
        if self.fail_on_stop {
            return Err(MediaError::encode("encoder failed to finalize"));
        }
        let _ = self.chunks.send(Bytes::from_static(TRAILER));
        self.log.push(Event::Stopped);
        Ok(())
    }

    async fn abort(self: Box<Self>) {
        self.log.push(Event::Aborted);
    }
}

pub fn small_settings() -> ClipSettings {
    ClipSettings {
        width: 64,
        height: 48,
        ..ClipSettings::default()
    }
}

pub fn synthesizer(recorder: MemoryRecorder, painter_log: Option<EventLog>) -> ClipSynthesizer {
    ClipSynthesizer::new(
        small_settings(),
        block_painters(painter_log),
        Arc::new(recorder),
    )
    .unwrap()
}
