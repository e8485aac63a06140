use crate::{error::MediaResult, recorder::RecordingSession, surface::Surface};

/// Fixed-rate frame capture over a drawing surface.
///
/// The render loop runs at display refresh, while the recorder expects a constant frame rate.
/// On every publish the stream emits one frame per capture slot that has started since the
/// previous publish, repeating the current surface when the loop fell behind.
#[derive(Debug)]
pub struct CaptureStream {
    fps: u32,
    published: u64,
}

impl CaptureStream {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            published: 0,
        }
    }

    /// Frames that should exist once `elapsed_ms` has passed (slot 0 starts at t = 0).
    pub fn frames_due(&self, elapsed_ms: f64) -> u64 {
        if elapsed_ms < 0.0 {
            return 0;
        }
        (elapsed_ms * f64::from(self.fps) / 1000.0).floor() as u64 + 1
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    /// Push the current surface for every due slot. Returns how many frames were written.
    pub async fn publish(
        &mut self,
        elapsed_ms: f64,
        surface: &Surface,
        session: &mut dyn RecordingSession,
    ) -> MediaResult<u64> {
        let due = self.frames_due(elapsed_ms);
        let mut written = 0;
        while self.published < due {
            session.write_frame(surface).await?;
            self.published += 1;
            written += 1;
        }
        Ok(written)
    }
}
