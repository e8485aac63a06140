use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    process::{Child, ChildStdin, Command},
    sync::mpsc,
    task::JoinHandle,
};

use crate::{
    error::{MediaError, MediaResult},
    surface::Surface,
};

/// Channel on which a recording session delivers encoded chunks as they become available.
pub type ChunkSender = mpsc::UnboundedSender<Bytes>;

/// Parameters of one recording session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl RecordConfig {
    pub fn validate(&self) -> MediaResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MediaError::validation("record width/height must be non-zero"));
        }
        if self.fps == 0 {
            return Err(MediaError::validation("record fps must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(MediaError::validation(
                "record width/height must be even (required for yuv420p output)",
            ));
        }
        Ok(())
    }
}

/// Opens recording sessions. Each session consumes frames and emits encoded chunks.
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Media type of the assembled clip, e.g. `video/webm`.
    fn mime_type(&self) -> &str;

    /// Start a session. Chunks are sent on `chunks`; the session drops its sender once the
    /// last chunk has been delivered after [`RecordingSession::stop`].
    async fn start(
        &self,
        cfg: &RecordConfig,
        chunks: ChunkSender,
    ) -> MediaResult<Box<dyn RecordingSession>>;
}

#[async_trait]
pub trait RecordingSession: Send {
    async fn write_frame(&mut self, frame: &Surface) -> MediaResult<()>;

    /// Flush and finish; returns after every chunk has been sent.
    async fn stop(self: Box<Self>) -> MediaResult<()>;

    /// Tear the session down without finishing the stream.
    async fn abort(self: Box<Self>);
}

pub async fn is_ffmpeg_on_path(ffmpeg: &Path) -> bool {
    Command::new(ffmpeg)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok_and(|s| s.success())
}

pub async fn ffmpeg_has_encoder(ffmpeg: &Path, encoder: &str) -> bool {
    let Ok(out) = Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .stderr(Stdio::null())
        .output()
        .await
    else {
        return false;
    };
    out.status.success()
        && String::from_utf8_lossy(&out.stdout)
            .split_whitespace()
            .any(|w| w == encoder)
}

/// Records WebM/VP9 by piping raw RGBA frames through the system `ffmpeg` binary.
#[derive(Clone, Debug)]
pub struct FfmpegRecorder {
    ffmpeg: PathBuf,
    bitrate: String,
}

impl Default for FfmpegRecorder {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            bitrate: "1M".to_string(),
        }
    }
}

impl FfmpegRecorder {
    pub const CODEC: &'static str = "libvpx-vp9";

    pub fn with_binary(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self
    }

    pub async fn is_available(&self) -> bool {
        let ffmpeg = self.ffmpeg.as_path();
        is_ffmpeg_on_path(ffmpeg).await && ffmpeg_has_encoder(ffmpeg, Self::CODEC).await
    }
}

#[async_trait]
impl Recorder for FfmpegRecorder {
    fn mime_type(&self) -> &str {
        "video/webm"
    }

    async fn start(
        &self,
        cfg: &RecordConfig,
        chunks: ChunkSender,
    ) -> MediaResult<Box<dyn RecordingSession>> {
        cfg.validate()?;

        if !is_ffmpeg_on_path(&self.ffmpeg).await {
            return Err(MediaError::capability(
                "ffmpeg is required for clip recording, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd.args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            Self::CODEC,
            "-deadline",
            "realtime",
            "-cpu-used",
            "8",
            "-b:v",
            &self.bitrate,
            "-pix_fmt",
            "yuv420p",
            "-f",
            "webm",
            "pipe:1",
        ]);

        let mut child = cmd.spawn().map_err(|e| {
            MediaError::capability(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::encode("failed to open ffmpeg stdin"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::encode("failed to open ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::encode("failed to open ffmpeg stderr"))?;

        let reader = tokio::spawn(async move {
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let n = stdout.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                if chunks.send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                    break;
                }
            }
            Ok::<(), std::io::Error>(())
        });
        let stderr_task = tokio::spawn(async move {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text).await;
            text
        });

        tracing::debug!(
            width = cfg.width,
            height = cfg.height,
            fps = cfg.fps,
            "ffmpeg recorder started"
        );

        Ok(Box::new(FfmpegSession {
            child,
            stdin: Some(stdin),
            reader,
            stderr_task,
            frame_len: cfg.width as usize * cfg.height as usize * 4,
            scratch: vec![0u8; cfg.width as usize * cfg.height as usize * 4],
        }))
    }
}

struct FfmpegSession {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: JoinHandle<std::io::Result<()>>,
    stderr_task: JoinHandle<String>,
    frame_len: usize,
    scratch: Vec<u8>,
}

#[async_trait]
impl RecordingSession for FfmpegSession {
    async fn write_frame(&mut self, frame: &Surface) -> MediaResult<()> {
        if frame.data().len() != self.frame_len {
            return Err(MediaError::validation(format!(
                "frame size mismatch: got {}x{}",
                frame.width(),
                frame.height()
            )));
        }

        crate::composite::flatten_to_opaque_rgba8(&mut self.scratch, frame.data(), [0, 0, 0])?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(MediaError::encode("ffmpeg recorder is already finalized"));
        };
        stdin.write_all(&self.scratch).await.map_err(|e| {
            MediaError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    async fn stop(mut self: Box<Self>) -> MediaResult<()> {
        drop(self.stdin.take());

        let status = self
            .child
            .wait()
            .await
            .map_err(|e| MediaError::encode(format!("failed to wait for ffmpeg: {e}")))?;

        let read = (&mut self.reader)
            .await
            .map_err(|e| MediaError::encode(format!("ffmpeg output reader panicked: {e}")))?;
        let stderr = (&mut self.stderr_task).await.unwrap_or_default();

        if !status.success() {
            return Err(MediaError::encode(format!(
                "ffmpeg exited with status {status}: {}",
                stderr.trim()
            )));
        }
        read.map_err(|e| MediaError::encode(format!("failed to read ffmpeg output: {e}")))?;
        Ok(())
    }

    async fn abort(mut self: Box<Self>) {
        drop(self.stdin.take());
        if let Err(e) = self.child.kill().await {
            tracing::warn!(error = %e, "failed to kill ffmpeg recorder");
        }
        self.reader.abort();
        self.stderr_task.abort();
    }
}
