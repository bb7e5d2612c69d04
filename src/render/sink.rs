// src/render/sink.rs
use crate::domain::errors::{CaptureError, CaptureResult};
use crate::render::image::RenderedImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Encoder settings handed to the sink before the first frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingHints {
    pub fps: u32,
    pub bitrate: u64,
    pub width: u32,
    pub height: u32,
    pub frame_count: usize,
    /// Spacing of emitted frames; `frame_count * frame_interval_ms` is the video length
    pub frame_interval_ms: f64,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedFrame {
    /// Position in the output, from 0
    pub sequence: usize,
    pub frame_index: usize,
    pub timestamp_ms: f64,
    pub image: RenderedImage,
}

/// Consumes an ordered frame sequence and produces an encoded artifact
#[async_trait]
pub trait VideoSink: Send {
    async fn begin(&mut self, hints: &EncodingHints) -> CaptureResult<()>;

    async fn write_frame(&mut self, frame: CapturedFrame) -> CaptureResult<()>;

    async fn finish(&mut self) -> CaptureResult<()>;

    /// Discard a partial capture
    async fn abort(&mut self);
}

/// Keeps every frame in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub hints: Option<EncodingHints>,
    pub frames: Vec<CapturedFrame>,
    pub finished: bool,
    pub aborted: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoSink for MemorySink {
    async fn begin(&mut self, hints: &EncodingHints) -> CaptureResult<()> {
        self.hints = Some(hints.clone());
        self.frames.clear();
        self.finished = false;
        self.aborted = false;
        Ok(())
    }

    async fn write_frame(&mut self, frame: CapturedFrame) -> CaptureResult<()> {
        self.frames.push(frame);
        Ok(())
    }

    async fn finish(&mut self) -> CaptureResult<()> {
        self.finished = true;
        Ok(())
    }

    async fn abort(&mut self) {
        self.frames.clear();
        self.aborted = true;
    }
}

/// Writes the hints and then one JSON frame per line
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_line<T: Serialize + Sync>(&mut self, value: &T) -> CaptureResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CaptureError::Sink("sink was not started".to_string()))?;
        let mut line =
            serde_json::to_vec(value).map_err(|e| CaptureError::Sink(e.to_string()))?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        Ok(())
    }
}

#[async_trait]
impl VideoSink for JsonLinesSink {
    async fn begin(&mut self, hints: &EncodingHints) -> CaptureResult<()> {
        let file = File::create(&self.path).await?;
        self.writer = Some(BufWriter::new(file));
        self.write_line(hints).await
    }

    async fn write_frame(&mut self, frame: CapturedFrame) -> CaptureResult<()> {
        self.write_line(&frame).await
    }

    async fn finish(&mut self) -> CaptureResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
        }
        log::info!("Capture written to {}", self.path.display());
        Ok(())
    }

    async fn abort(&mut self) {
        self.writer = None;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            log::warn!("Failed to remove partial capture {}: {}", self.path.display(), e);
        }
    }
}
