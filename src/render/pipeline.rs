// src/render/pipeline.rs
use crate::config::CaptureConfig;
use crate::domain::errors::{CaptureError, CaptureResult, PlaybackError};
use crate::domain::models::{PlaybackMode, SimulationRun};
use crate::playback::clock::{scaled_interval, CaptureStep, CaptureTicket, PlaybackClock};
use crate::render::chart::{compose, RenderStyle};
use crate::render::image::{RenderedImage, Watermark};
use crate::render::sink::{CapturedFrame, EncodingHints, VideoSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior};

/// Holds the pipeline's capture slot; released on drop
struct CaptureGuard(Arc<AtomicBool>);

impl CaptureGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> CaptureResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CaptureError::AlreadyCapturing)?;
        Ok(Self(flag.clone()))
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Active,
    Completed,
    Cancelled,
}

/// Summary of a finished export
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReport {
    pub frame_count: usize,
    pub frame_interval_ms: f64,
    pub duration_ms: f64,
}

/// Renders frames and records runs into a video sink
pub struct RenderCapturePipeline {
    clock: PlaybackClock,
    style: RenderStyle,
    watermark: Option<Watermark>,
    capture: CaptureConfig,
    capturing: Arc<AtomicBool>,
}

impl RenderCapturePipeline {
    pub fn new(clock: PlaybackClock, style: RenderStyle, capture: CaptureConfig) -> Self {
        Self {
            clock,
            style,
            watermark: None,
            capture,
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_watermark(mut self, watermark: Watermark) -> Self {
        self.watermark = Some(watermark);
        self
    }

    /// Install or clear the watermark; rendering never waits for it
    pub fn set_watermark(&mut self, watermark: Option<Watermark>) {
        if watermark.is_none() {
            log::warn!("Watermark unavailable, rendering without it");
        }
        self.watermark = watermark;
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }

    pub fn render_frame(&self, run: &SimulationRun, frame_index: usize) -> RenderedImage {
        compose(run, frame_index, &self.style, self.watermark.as_ref())
    }

    /// Render whatever frame the clock is showing
    pub fn render_current(&self, run: &SimulationRun) -> RenderedImage {
        self.render_frame(run, self.clock.snapshot().frame_index)
    }

    pub fn encoding_hints(&self, run: &SimulationRun, speed: f64) -> CaptureResult<EncodingHints> {
        Ok(EncodingHints {
            fps: self.capture.fps,
            bitrate: self.capture.bitrate,
            width: self.style.width,
            height: self.style.height,
            frame_count: run.frame_count(),
            frame_interval_ms: self.frame_interval_ms(speed)?,
            mime_type: self.capture.mime_type.clone(),
        })
    }

    fn frame_interval_ms(&self, speed: f64) -> CaptureResult<f64> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(CaptureError::Playback(PlaybackError::InvalidSpeed(speed)));
        }
        Ok(self.capture.frame_interval_ms as f64 / speed)
    }

    /// Begin a capture of `run`.
    ///
    /// Frames are rendered lazily as the returned session is iterated. Only one
    /// capture may be active per pipeline; a second request is rejected.
    pub fn capture<'a>(
        &'a self,
        run: &'a SimulationRun,
        speed: f64,
    ) -> CaptureResult<CaptureSession<'a>> {
        let guard = CaptureGuard::acquire(&self.capturing).map_err(|e| {
            log::warn!("Capture request rejected: a capture is already running");
            e
        })?;

        if run.frame_count() == 0 {
            return Err(CaptureError::EmptyRun);
        }
        let frame_interval_ms = self.frame_interval_ms(speed)?;

        let snapshot = self.clock.snapshot();
        if snapshot.last_frame != run.last_frame() && snapshot.mode != PlaybackMode::Capturing {
            log::debug!("Retargeting clock to {} frames", run.frame_count());
            self.clock.load(run.frame_count());
        }
        let ticket = self.clock.start_capture()?;

        log::info!(
            "Capture started: {} frames at {:.1}ms ({}x)",
            run.frame_count(),
            frame_interval_ms,
            speed
        );

        Ok(CaptureSession {
            pipeline: self,
            run,
            ticket,
            frame_interval_ms,
            sequence: 0,
            state: SessionState::Active,
            guard: Some(guard),
        })
    }

    /// Cancel the capture in progress, wherever it is being driven from
    pub fn cancel_capture(&self) -> CaptureResult<()> {
        self.clock.cancel_capture()?;
        Ok(())
    }

    /// Drive a full capture into `sink`, pacing frames at the capture cadence
    pub async fn export<S: VideoSink + ?Sized>(
        &self,
        run: &SimulationRun,
        speed: f64,
        sink: &mut S,
    ) -> CaptureResult<CaptureReport> {
        let hints = self.encoding_hints(run, speed)?;
        let mut session = self.capture(run, speed)?;

        if let Err(e) = sink.begin(&hints).await {
            session.cancel();
            return Err(e);
        }

        let period = scaled_interval(Duration::from_millis(self.capture.frame_interval_ms), speed);
        let mut cadence = tokio::time::interval(period);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut written = 0usize;
        loop {
            cadence.tick().await;
            match session.next_frame() {
                Ok(Some(frame)) => {
                    if let Err(e) = sink.write_frame(frame).await {
                        log::error!("Video sink failed, aborting capture: {}", e);
                        session.cancel();
                        sink.abort().await;
                        return Err(e);
                    }
                    written += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    log::info!("Capture stopped after {} frames: {}", written, e);
                    sink.abort().await;
                    return Err(e);
                }
            }
        }

        sink.finish().await?;

        Ok(CaptureReport {
            frame_count: written,
            frame_interval_ms: hints.frame_interval_ms,
            duration_ms: written as f64 * hints.frame_interval_ms,
        })
    }
}

/// Lazily rendered, finite frame sequence for one capture
pub struct CaptureSession<'a> {
    pipeline: &'a RenderCapturePipeline,
    run: &'a SimulationRun,
    ticket: CaptureTicket,
    frame_interval_ms: f64,
    sequence: usize,
    state: SessionState,
    guard: Option<CaptureGuard>,
}

impl<'a> CaptureSession<'a> {
    pub fn frame_interval_ms(&self) -> f64 {
        self.frame_interval_ms
    }

    pub fn frame_count(&self) -> usize {
        self.run.frame_count()
    }

    pub fn is_finished(&self) -> bool {
        self.state != SessionState::Active
    }

    pub fn was_cancelled(&self) -> bool {
        self.state == SessionState::Cancelled
    }

    /// Render the next frame; `Ok(None)` once every frame has been emitted
    pub fn next_frame(&mut self) -> CaptureResult<Option<CapturedFrame>> {
        match self.state {
            SessionState::Completed => return Ok(None),
            SessionState::Cancelled => return Err(CaptureError::Cancelled),
            SessionState::Active => {}
        }

        match self.pipeline.clock.advance_capture(self.ticket) {
            Ok(CaptureStep::Frame(frame_index)) => {
                let frame = CapturedFrame {
                    sequence: self.sequence,
                    frame_index,
                    timestamp_ms: self.sequence as f64 * self.frame_interval_ms,
                    image: self.pipeline.render_frame(self.run, frame_index),
                };
                self.sequence += 1;
                Ok(Some(frame))
            }
            Ok(CaptureStep::Completed) => {
                self.state = SessionState::Completed;
                self.guard = None;
                Ok(None)
            }
            Err(e) => {
                self.state = SessionState::Cancelled;
                self.guard = None;
                Err(e.into())
            }
        }
    }

    /// Abandon the capture; the clock pauses at its current frame
    pub fn cancel(&mut self) {
        if self.state != SessionState::Active {
            return;
        }
        self.state = SessionState::Cancelled;
        if let Err(e) = self.pipeline.clock.cancel_capture() {
            log::debug!("Capture already ended on the clock: {}", e);
        }
        self.guard = None;
    }
}

/// Yields frames until the capture completes or is cancelled.
///
/// Both endings look the same to a `for` loop: `next` returns `None`. Check
/// `was_cancelled` afterwards, or drive the session with `next_frame` to get
/// `CaptureError::Cancelled` directly.
impl<'a> Iterator for CaptureSession<'a> {
    type Item = CapturedFrame;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().ok().flatten()
    }
}

impl<'a> Drop for CaptureSession<'a> {
    fn drop(&mut self) {
        self.cancel();
    }
}
