// src/playback/clock.rs
use crate::config::PlaybackConfig;
use crate::domain::errors::{PlaybackError, PlaybackResult};
use crate::domain::models::{PlaybackMode, PlaybackState};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::time::Duration;

/// Bounds on the wait between frames at any speed multiplier
pub const MIN_FRAME_INTERVAL: Duration = Duration::from_nanos(1);
pub const MAX_FRAME_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// `base / speed`, clamped to `MIN_FRAME_INTERVAL..=MAX_FRAME_INTERVAL`
pub fn scaled_interval(base: Duration, speed: f64) -> Duration {
    Duration::try_from_secs_f64(base.as_secs_f64() / speed)
        .unwrap_or(MAX_FRAME_INTERVAL)
        .clamp(MIN_FRAME_INTERVAL, MAX_FRAME_INTERVAL)
}

/// Notifications published by the clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockEvent {
    Tick(PlaybackState),
    AutoPaused(PlaybackState),
    CaptureCompleted(PlaybackState),
    CaptureCancelled(PlaybackState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Advanced,
    ReachedEnd,
    /// The tick was scheduled before a reset, pause or capture and is ignored
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStep {
    Frame(usize),
    Completed,
}

/// Identifies one capture; invalid once the capture ends or is cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTicket(u64);

impl CaptureTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Frame counter state machine.
///
/// Every transition that must discard scheduled work bumps `generation`; a
/// tick or capture step carrying an older generation is refused.
#[derive(Debug, Clone)]
pub struct ClockState {
    mode: PlaybackMode,
    frame: usize,
    last_frame: usize,
    speed: f64,
    generation: u64,
    resume_mode: PlaybackMode,
    capture_emitted: bool,
}

impl ClockState {
    pub fn new(frame_count: usize, speed: f64) -> Self {
        Self {
            mode: PlaybackMode::Stopped,
            frame: 0,
            last_frame: frame_count.saturating_sub(1),
            speed: if speed.is_finite() && speed > 0.0 { speed } else { 1.0 },
            generation: 0,
            resume_mode: PlaybackMode::Paused,
            capture_emitted: false,
        }
    }

    pub fn snapshot(&self) -> PlaybackState {
        PlaybackState {
            frame_index: self.frame,
            last_frame: self.last_frame,
            mode: self.mode,
            is_playing: self.mode == PlaybackMode::Playing,
            is_capturing: self.mode == PlaybackMode::Capturing,
            speed_multiplier: self.speed,
        }
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Retarget to a new series length and reset
    pub fn load(&mut self, frame_count: usize) {
        self.last_frame = frame_count.saturating_sub(1);
        self.reset();
    }

    /// Back to STOPPED at frame 0 from any state. Returns whether a capture was discarded.
    pub fn reset(&mut self) -> bool {
        let was_capturing = self.mode == PlaybackMode::Capturing;
        self.invalidate();
        self.mode = PlaybackMode::Stopped;
        self.frame = 0;
        self.capture_emitted = false;
        was_capturing
    }

    pub fn seek(&mut self, frame: usize) -> PlaybackResult<()> {
        if self.mode == PlaybackMode::Capturing {
            return Err(PlaybackError::CaptureInProgress);
        }
        self.frame = frame.min(self.last_frame);
        if self.mode == PlaybackMode::Stopped && self.frame > 0 {
            self.mode = PlaybackMode::Paused;
        }
        Ok(())
    }

    /// Returns the generation a new ticking driver must carry, if one is needed
    pub fn play(&mut self) -> PlaybackResult<Option<u64>> {
        match self.mode {
            PlaybackMode::Capturing => Err(PlaybackError::CaptureInProgress),
            PlaybackMode::Playing => Ok(None),
            PlaybackMode::Stopped | PlaybackMode::Paused => {
                if self.frame >= self.last_frame {
                    self.frame = self.last_frame;
                    self.mode = PlaybackMode::Paused;
                    return Ok(None);
                }
                self.invalidate();
                self.mode = PlaybackMode::Playing;
                Ok(Some(self.generation))
            }
        }
    }

    pub fn pause(&mut self) -> PlaybackResult<()> {
        match self.mode {
            PlaybackMode::Capturing => Err(PlaybackError::CaptureInProgress),
            PlaybackMode::Playing => {
                self.invalidate();
                self.mode = PlaybackMode::Paused;
                Ok(())
            }
            PlaybackMode::Stopped | PlaybackMode::Paused => Ok(()),
        }
    }

    pub fn tick(&mut self, generation: u64) -> TickOutcome {
        if generation != self.generation || self.mode != PlaybackMode::Playing {
            return TickOutcome::Stale;
        }
        if self.frame < self.last_frame {
            self.frame += 1;
        }
        if self.frame >= self.last_frame {
            self.invalidate();
            self.mode = PlaybackMode::Paused;
            return TickOutcome::ReachedEnd;
        }
        TickOutcome::Advanced
    }

    pub fn set_speed(&mut self, speed: f64) -> PlaybackResult<()> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(PlaybackError::InvalidSpeed(speed));
        }
        self.speed = speed;
        Ok(())
    }

    pub fn tick_interval(&self, base: Duration) -> Duration {
        scaled_interval(base, self.speed)
    }

    /// Enter CAPTURING at frame 0, suspending real-time ticking
    pub fn start_capture(&mut self) -> PlaybackResult<CaptureTicket> {
        if self.mode == PlaybackMode::Capturing {
            return Err(PlaybackError::AlreadyCapturing);
        }
        self.resume_mode = if self.mode == PlaybackMode::Playing {
            PlaybackMode::Playing
        } else {
            PlaybackMode::Paused
        };
        self.invalidate();
        self.mode = PlaybackMode::Capturing;
        self.frame = 0;
        self.capture_emitted = false;
        Ok(CaptureTicket(self.generation))
    }

    /// Next frame to emit, or `Completed` once every frame went out
    pub fn advance_capture(&mut self, ticket: CaptureTicket) -> PlaybackResult<CaptureStep> {
        if self.mode != PlaybackMode::Capturing {
            return Err(PlaybackError::NotCapturing);
        }
        if ticket.0 != self.generation {
            return Err(PlaybackError::StaleCapture(ticket.0));
        }

        if !self.capture_emitted {
            self.capture_emitted = true;
            return Ok(CaptureStep::Frame(self.frame));
        }
        if self.frame < self.last_frame {
            self.frame += 1;
            return Ok(CaptureStep::Frame(self.frame));
        }

        self.invalidate();
        self.capture_emitted = false;
        // resuming playback at the last frame stops immediately
        self.mode = match self.resume_mode {
            PlaybackMode::Playing if self.frame < self.last_frame => PlaybackMode::Playing,
            _ => PlaybackMode::Paused,
        };
        Ok(CaptureStep::Completed)
    }

    pub fn cancel_capture(&mut self) -> PlaybackResult<()> {
        if self.mode != PlaybackMode::Capturing {
            return Err(PlaybackError::NotCapturing);
        }
        self.invalidate();
        self.capture_emitted = false;
        self.mode = PlaybackMode::Paused;
        Ok(())
    }

    fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

fn lock(state: &Mutex<ClockState>) -> MutexGuard<'_, ClockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared handle that owns the playback state and its ticking driver.
///
/// Clones refer to the same clock. `play` needs a Tokio runtime; ticking
/// happens on a spawned task that sleeps between frames.
#[derive(Clone)]
pub struct PlaybackClock {
    state: Arc<Mutex<ClockState>>,
    events: broadcast::Sender<ClockEvent>,
    base_interval: Duration,
}

impl PlaybackClock {
    pub fn new(frame_count: usize, base_interval: Duration) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            state: Arc::new(Mutex::new(ClockState::new(frame_count, 1.0))),
            events,
            base_interval,
        }
    }

    pub fn from_config(config: &PlaybackConfig, frame_count: usize) -> PlaybackResult<Self> {
        let clock = Self::new(frame_count, Duration::from_millis(config.base_interval_ms));
        clock.set_speed(config.speed_multiplier)?;
        Ok(clock)
    }

    /// Subscribe to clock events
    pub fn subscribe(&self) -> broadcast::Receiver<ClockEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> PlaybackState {
        lock(&self.state).snapshot()
    }

    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    pub fn load(&self, frame_count: usize) -> PlaybackState {
        let mut state = lock(&self.state);
        if state.mode() == PlaybackMode::Capturing {
            log::warn!("Loading a new run discards the capture in progress");
        }
        state.load(frame_count);
        state.snapshot()
    }

    pub fn reset(&self) -> PlaybackState {
        let (discarded, snapshot) = {
            let mut state = lock(&self.state);
            let discarded = state.reset();
            (discarded, state.snapshot())
        };
        if discarded {
            log::info!("Capture discarded by reset");
            self.publish(ClockEvent::CaptureCancelled(snapshot));
        }
        snapshot
    }

    pub fn seek(&self, frame: usize) -> PlaybackResult<PlaybackState> {
        let mut state = lock(&self.state);
        state.seek(frame)?;
        Ok(state.snapshot())
    }

    pub fn play(&self) -> PlaybackResult<PlaybackState> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| PlaybackError::NoRuntime)?;

        let (generation, snapshot) = {
            let mut state = lock(&self.state);
            let generation = state.play()?;
            (generation, state.snapshot())
        };

        match generation {
            Some(generation) => {
                log::debug!("Playback started at frame {}", snapshot.frame_index);
                self.spawn_ticker(&runtime, generation);
            }
            None if snapshot.mode == PlaybackMode::Paused => {
                self.publish(ClockEvent::AutoPaused(snapshot));
            }
            None => {}
        }
        Ok(snapshot)
    }

    pub fn pause(&self) -> PlaybackResult<PlaybackState> {
        let mut state = lock(&self.state);
        state.pause()?;
        Ok(state.snapshot())
    }

    pub fn set_speed(&self, speed: f64) -> PlaybackResult<PlaybackState> {
        let mut state = lock(&self.state);
        state.set_speed(speed)?;
        Ok(state.snapshot())
    }

    pub fn start_capture(&self) -> PlaybackResult<CaptureTicket> {
        let ticket = lock(&self.state).start_capture()?;
        log::debug!("Clock entered capture {}", ticket.id());
        Ok(ticket)
    }

    pub fn advance_capture(&self, ticket: CaptureTicket) -> PlaybackResult<CaptureStep> {
        let (step, snapshot) = {
            let mut state = lock(&self.state);
            let step = state.advance_capture(ticket)?;
            (step, state.snapshot())
        };
        if step == CaptureStep::Completed {
            log::info!("Capture {} completed, clock back to {}", ticket.id(), snapshot.mode);
            self.publish(ClockEvent::CaptureCompleted(snapshot));
        }
        Ok(step)
    }

    pub fn cancel_capture(&self) -> PlaybackResult<PlaybackState> {
        let snapshot = {
            let mut state = lock(&self.state);
            state.cancel_capture()?;
            state.snapshot()
        };
        log::info!("Capture cancelled at frame {}", snapshot.frame_index);
        self.publish(ClockEvent::CaptureCancelled(snapshot));
        Ok(snapshot)
    }

    fn publish(&self, event: ClockEvent) {
        // no subscribers is not an error
        let _ = self.events.send(event);
    }

    fn spawn_ticker(&self, runtime: &tokio::runtime::Handle, generation: u64) {
        let state = self.state.clone();
        let events = self.events.clone();
        let base = self.base_interval;

        runtime.spawn(async move {
            loop {
                let interval = {
                    let state = lock(&state);
                    if state.generation() != generation {
                        break;
                    }
                    state.tick_interval(base)
                };

                tokio::time::sleep(interval).await;

                let (outcome, snapshot) = {
                    let mut state = lock(&state);
                    (state.tick(generation), state.snapshot())
                };

                match outcome {
                    TickOutcome::Advanced => {
                        let _ = events.send(ClockEvent::Tick(snapshot));
                    }
                    TickOutcome::ReachedEnd => {
                        let _ = events.send(ClockEvent::Tick(snapshot));
                        let _ = events.send(ClockEvent::AutoPaused(snapshot));
                        log::debug!("Playback reached frame {}", snapshot.frame_index);
                        break;
                    }
                    TickOutcome::Stale => break,
                }
            }
        });
    }
}
