pub mod clock;

pub use clock::{CaptureStep, CaptureTicket, ClockEvent, ClockState, PlaybackClock, TickOutcome};
