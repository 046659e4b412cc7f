use std::time::{Duration, Instant};

/// Transport state reported by the playback backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Playing,
    Paused,
    Stopped,
}

/// Source of "elapsed time since playback started".
pub trait PlaybackClock {
    /// Milliseconds of playback so far. Must not decrease while playing.
    fn elapsed_ms(&self) -> f64;

    fn transport(&self) -> TransportState {
        TransportState::Playing
    }
}

/// Wall-clock backed playback clock. Time spent paused is excluded.
#[derive(Debug, Clone)]
pub struct WallClock {
    started_at: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
    stopped: bool,
}

impl WallClock {
    /// Starts a clock that is already running.
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
            paused_at: None,
            paused_total: Duration::ZERO,
            stopped: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        let now = self.paused_at.unwrap_or_else(Instant::now);
        now.saturating_duration_since(self.started_at)
            .saturating_sub(self.paused_total)
    }

    pub fn pause(&mut self) {
        if self.paused_at.is_none() && !self.stopped {
            self.paused_at = Some(Instant::now());
        }
    }

    pub fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += paused_at.elapsed();
        }
    }

    pub fn stop(&mut self) {
        self.pause();
        self.stopped = true;
    }
}

impl PlaybackClock for WallClock {
    fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    fn transport(&self) -> TransportState {
        if self.stopped {
            TransportState::Stopped
        } else if self.paused_at.is_some() {
            TransportState::Paused
        } else {
            TransportState::Playing
        }
    }
}

/// Clock advanced explicitly by the caller. Used for offline replay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualClock {
    elapsed_ms: f64,
    state: TransportState,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_elapsed_ms(&mut self, elapsed_ms: f64) {
        self.elapsed_ms = elapsed_ms.max(0.0);
    }

    pub fn advance(&mut self, delta: Duration) {
        self.elapsed_ms += delta.as_secs_f64() * 1000.0;
    }

    pub fn set_transport(&mut self, state: TransportState) {
        self.state = state;
    }
}

impl PlaybackClock for ManualClock {
    fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    fn transport(&self) -> TransportState {
        self.state
    }
}
