//! Fixed-rate driver that samples a [`PlaybackClock`], advances a
//! [`TimelineTracker`] and hands each [`Snapshot`] to a [`RenderSink`].

use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use crate::{timeline::Snapshot, Result, SyncConfig, TimelineTracker};

mod clock;

pub use clock::{ManualClock, PlaybackClock, TransportState, WallClock};

/// Receives one snapshot per rendered tick.
pub trait RenderSink {
    fn render(&mut self, snapshot: &Snapshot);
}

impl<F> RenderSink for F
where
    F: FnMut(&Snapshot),
{
    fn render(&mut self, snapshot: &Snapshot) {
        self(snapshot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A snapshot was produced and rendered.
    Rendered,
    /// Transport is paused; nothing was sampled.
    Paused,
    /// Transport stopped, or the song ended with `stop_at_end` set. In the
    /// latter case the final snapshot was still rendered.
    Finished,
}

/// Owns the clock, the tracker and the render callback for one session.
pub struct SyncDriver<C, R> {
    clock: C,
    tracker: TimelineTracker,
    sink: R,
    tick_period: Duration,
    stop_at_end: bool,
    rendered: u64,
}

impl<C, R> SyncDriver<C, R>
where
    C: PlaybackClock,
    R: RenderSink,
{
    /// Builds a driver, priming the tracker if that has not happened yet.
    pub fn new(
        clock: C,
        mut tracker: TimelineTracker,
        sink: R,
        config: &SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        if !tracker.is_primed() {
            tracker.update(0.0);
        }

        Ok(Self {
            clock,
            tracker,
            sink,
            tick_period: config.tick_period(),
            stop_at_end: config.stop_at_end,
            rendered: 0,
        })
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn tracker(&self) -> &TimelineTracker {
        &self.tracker
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn rendered_ticks(&self) -> u64 {
        self.rendered
    }

    /// Runs a single tick without sleeping.
    pub fn tick(&mut self) -> TickOutcome {
        match self.clock.transport() {
            TransportState::Stopped => return TickOutcome::Finished,
            TransportState::Paused => return TickOutcome::Paused,
            TransportState::Playing => {}
        }

        let snapshot = self.tracker.update(self.clock.elapsed_ms());
        self.sink.render(&snapshot);
        self.rendered += 1;

        if snapshot.song_ended && self.stop_at_end {
            TickOutcome::Finished
        } else {
            TickOutcome::Rendered
        }
    }

    /// Ticks at the configured rate until the session finishes or `stop` is
    /// raised. Returns the number of rendered ticks.
    pub fn run(&mut self, stop: &AtomicBool) -> u64 {
        tracing::info!(period = ?self.tick_period, "driver started");

        while !stop.load(Ordering::Relaxed) {
            let started = Instant::now();
            if self.tick() == TickOutcome::Finished {
                break;
            }

            let spent = started.elapsed();
            match self.tick_period.checked_sub(spent) {
                Some(rest) => thread::sleep(rest),
                None => {
                    tracing::warn!(?spent, period = ?self.tick_period, "tick overran its period")
                }
            }
        }

        tracing::info!(rendered = self.rendered, "driver stopped");
        self.rendered
    }

    pub fn into_parts(self) -> (C, TimelineTracker, R) {
        (self.clock, self.tracker, self.sink)
    }
}

impl<C, R> fmt::Debug for SyncDriver<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncDriver")
            .field("tracker", &self.tracker)
            .field("tick_period", &self.tick_period)
            .field("stop_at_end", &self.stop_at_end)
            .field("rendered", &self.rendered)
            .finish_non_exhaustive()
    }
}
