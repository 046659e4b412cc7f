//! Forward-only synchronization of a playback clock against the bar, beat and
//! segment grids of an [`AnalysisModel`].

use std::sync::Arc;

use serde::Serialize;

use crate::{
    analysis::{AnalysisModel, Event, EventSequence, Tier, TimeSpan},
    BeatSyncError, Result,
};

/// Index of the active event within one tier. Only ever moves forward, one
/// event at a time, and stops at the last event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
}

impl Cursor {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Steps past every event that ended before `elapsed_seconds`. Returns
    /// the number of steps taken.
    fn advance(&mut self, sequence: &EventSequence, elapsed_seconds: f64) -> usize {
        let last = sequence.last_index();
        let mut steps = 0;
        while self.index < last && elapsed_seconds > sequence.span(self.index).end() {
            self.index += 1;
            steps += 1;
        }
        steps
    }
}

/// Per-tier view emitted in every [`Snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierState {
    pub tier: Tier,
    pub index: usize,
    pub span: TimeSpan,
    pub next_index: usize,
    pub next_span: TimeSpan,
    /// True only on the update in which the cursor moved.
    pub changed: bool,
    /// Milliseconds until the next event starts. Negative once the final
    /// event's start is behind the clock.
    pub ms_until_next: f64,
    /// `ms_until_next` over the current event's duration: 1.0 at the start of
    /// the event, 0.0 at the next boundary. Non-finite for zero-length spans.
    pub completion_fraction: f64,
}

impl TierState {
    fn compute(
        tier: Tier,
        sequence: &EventSequence,
        cursor: Cursor,
        changed: bool,
        elapsed_ms: f64,
    ) -> Self {
        let index = cursor.index();
        let next_index = (index + 1).min(sequence.last_index());
        let span = sequence.span(index);
        let next_span = sequence.span(next_index);
        let ms_until_next = next_span.start * 1000.0 - elapsed_ms;
        let completion_fraction = ms_until_next / (span.duration * 1000.0);

        Self {
            tier,
            index,
            span,
            next_index,
            next_span,
            changed,
            ms_until_next,
            completion_fraction,
        }
    }

    /// The current event is the final one in its tier.
    pub fn is_terminal(&self) -> bool {
        self.next_index == self.index
    }

    /// Remaining fraction, or `None` when it cannot be determined.
    pub fn remaining_fraction(&self) -> Option<f64> {
        self.completion_fraction
            .is_finite()
            .then_some(self.completion_fraction)
    }

    pub fn checked_fraction(&self) -> Result<f64> {
        self.remaining_fraction()
            .ok_or(BeatSyncError::IndeterminateTiming {
                tier: self.tier,
                index: self.index,
            })
    }

    /// `1 - remaining`, for consumers that want a value rising through the
    /// event.
    pub fn elapsed_fraction(&self) -> Option<f64> {
        self.remaining_fraction().map(|remaining| 1.0 - remaining)
    }
}

/// Everything the renderer needs for a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    pub elapsed_ms: f64,
    /// The clock is past the end of every tracked event.
    pub song_ended: bool,
    pub bar: TierState,
    pub beat: TierState,
    pub segment: TierState,
}

impl Snapshot {
    pub fn tier(&self, tier: Tier) -> &TierState {
        match tier {
            Tier::Bar => &self.bar,
            Tier::Beat => &self.beat,
            Tier::Segment => &self.segment,
        }
    }

    pub fn changed_tiers(&self) -> impl Iterator<Item = Tier> + '_ {
        Tier::ALL
            .into_iter()
            .filter(|tier| self.tier(*tier).changed)
    }
}

/// Stateful engine converting elapsed playback time into a [`Snapshot`].
///
/// Cursors only move forward. Feeding a smaller `elapsed_ms` than the
/// previous call leaves them where they are, so the snapshot goes stale but
/// stays consistent. Use [`TimelineTracker::reset`] to start over.
#[derive(Debug, Clone)]
pub struct TimelineTracker {
    model: Arc<AnalysisModel>,
    cursors: [Cursor; 3],
    end_seconds: f64,
    last_elapsed_ms: Option<f64>,
}

impl TimelineTracker {
    /// Creates an unprimed tracker. Snapshots are valid only after the first
    /// [`update`](Self::update), normally `update(0.0)`.
    pub fn new(model: Arc<AnalysisModel>) -> Self {
        let end_seconds = model.end_seconds();
        Self {
            model,
            cursors: [Cursor::default(); 3],
            end_seconds,
            last_elapsed_ms: None,
        }
    }

    /// Creates a tracker and primes it at time zero.
    pub fn primed(model: Arc<AnalysisModel>) -> Self {
        let mut tracker = Self::new(model);
        tracker.update(0.0);
        tracing::debug!("timeline tracker primed");
        tracker
    }

    pub fn is_primed(&self) -> bool {
        self.last_elapsed_ms.is_some()
    }

    pub fn model(&self) -> &Arc<AnalysisModel> {
        &self.model
    }

    pub fn cursor(&self, tier: Tier) -> Cursor {
        self.cursors[tier.slot()]
    }

    /// Event under the cursor, payload included.
    pub fn current_event(&self, tier: Tier) -> &Event {
        self.model.sequence(tier).event(self.cursor(tier).index())
    }

    /// Moves every cursor back to the first event and forgets the last
    /// sampled time.
    pub fn reset(&mut self) {
        self.cursors = [Cursor::default(); 3];
        self.last_elapsed_ms = None;
        tracing::debug!("timeline tracker reset");
    }

    /// Advances the cursors to `elapsed_ms` (milliseconds since playback
    /// started) and returns the resulting snapshot.
    pub fn update(&mut self, elapsed_ms: f64) -> Snapshot {
        if let Some(previous) = self.last_elapsed_ms {
            if elapsed_ms < previous {
                tracing::warn!(
                    previous,
                    elapsed_ms,
                    "playback clock moved backwards; cursors left in place"
                );
            }
        }
        self.last_elapsed_ms = Some(elapsed_ms);

        let elapsed_seconds = elapsed_ms / 1000.0;
        let model = &self.model;
        let cursors = &mut self.cursors;
        let [bar, beat, segment] = Tier::ALL.map(|tier| {
            let sequence = model.sequence(tier);
            let cursor = &mut cursors[tier.slot()];
            let steps = cursor.advance(sequence, elapsed_seconds);

            if steps > 1 {
                tracing::debug!(
                    %tier,
                    steps,
                    index = cursor.index(),
                    "skipped events in one tick"
                );
            } else if steps == 1 {
                tracing::trace!(%tier, index = cursor.index(), "advanced");
            }

            TierState::compute(tier, sequence, *cursor, steps > 0, elapsed_ms)
        });

        Snapshot {
            elapsed_ms,
            song_ended: elapsed_seconds > self.end_seconds,
            bar,
            beat,
            segment,
        }
    }
}
