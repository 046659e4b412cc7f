//! Immutable, validated view over a song's precomputed structural analysis.
//!
//! The model owns one [`EventSequence`] per tracked [`Tier`] plus the
//! optional list of [`Section`]s used for tempo estimation. Nothing in here
//! mutates after construction, so a model can be shared behind an `Arc` with
//! any number of readers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{error::ValidationReason, BeatSyncError, Result};

pub mod document;

pub use document::{AnalysisDocument, SegmentRecord};

const SECTION_LABEL: &str = "section";

/// One of the three independently timed event grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bar,
    Beat,
    Segment,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Bar, Tier::Beat, Tier::Segment];

    pub fn label(self) -> &'static str {
        match self {
            Tier::Bar => "bar",
            Tier::Beat => "beat",
            Tier::Segment => "segment",
        }
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            Tier::Bar => 0,
            Tier::Beat => 1,
            Tier::Segment => 2,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single musical event, in seconds from the start of the song.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: f64,
    pub duration: f64,
    #[serde(default)]
    pub confidence: f64,
}

impl TimeSpan {
    pub fn new(start: f64, duration: f64) -> Self {
        Self {
            start,
            duration,
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    fn check(&self, index: usize) -> std::result::Result<(), ValidationReason> {
        if !self.start.is_finite() || !self.duration.is_finite() {
            return Err(ValidationReason::NonFinite { index });
        }
        if self.start < 0.0 {
            return Err(ValidationReason::NegativeStart {
                index,
                value: self.start,
            });
        }
        if self.duration < 0.0 {
            return Err(ValidationReason::NegativeDuration {
                index,
                value: self.duration,
            });
        }
        Ok(())
    }
}

/// Timbre, pitch and loudness descriptors attached to a segment. The
/// synchronization engine never looks inside.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentFeatures {
    pub loudness_start: f32,
    pub loudness_max: f32,
    pub loudness_max_time: f32,
    pub loudness_end: Option<f32>,
    /// Chroma energies, one per pitch class.
    pub pitches: Vec<f32>,
    pub timbre: Vec<f32>,
}

/// Tier-specific data carried alongside a [`TimeSpan`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EventPayload {
    #[default]
    Plain,
    Segment(Box<SegmentFeatures>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub span: TimeSpan,
    pub payload: EventPayload,
}

impl Event {
    pub fn segment(span: TimeSpan, features: SegmentFeatures) -> Self {
        Self {
            span,
            payload: EventPayload::Segment(Box::new(features)),
        }
    }

    pub fn segment_features(&self) -> Option<&SegmentFeatures> {
        match &self.payload {
            EventPayload::Segment(features) => Some(features),
            EventPayload::Plain => None,
        }
    }
}

impl From<TimeSpan> for Event {
    fn from(span: TimeSpan) -> Self {
        Self {
            span,
            payload: EventPayload::Plain,
        }
    }
}

/// Larger structural block of the song. Sections are not tracked by the
/// timeline; they only feed [`AnalysisModel::estimated_tempo`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Section {
    #[serde(flatten)]
    pub span: TimeSpan,
    #[serde(default)]
    pub tempo: f64,
    #[serde(default)]
    pub tempo_confidence: f64,
    #[serde(default)]
    pub loudness: f64,
}

/// Non-empty list of events sorted ascending by start time. Gaps and overlaps
/// between neighbours are allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSequence {
    events: Vec<Event>,
    average_duration: f64,
}

impl EventSequence {
    /// Validates `events` and wraps them. `label` only names the sequence in
    /// the returned error.
    pub fn new(label: &'static str, events: Vec<Event>) -> Result<Self> {
        if events.is_empty() {
            return Err(BeatSyncError::validation(label, ValidationReason::Empty));
        }

        let mut previous_start = 0.0;
        for (index, event) in events.iter().enumerate() {
            event
                .span
                .check(index)
                .map_err(|reason| BeatSyncError::validation(label, reason))?;
            if index > 0 && event.span.start < previous_start {
                return Err(BeatSyncError::validation(
                    label,
                    ValidationReason::Unsorted { index },
                ));
            }
            previous_start = event.span.start;
        }

        let total: f64 = events.iter().map(|event| event.span.duration).sum();
        let average_duration = total / events.len() as f64;

        Ok(Self {
            events,
            average_duration,
        })
    }

    pub fn from_spans(label: &'static str, spans: Vec<TimeSpan>) -> Result<Self> {
        Self::new(label, spans.into_iter().map(Event::from).collect())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Always false for a constructed sequence; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.events.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    /// Returns the event at `index`, clamped to the last event.
    pub fn event(&self, index: usize) -> &Event {
        &self.events[index.min(self.last_index())]
    }

    pub fn span(&self, index: usize) -> TimeSpan {
        self.event(index).span
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn spans(&self) -> impl Iterator<Item = TimeSpan> + '_ {
        self.events.iter().map(|event| event.span)
    }

    pub fn average_duration(&self) -> f64 {
        self.average_duration
    }

    /// Latest end time of any event. Overlapping input means this is not
    /// necessarily the end of the last event.
    pub fn end_seconds(&self) -> f64 {
        self.spans().map(|span| span.end()).fold(0.0, f64::max)
    }
}

/// Validated bars, beats and segments of one song.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisModel {
    bars: EventSequence,
    beats: EventSequence,
    segments: EventSequence,
    sections: Vec<Section>,
}

impl AnalysisModel {
    pub fn new(bars: Vec<Event>, beats: Vec<Event>, segments: Vec<Event>) -> Result<Self> {
        let model = Self {
            bars: EventSequence::new(Tier::Bar.label(), bars)?,
            beats: EventSequence::new(Tier::Beat.label(), beats)?,
            segments: EventSequence::new(Tier::Segment.label(), segments)?,
            sections: Vec::new(),
        };

        tracing::debug!(
            bars = model.bars.len(),
            beats = model.beats.len(),
            segments = model.segments.len(),
            "analysis model constructed"
        );

        Ok(model)
    }

    /// Convenience constructor for analyses without segment payloads.
    pub fn from_spans(
        bars: Vec<TimeSpan>,
        beats: Vec<TimeSpan>,
        segments: Vec<TimeSpan>,
    ) -> Result<Self> {
        let wrap = |spans: Vec<TimeSpan>| -> Vec<Event> {
            spans.into_iter().map(Event::from).collect()
        };
        Self::new(wrap(bars), wrap(beats), wrap(segments))
    }

    /// Attaches sections. They need valid timings but may be empty or
    /// unordered.
    pub fn with_sections(mut self, sections: Vec<Section>) -> Result<Self> {
        for (index, section) in sections.iter().enumerate() {
            section
                .span
                .check(index)
                .map_err(|reason| BeatSyncError::validation(SECTION_LABEL, reason))?;
        }
        self.sections = sections;
        Ok(self)
    }

    pub fn sequence(&self, tier: Tier) -> &EventSequence {
        match tier {
            Tier::Bar => &self.bars,
            Tier::Beat => &self.beats,
            Tier::Segment => &self.segments,
        }
    }

    pub fn average_event_duration(&self, tier: Tier) -> f64 {
        self.sequence(tier).average_duration()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Latest event end across all tracked tiers, in seconds.
    pub fn end_seconds(&self) -> f64 {
        Tier::ALL
            .iter()
            .map(|tier| self.sequence(*tier).end_seconds())
            .fold(0.0, f64::max)
    }

    /// Mean tempo of the sections whose tempo confidence exceeds
    /// `min_confidence`. Without any such section the average beat length is
    /// used instead.
    pub fn estimated_tempo(&self, min_confidence: f64) -> Option<f64> {
        let (sum, count) = self
            .sections
            .iter()
            .filter(|section| section.tempo_confidence > min_confidence)
            .fold((0.0, 0usize), |(sum, count), section| {
                (sum + section.tempo, count + 1)
            });

        if count > 0 {
            return Some(sum / count as f64);
        }

        let beat = self.average_event_duration(Tier::Beat);
        (beat > 0.0).then(|| 60.0 / beat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(pairs: &[(f64, f64)]) -> Vec<TimeSpan> {
        pairs
            .iter()
            .map(|(start, duration)| TimeSpan::new(*start, *duration))
            .collect()
    }

    fn bars() -> Vec<TimeSpan> {
        spans(&[(0.0, 2.0), (2.0, 3.0), (5.0, 1.0)])
    }

    fn reason(err: BeatSyncError) -> (&'static str, ValidationReason) {
        match err {
            BeatSyncError::Validation { tier, reason } => (tier, reason),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn reads_back_sequences_unchanged() {
        let beats = spans(&[(0.0, 0.5), (0.25, 0.1), (0.5, 0.5)]);
        let segments = vec![
            Event::segment(
                TimeSpan::new(0.0, 0.3),
                SegmentFeatures {
                    loudness_max: -5.0,
                    pitches: vec![0.1; 12],
                    ..Default::default()
                },
            ),
            Event::from(TimeSpan::new(0.3, 0.4)),
        ];

        let model = AnalysisModel::new(
            bars().into_iter().map(Event::from).collect(),
            beats.iter().copied().map(Event::from).collect(),
            segments.clone(),
        )
        .unwrap();

        let read: Vec<TimeSpan> = model.sequence(Tier::Bar).spans().collect();
        assert_eq!(read, bars());
        let read: Vec<TimeSpan> = model.sequence(Tier::Beat).spans().collect();
        assert_eq!(read, beats);
        assert_eq!(model.sequence(Tier::Segment).events(), segments.as_slice());
    }

    #[test]
    fn rejects_empty_sequences() {
        let err = AnalysisModel::from_spans(bars(), Vec::new(), bars()).unwrap_err();
        assert_eq!(reason(err), ("beat", ValidationReason::Empty));
    }

    #[test]
    fn rejects_unsorted_sequences() {
        let err =
            AnalysisModel::from_spans(bars(), bars(), spans(&[(1.0, 1.0), (0.5, 1.0)])).unwrap_err();
        assert_eq!(
            reason(err),
            ("segment", ValidationReason::Unsorted { index: 1 })
        );
    }

    #[test]
    fn rejects_negative_and_non_finite_timings() {
        let err = AnalysisModel::from_spans(spans(&[(0.0, -1.0)]), bars(), bars()).unwrap_err();
        assert!(matches!(
            reason(err),
            ("bar", ValidationReason::NegativeDuration { index: 0, .. })
        ));

        let err = AnalysisModel::from_spans(bars(), spans(&[(-0.5, 1.0)]), bars()).unwrap_err();
        assert!(matches!(
            reason(err),
            ("beat", ValidationReason::NegativeStart { index: 0, .. })
        ));

        let err =
            AnalysisModel::from_spans(bars(), bars(), spans(&[(0.0, 1.0), (f64::NAN, 1.0)]))
                .unwrap_err();
        assert_eq!(
            reason(err),
            ("segment", ValidationReason::NonFinite { index: 1 })
        );
    }

    #[test]
    fn accepts_gaps_overlaps_and_equal_starts() {
        let irregular = spans(&[(0.0, 5.0), (0.0, 1.0), (2.0, 0.0), (10.0, 1.0)]);
        let model = AnalysisModel::from_spans(irregular.clone(), irregular.clone(), irregular);
        assert!(model.is_ok());
    }

    #[test]
    fn averages_durations_per_tier() {
        let model =
            AnalysisModel::from_spans(bars(), spans(&[(0.0, 0.5), (0.5, 0.25)]), bars()).unwrap();
        assert!((model.average_event_duration(Tier::Bar) - 2.0).abs() < 1e-12);
        assert!((model.average_event_duration(Tier::Beat) - 0.375).abs() < 1e-12);
    }

    #[test]
    fn end_seconds_covers_overlapping_events() {
        let model =
            AnalysisModel::from_spans(spans(&[(0.0, 12.0), (1.0, 1.0)]), bars(), bars()).unwrap();
        assert_eq!(model.sequence(Tier::Bar).end_seconds(), 12.0);
        assert_eq!(model.end_seconds(), 12.0);
    }

    #[test]
    fn estimates_tempo_from_confident_sections() {
        let section = |tempo, tempo_confidence| Section {
            span: TimeSpan::new(0.0, 10.0),
            tempo,
            tempo_confidence,
            loudness: -8.0,
        };
        let model = AnalysisModel::from_spans(bars(), bars(), bars())
            .unwrap()
            .with_sections(vec![
                section(120.0, 0.9),
                section(124.0, 0.6),
                section(60.0, 0.2),
            ])
            .unwrap();

        assert_eq!(model.estimated_tempo(0.5), Some(122.0));
    }

    #[test]
    fn falls_back_to_beat_length_for_tempo() {
        let model =
            AnalysisModel::from_spans(bars(), spans(&[(0.0, 0.5), (0.5, 0.5)]), bars()).unwrap();
        assert_eq!(model.estimated_tempo(0.5), Some(120.0));

        let model = AnalysisModel::from_spans(bars(), spans(&[(0.0, 0.0)]), bars()).unwrap();
        assert_eq!(model.estimated_tempo(0.5), None);
    }

    #[test]
    fn rejects_sections_with_negative_timing() {
        let err = AnalysisModel::from_spans(bars(), bars(), bars())
            .unwrap()
            .with_sections(vec![Section {
                span: TimeSpan::new(-1.0, 2.0),
                ..Default::default()
            }])
            .unwrap_err();
        assert!(matches!(
            reason(err),
            ("section", ValidationReason::NegativeStart { index: 0, .. })
        ));
    }

    #[test]
    fn clamps_event_lookup_to_last_index() {
        let sequence = EventSequence::from_spans("bar", bars()).unwrap();
        assert_eq!(sequence.last_index(), 2);
        assert_eq!(sequence.span(7), TimeSpan::new(5.0, 1.0));
        assert!(sequence.get(7).is_none());
    }
}
