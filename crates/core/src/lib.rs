//! Core library for the Beat Sync engine.
//!
//! A precomputed song analysis ([`AnalysisModel`]) is turned into per-tick
//! timing signals ([`Snapshot`]) by a forward-only [`TimelineTracker`]. The
//! [`driver`] module wires a playback clock, the tracker and a render callback
//! into a fixed-rate loop.

pub mod analysis;
pub mod config;
pub mod driver;
pub mod error;
pub mod timeline;

pub use analysis::{
    AnalysisDocument, AnalysisModel, Event, EventPayload, EventSequence, Section,
    SegmentFeatures, Tier, TimeSpan,
};
pub use config::{AppConfig, LogConfig, SyncConfig};
pub use driver::{
    ManualClock, PlaybackClock, RenderSink, SyncDriver, TickOutcome, TransportState, WallClock,
};
pub use error::{BeatSyncError, Result, ValidationReason};
pub use timeline::{Cursor, Snapshot, TierState, TimelineTracker};
