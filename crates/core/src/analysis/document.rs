//! Serde shape of the JSON analysis document produced by the external
//! analysis service. Only the fields the engine needs are modelled; anything
//! else (`tatums`, `meta`, `track`, the redundant beat `end`) is ignored.

use std::{fs::File, io::Read, path::Path};

use serde::{Deserialize, Serialize};

use super::{AnalysisModel, Event, Section, SegmentFeatures, TimeSpan};
use crate::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisDocument {
    #[serde(default)]
    pub bars: Vec<TimeSpan>,
    #[serde(default)]
    pub beats: Vec<TimeSpan>,
    #[serde(default)]
    pub segments: Vec<SegmentRecord>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// A segment entry: timing fields and descriptors share one flat object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentRecord {
    #[serde(flatten)]
    pub span: TimeSpan,
    #[serde(flatten)]
    pub features: SegmentFeatures,
}

impl TryFrom<AnalysisDocument> for AnalysisModel {
    type Error = crate::BeatSyncError;

    fn try_from(document: AnalysisDocument) -> Result<Self> {
        let plain = |spans: Vec<TimeSpan>| -> Vec<Event> {
            spans.into_iter().map(Event::from).collect()
        };
        let segments = document
            .segments
            .into_iter()
            .map(|record| Event::segment(record.span, record.features))
            .collect();

        AnalysisModel::new(plain(document.bars), plain(document.beats), segments)?
            .with_sections(document.sections)
    }
}

impl AnalysisModel {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: AnalysisDocument = serde_json::from_str(json)?;
        Self::try_from(document)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let document: AnalysisDocument = serde_json::from_reader(reader)?;
        Self::try_from(document)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(?path, "loading analysis document");
        let file = File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analysis::Tier, error::ValidationReason, BeatSyncError};

    const SAMPLE: &str = r#"{
        "meta": { "analyzer_version": "4.0.0" },
        "bars": [
            { "start": 0.0, "duration": 2.0, "confidence": 0.9 },
            { "start": 2.0, "duration": 2.0, "confidence": 0.8 }
        ],
        "beats": [
            { "start": 0.0, "duration": 0.5, "confidence": 0.7, "end": 0.5 },
            { "start": 0.5, "duration": 0.5, "confidence": 0.6, "end": 1.0 }
        ],
        "tatums": [ { "start": 0.0, "duration": 0.25, "confidence": 0.4 } ],
        "sections": [
            { "start": 0.0, "duration": 4.0, "confidence": 1.0, "loudness": -7.2,
              "tempo": 118.0, "tempo_confidence": 0.7, "key": 5 }
        ],
        "segments": [
            { "start": 0.0, "duration": 0.3, "confidence": 1.0,
              "loudness_start": -60.0, "loudness_max_time": 0.05, "loudness_max": -12.5,
              "pitches": [1.0, 0.2, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.3, 0.5],
              "timbre": [40.0, -3.5, 12.0] }
        ]
    }"#;

    #[test]
    fn decodes_full_document() {
        let model = AnalysisModel::from_json_str(SAMPLE).unwrap();

        assert_eq!(model.sequence(Tier::Bar).len(), 2);
        assert_eq!(model.sequence(Tier::Beat).span(1).confidence, 0.6);
        assert_eq!(model.sections().len(), 1);
        assert_eq!(model.estimated_tempo(0.5), Some(118.0));

        let segment = model.sequence(Tier::Segment).event(0);
        let features = segment.segment_features().expect("segment payload");
        assert_eq!(features.loudness_max, -12.5);
        assert_eq!(features.pitches.len(), 12);
        assert_eq!(features.timbre, vec![40.0, -3.5, 12.0]);
        assert_eq!(features.loudness_end, None);
    }

    #[test]
    fn defaults_missing_confidence() {
        let json = r#"{
            "bars": [{ "start": 0.0, "duration": 1.0 }],
            "beats": [{ "start": 0.0, "duration": 1.0 }],
            "segments": [{ "start": 0.0, "duration": 1.0 }]
        }"#;
        let model = AnalysisModel::from_json_str(json).unwrap();
        assert_eq!(model.sequence(Tier::Bar).span(0).confidence, 0.0);
        assert!(model.sections().is_empty());
    }

    #[test]
    fn missing_tier_is_a_validation_error() {
        let json = r#"{ "bars": [{ "start": 0.0, "duration": 1.0 }], "beats": [] }"#;
        let err = AnalysisModel::from_json_str(json).unwrap_err();
        assert!(matches!(
            err,
            BeatSyncError::Validation {
                tier: "beat",
                reason: ValidationReason::Empty
            }
        ));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = AnalysisModel::from_json_str("{ \"bars\": [").unwrap_err();
        assert!(matches!(err, BeatSyncError::Json(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = AnalysisModel::from_path("/definitely/not/here/analysis.json").unwrap_err();
        assert!(matches!(err, BeatSyncError::Io(_)));
    }
}
