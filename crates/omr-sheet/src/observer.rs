//! Progress events and debug snapshots emitted while a sheet is processed.

use std::sync::Mutex;

use omr_core::{GrayImage, PixelRect};
use serde::Serialize;

use crate::locate::RegionTier;

/// Pipeline stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    PageCorners,
    PageWarp,
    BlockMarkers,
    AnswerRegion,
    IdentityRegion,
    IdentityDecode,
    AnswerDecode,
    Assemble,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::PageCorners => "page_corners",
            Stage::PageWarp => "page_warp",
            Stage::BlockMarkers => "block_markers",
            Stage::AnswerRegion => "answer_region",
            Stage::IdentityRegion => "identity_region",
            Stage::IdentityDecode => "identity_decode",
            Stage::AnswerDecode => "answer_decode",
            Stage::Assemble => "assemble",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which sheet region a cascade locates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Answers,
    Identity,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageStarted {
        stage: Stage,
    },
    MarkersFound {
        family: &'static str,
        count: usize,
    },
    /// `corrected` is false when the original page was kept.
    PageWarped {
        corrected: bool,
    },
    TierRejected {
        region: RegionKind,
        tier: RegionTier,
    },
    RegionLocated {
        region: RegionKind,
        tier: RegionTier,
        bounds: PixelRect,
    },
    SecondaryScan {
        student_confidence: f32,
        test_confidence: f32,
    },
    AnswerFallback {
        rows_found: usize,
    },
    Finished {
        duration_ms: u64,
        success: bool,
    },
}

/// Receives pipeline events. Implementations must be cheap; they run inline.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);

    /// Intermediate raster, only called when [`wants_snapshots`](Self::wants_snapshots).
    fn on_snapshot(&self, _name: &str, _image: &GrayImage) {}

    fn wants_snapshots(&self) -> bool {
        false
    }
}

/// Forwards events to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::TierRejected { region, tier } => {
                log::debug!("{region:?}: tier {} rejected", tier.as_str())
            }
            PipelineEvent::RegionLocated {
                region,
                tier,
                bounds,
            } if tier.is_fallback() => {
                log::warn!(
                    "{region:?} located by fallback tier {} at {bounds:?}",
                    tier.as_str()
                )
            }
            PipelineEvent::PageWarped { corrected: false } => {
                log::warn!("page corners incomplete, continuing on the uncorrected page")
            }
            PipelineEvent::AnswerFallback { rows_found } => {
                log::warn!("only {rows_found} answer rows found, decoding the block as a grid")
            }
            other => log::debug!("{other:?}"),
        }
    }
}

/// Keeps every event; handy in tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
    snapshots: Mutex<Vec<String>>,
    keep_snapshots: bool,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also request snapshots and record their names.
    pub fn with_snapshots() -> Self {
        Self {
            keep_snapshots: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn snapshot_names(&self) -> Vec<String> {
        self.snapshots.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }

    fn on_snapshot(&self, name: &str, _image: &GrayImage) {
        if let Ok(mut names) = self.snapshots.lock() {
            names.push(name.to_string());
        }
    }

    fn wants_snapshots(&self) -> bool {
        self.keep_snapshots
    }
}
