//! Per-document orchestration of all stages.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use omr_core::{BinaryMask, GrayImage, ImageError, PerspectiveCorrector, Preprocessor, RasterImage};
use omr_fiducial::{corner_quad, FiducialDetector};

use crate::answers::AnswerDecoder;
use crate::identity::IdentityDecoder;
use crate::locate::{
    answer_cascade, identity_cascade, Cascade, IdentityRegions, LocateContext, LocatedRegion,
};
use crate::observer::{LogObserver, PipelineEvent, PipelineObserver, RegionKind, Stage};
use crate::result::{ProcessResult, SheetReading};
use crate::SheetConfig;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("deadline exceeded before stage {stage} ({elapsed_ms} ms elapsed)")]
    DeadlineExceeded { stage: Stage, elapsed_ms: u64 },
    #[error("no {region:?} region could be located")]
    RegionNotFound { region: RegionKind },
}

struct Clock {
    started: Instant,
    limit: Option<Duration>,
}

impl Clock {
    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn check(&self, stage: Stage) -> Result<(), PipelineError> {
        let Some(limit) = self.limit else {
            return Ok(());
        };
        let elapsed = self.started.elapsed();
        if elapsed >= limit {
            return Err(PipelineError::DeadlineExceeded {
                stage,
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }
        Ok(())
    }
}

/// Immutable, reusable sheet reader. Documents share no mutable state, so
/// one pipeline can serve many threads.
pub struct SheetPipeline {
    config: SheetConfig,
    preprocessor: Preprocessor,
    fiducials: FiducialDetector,
    corrector: PerspectiveCorrector,
    answer_regions: Cascade<LocatedRegion>,
    identity_regions: Cascade<IdentityRegions>,
    identity: IdentityDecoder,
    answers: AnswerDecoder,
    observer: Arc<dyn PipelineObserver>,
}

impl Default for SheetPipeline {
    fn default() -> Self {
        Self::new(SheetConfig::default())
    }
}

impl SheetPipeline {
    pub fn new(config: SheetConfig) -> Self {
        Self {
            preprocessor: Preprocessor::new(config.preprocess.clone()),
            fiducials: FiducialDetector::new(config.fiducials.clone()),
            corrector: PerspectiveCorrector::new(config.canonical),
            answer_regions: answer_cascade(&config.answer_region),
            identity_regions: identity_cascade(&config.identity_region),
            identity: IdentityDecoder::new(config.identity.clone()),
            answers: AnswerDecoder::new(config.answers.clone()),
            observer: Arc::new(LogObserver),
            config,
        }
    }

    /// Replace the default [`LogObserver`].
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    /// Read one document. Never panics: failures come back as
    /// `success = false` with the error message and blank answers.
    pub fn process(&self, image: &RasterImage) -> ProcessResult {
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_process(image)));
        let duration_ms = started.elapsed().as_millis() as u64;
        let error = match outcome {
            Ok(Ok(reading)) => return reading.to_result(),
            Ok(Err(e)) => e.to_string(),
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                format!("internal error: {msg}")
            }
        };
        log::warn!("document failed after {duration_ms} ms: {error}");
        self.observer.on_event(&PipelineEvent::Finished {
            duration_ms,
            success: false,
        });
        ProcessResult::failed(self.config.answers.questions(), error, duration_ms)
    }

    /// Read one document, surfacing the fatal error instead of flattening it.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(w = image.width, h = image.height))
    )]
    pub fn try_process(&self, image: &RasterImage) -> Result<SheetReading, PipelineError> {
        let clock = Clock {
            started: Instant::now(),
            limit: self.config.deadline_ms.map(Duration::from_millis),
        };
        let obs = self.observer.as_ref();

        self.enter(Stage::Normalize, &clock)?;
        let gray = image.to_gray()?;
        let mask = self.preprocessor.binarize(&gray);
        self.snapshot("mask", || mask.to_gray());

        self.enter(Stage::PageCorners, &clock)?;
        let corners = self.fiducials.find_page_corners(&mask);
        obs.on_event(&PipelineEvent::MarkersFound {
            family: "page_corners",
            count: corners.len(),
        });

        self.enter(Stage::PageWarp, &clock)?;
        let (page, page_mask, corrected) = self.correct_page(gray, mask, &corners);
        obs.on_event(&PipelineEvent::PageWarped { corrected });
        self.snapshot("page", || page.clone());

        self.enter(Stage::BlockMarkers, &clock)?;
        let blocks = self.fiducials.find_block_markers(&page_mask);
        obs.on_event(&PipelineEvent::MarkersFound {
            family: "block_markers",
            count: blocks.len(),
        });

        let ctx = LocateContext {
            gray: &page,
            mask: &page_mask,
            block_markers: &blocks,
            preprocessor: &self.preprocessor,
            corrector: &self.corrector,
        };

        self.enter(Stage::AnswerRegion, &clock)?;
        let (answer_tier, answer_region) =
            self.answer_regions
                .run(&ctx, obs)
                .ok_or(PipelineError::RegionNotFound {
                    region: RegionKind::Answers,
                })?;
        obs.on_event(&PipelineEvent::RegionLocated {
            region: RegionKind::Answers,
            tier: answer_tier,
            bounds: answer_region.bounds,
        });
        self.snapshot("answer_region", || answer_region.image.clone());

        self.enter(Stage::IdentityRegion, &clock)?;
        let (identity_tier, id_regions) =
            self.identity_regions
                .run(&ctx, obs)
                .ok_or(PipelineError::RegionNotFound {
                    region: RegionKind::Identity,
                })?;
        obs.on_event(&PipelineEvent::RegionLocated {
            region: RegionKind::Identity,
            tier: identity_tier,
            bounds: id_regions.student.bounds.union(&id_regions.test.bounds),
        });
        self.snapshot("student_box", || id_regions.student.image.clone());
        self.snapshot("test_box", || id_regions.test.image.clone());

        self.enter(Stage::IdentityDecode, &clock)?;
        let identity = self.identity.decode(&id_regions, &page_mask, obs);

        self.enter(Stage::AnswerDecode, &clock)?;
        let answers = self.answers.decode(&answer_region, obs);

        self.enter(Stage::Assemble, &clock)?;
        let duration_ms = clock.elapsed_ms();
        log::debug!(
            "student {:?} test {:?}, {} answered, {} ms",
            identity.student_id(),
            identity.test_id(),
            answers.answers.iter().filter(|a| a.is_resolved()).count(),
            duration_ms
        );
        obs.on_event(&PipelineEvent::Finished {
            duration_ms,
            success: true,
        });
        Ok(SheetReading {
            identity,
            answers,
            page_markers_found: corners.len(),
            block_markers_found: blocks.len(),
            page_corrected: corrected,
            answer_tier,
            identity_tier,
            duration_ms,
        })
    }

    fn enter(&self, stage: Stage, clock: &Clock) -> Result<(), PipelineError> {
        clock.check(stage)?;
        log::debug!("stage {stage} at {} ms", clock.elapsed_ms());
        self.observer
            .on_event(&PipelineEvent::StageStarted { stage });
        Ok(())
    }

    fn snapshot(&self, name: &str, image: impl FnOnce() -> GrayImage) {
        if self.observer.wants_snapshots() {
            self.observer.on_snapshot(name, &image());
        }
    }

    /// Canonical page when all four corners were found, otherwise the
    /// original raster.
    fn correct_page(
        &self,
        gray: GrayImage,
        mask: BinaryMask,
        corners: &[omr_fiducial::Fiducial],
    ) -> (GrayImage, BinaryMask, bool) {
        let quad = corner_quad(corners);
        if !quad.is_valid() {
            return (gray, mask, false);
        }
        match self.corrector.correct_to_canonical(&gray.view(), &quad) {
            Ok(rectified) => {
                let page_mask = self.preprocessor.binarize(&rectified.image);
                (rectified.image, page_mask, true)
            }
            Err(e) => {
                log::warn!("page correction failed: {e}");
                (gray, mask, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn pipeline_is_shareable_across_threads() {
        assert_send_sync::<SheetPipeline>();
    }

    #[test]
    fn zero_deadline_stops_before_the_first_stage() {
        let cfg = SheetConfig {
            deadline_ms: Some(0),
            ..SheetConfig::default()
        };
        let img = RasterImage::from_gray(GrayImage::filled(20, 20, 255));
        let err = SheetPipeline::new(cfg).try_process(&img).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DeadlineExceeded {
                stage: Stage::Normalize,
                ..
            }
        ));
    }

    #[test]
    fn empty_image_is_reported_not_raised() {
        let img = RasterImage {
            width: 0,
            height: 0,
            channels: 1,
            data: Vec::new(),
        };
        let r = SheetPipeline::default().process(&img);
        assert!(!r.success);
        assert_eq!(r.answers.len(), 60);
        assert!(r.error.unwrap().contains("zero area"));
    }
}
