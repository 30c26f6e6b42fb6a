//! Per-frame plate reading and the capture/display loop around it.
//!
//! One frame is processed to completion before the next one is pulled from
//! the source. Only the fatal source path stops the loop early; every other
//! failure degrades that frame to "no reading".

use chrono::Local;
use opencv::core::Rect;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use tracing::{debug, error, info, warn};

use super::bounding_box_render::BoundingBoxRender;
use super::capture_sink::CaptureSink;
use super::display::{FramePresenter, PresenterControl};
use super::normalizer::TextNormalizer;
use super::ocr::PlateOcr;
use super::preprocess::RegionPreprocessor;
use super::region_proposer::RegionProposer;
use super::stability::{StabilityTracker, TrackerOutput};
use super::video_reader::FrameSource;
use super::PlateReading;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::metrics;
use crate::utils::FpsCounter;

/// What one frame produced.
#[derive(Clone, Debug)]
pub struct TickReport {
    pub candidates: Vec<Rect>,
    pub reading: Option<PlateReading>,
    pub output: TrackerOutput,
}

pub struct PlatePipeline {
    proposer: RegionProposer,
    preprocessor: RegionPreprocessor,
    ocr: Box<dyn PlateOcr>,
    normalizer: TextNormalizer,
    tracker: StabilityTracker,
    max_ocr_attempts: usize,
}

impl PlatePipeline {
    pub fn new(config: &PipelineConfig, ocr: Box<dyn PlateOcr>) -> Result<Self> {
        Ok(Self {
            proposer: RegionProposer::new(&config.proposer),
            preprocessor: RegionPreprocessor::new(&config.preprocess),
            ocr,
            normalizer: TextNormalizer::new(&config.normalizer)?,
            tracker: StabilityTracker::new(&config.tracker),
            max_ocr_attempts: config.proposer.max_ocr_attempts.unwrap_or(usize::MAX),
        })
    }

    pub fn tracker(&self) -> &StabilityTracker {
        &self.tracker
    }

    pub fn process(&mut self, frame: &Mat) -> TickReport {
        metrics::FRAMES_PROCESSED.inc();

        let candidates = self.proposer.propose(frame).unwrap_or_else(|e| {
            warn!("Region proposal failed: {e}");
            vec![]
        });
        metrics::CANDIDATES_PROPOSED.inc_by(candidates.len() as u64);

        let reading = self.read_first_plate(frame, &candidates);
        if reading.is_some() {
            metrics::TOKENS_ACCEPTED.inc();
        }

        let output = self.tracker.advance(reading.clone());
        if output.newly_confirmed.is_some() {
            metrics::PLATES_CONFIRMED.inc();
        }

        TickReport {
            candidates,
            reading,
            output,
        }
    }

    /// OCRs candidates in order and keeps the first valid token.
    fn read_first_plate(&mut self, frame: &Mat, candidates: &[Rect]) -> Option<PlateReading> {
        for rect in candidates.iter().take(self.max_ocr_attempts) {
            match self.read_region(frame, *rect) {
                Ok(Some(plate)) => {
                    debug!("Read {plate} at {rect:?}");
                    return Some(PlateReading::new(plate, *rect));
                }
                Ok(None) => {}
                Err(e) => warn!("Cannot read region {rect:?}: {e}"),
            }
        }
        None
    }

    fn read_region(&mut self, frame: &Mat, rect: Rect) -> Result<Option<String>> {
        let region = Mat::roi(frame, rect)?.try_clone()?;
        let binary = self.preprocessor.preprocess(&region)?;

        let raw = match self.ocr.read_text(&binary) {
            Ok(raw) => raw,
            Err(e) => {
                metrics::OCR_FAILURES.inc();
                warn!("{e}");
                return Ok(None);
            }
        };

        let token = self.normalizer.normalize(&raw);
        if token.is_none() && !raw.is_empty() {
            debug!("Discarded OCR text {raw:?}");
        }
        Ok(token)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    EndOfStream,
    SourceFailed,
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub ticks: u64,
    /// Plates in the order they were confirmed.
    pub plates: Vec<String>,
    pub stop_reason: StopReason,
}

/// Pulls frames, reads plates, archives new confirmations and shows the result.
pub struct PlateReaderLoop {
    pipeline: PlatePipeline,
    source: Box<dyn FrameSource>,
    render: BoundingBoxRender,
    presenter: Box<dyn FramePresenter>,
    capture: Option<Box<dyn CaptureSink>>,
    fps: FpsCounter,
}

impl PlateReaderLoop {
    pub fn new(
        pipeline: PlatePipeline,
        source: Box<dyn FrameSource>,
        render: BoundingBoxRender,
        presenter: Box<dyn FramePresenter>,
        capture: Option<Box<dyn CaptureSink>>,
    ) -> Self {
        Self {
            pipeline,
            source,
            render,
            presenter,
            capture,
            fps: FpsCounter::default(),
        }
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        let mut ticks = 0;
        let mut plates = vec![];

        let stop_reason = loop {
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Video stream ended");
                    break StopReason::EndOfStream;
                }
                Err(e) => {
                    error!("Cannot read frame: {e}");
                    break StopReason::SourceFailed;
                }
            };
            ticks += 1;

            let report = self.pipeline.process(&frame);
            if let Some(plate) = &report.output.newly_confirmed {
                plates.push(plate.clone());
                self.archive(&frame, plate);
            }

            // The archived copy is written above, draw on the frame itself now.
            let mut annotated = frame;
            let fps = self.fps.tick();
            self.render.render(&mut annotated, &report.output, fps)?;

            if self.presenter.present(&annotated)? == PresenterControl::Stop {
                break StopReason::Cancelled;
            }
        };

        info!(
            "Stopped after {ticks} frames ({stop_reason:?}), {} plates confirmed",
            plates.len()
        );
        Ok(RunSummary {
            ticks,
            plates,
            stop_reason,
        })
    }

    fn archive(&mut self, frame: &Mat, plate: &str) {
        let Some(sink) = self.capture.as_mut() else {
            return;
        };

        match sink.persist(frame, plate, Local::now()) {
            Ok(_) => metrics::CAPTURES_WRITTEN.inc(),
            Err(e) => {
                metrics::CAPTURE_FAILURES.inc();
                error!("Capture of {plate} failed: {e}");
            }
        }
    }
}
