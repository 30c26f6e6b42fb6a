//! Cross-frame debouncing of plate readings.
//!
//! A single OCR pass is noisy: characters get substituted and plates are
//! partly occluded. The tracker only promotes a token once the same reading
//! has been seen on `confirm_threshold` consecutive frames, and reports each
//! newly confirmed plate once so it can be archived.

use opencv::core::Rect;
use tracing::{debug, info};

use super::PlateReading;
use crate::config::TrackerConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerState {
    /// No recent reading.
    Idle,
    /// A reading is recurring but has not reached the threshold yet.
    Accumulating,
    /// The last reading recurred on at least `confirm_threshold` frames.
    Confirmed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackerOutput {
    pub state: TrackerState,
    /// Currently confirmed plate, if any.
    pub confirmed: Option<String>,
    /// Region the plate was read from on this frame.
    pub region: Option<Rect>,
    /// Set on the frame a plate different from the last archived one gets confirmed.
    pub newly_confirmed: Option<String>,
}

pub struct StabilityTracker {
    confirm_threshold: u32,
    miss_tolerance: u32,
    state: TrackerState,
    last_token: Option<String>,
    repeat_count: u32,
    missed_ticks: u32,
    confirmed_token: Option<String>,
    last_persisted_token: Option<String>,
}

impl StabilityTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            confirm_threshold: config.confirm_threshold.max(1),
            miss_tolerance: config.miss_tolerance,
            state: TrackerState::Idle,
            last_token: None,
            repeat_count: 0,
            missed_ticks: 0,
            confirmed_token: None,
            last_persisted_token: None,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    pub fn confirmed(&self) -> Option<&str> {
        self.confirmed_token.as_deref()
    }

    pub fn last_persisted(&self) -> Option<&str> {
        self.last_persisted_token.as_deref()
    }

    /// Feeds the reading of one frame, `None` when the frame produced no valid token.
    pub fn advance(&mut self, reading: Option<PlateReading>) -> TrackerOutput {
        let region = match reading {
            None => {
                self.missed_ticks += 1;
                if self.missed_ticks > self.miss_tolerance {
                    self.reset();
                }
                None
            }
            Some(PlateReading { plate, region }) => {
                self.missed_ticks = 0;
                if self.last_token.as_deref() == Some(plate.as_str()) {
                    self.repeat_count += 1;
                } else {
                    self.repeat_count = 1;
                    self.last_token = Some(plate.clone());
                }

                if self.repeat_count >= self.confirm_threshold {
                    self.confirmed_token = Some(plate);
                    self.state = TrackerState::Confirmed;
                } else {
                    self.state = TrackerState::Accumulating;
                }
                Some(region)
            }
        };

        let mut newly_confirmed = None;
        if let Some(confirmed) = &self.confirmed_token {
            if self.last_persisted_token.as_ref() != Some(confirmed) {
                info!("Confirmed plate {confirmed}");
                self.last_persisted_token = Some(confirmed.clone());
                newly_confirmed = Some(confirmed.clone());
            }
        }

        debug!(
            "Tracker {:?}, last {:?} x{}, confirmed {:?}",
            self.state, self.last_token, self.repeat_count, self.confirmed_token
        );

        TrackerOutput {
            state: self.state,
            confirmed: self.confirmed_token.clone(),
            region,
            newly_confirmed,
        }
    }

    fn reset(&mut self) {
        self.state = TrackerState::Idle;
        self.last_token = None;
        self.repeat_count = 0;
        self.confirmed_token = None;
    }
}
