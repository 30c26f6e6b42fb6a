pub mod bounding_box_render;
pub mod capture_sink;
pub mod display;
pub mod normalizer;
pub mod ocr;
pub mod pipeline;
pub mod preprocess;
pub mod region_proposer;
pub mod rtp_sink;
pub mod stability;
pub mod video_reader;

use opencv::core::Rect;

/// A normalized plate token and the frame region it was read from.
#[derive(Clone, Debug, PartialEq)]
pub struct PlateReading {
    pub plate: String,
    pub region: Rect,
}

impl PlateReading {
    pub fn new(plate: impl Into<String>, region: Rect) -> Self {
        Self {
            plate: plate.into(),
            region,
        }
    }
}
