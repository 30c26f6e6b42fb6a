use opencv::core::Point;
use opencv::core::Size;
use opencv::core::BORDER_CONSTANT;
use opencv::core::BORDER_DEFAULT;
use opencv::imgproc::bilateral_filter;
use opencv::imgproc::create_clahe;
use opencv::imgproc::cvt_color;
use opencv::imgproc::get_structuring_element;
use opencv::imgproc::morphology_default_border_value;
use opencv::imgproc::morphology_ex;
use opencv::imgproc::threshold;
use opencv::imgproc::COLOR_BGR2GRAY;
use opencv::imgproc::MORPH_CLOSE;
use opencv::imgproc::MORPH_RECT;
use opencv::imgproc::THRESH_BINARY;
use opencv::imgproc::THRESH_OTSU;
use opencv::prelude::*;

use crate::config::PreprocessConfig;
use crate::error::Result;

/// Turns a greyscale plate crop into a clean black and white text line.
///
/// Stages, in order: CLAHE to even out lighting across the plate, a
/// bilateral filter to remove speckle while keeping character edges, Otsu
/// binarization, and a small morphological close to mend broken strokes.
pub struct RegionPreprocessor {
    config: PreprocessConfig,
}

impl RegionPreprocessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn preprocess(&self, region: &Mat) -> Result<Mat> {
        let grey = if region.channels() == 1 {
            region.try_clone()?
        } else {
            let mut grey = Mat::default();
            cvt_color(region, &mut grey, COLOR_BGR2GRAY, 0)?;
            grey
        };

        let tiles = self.config.clahe_tile_grid;
        let mut clahe = create_clahe(self.config.clahe_clip_limit, Size::new(tiles, tiles))?;
        let mut equalized = Mat::default();
        clahe.apply(&grey, &mut equalized)?;

        let mut smoothed = Mat::default();
        bilateral_filter(
            &equalized,
            &mut smoothed,
            self.config.bilateral_diameter,
            self.config.bilateral_sigma_color,
            self.config.bilateral_sigma_space,
            BORDER_DEFAULT,
        )?;

        let mut binary = Mat::default();
        threshold(&smoothed, &mut binary, 0.0, 255.0, THRESH_BINARY | THRESH_OTSU)?;

        let size = self.config.close_kernel;
        let kernel = get_structuring_element(MORPH_RECT, Size::new(size, size), Point::new(-1, -1))?;
        let mut closed = Mat::default();
        morphology_ex(
            &binary,
            &mut closed,
            MORPH_CLOSE,
            &kernel,
            Point::new(-1, -1),
            1,
            BORDER_CONSTANT,
            morphology_default_border_value()?,
        )?;

        Ok(closed)
    }
}
