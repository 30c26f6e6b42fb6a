use std::path::Path;

use opencv::core::Point;
use opencv::core::Rect;
use opencv::core::Scalar;
use opencv::core::Size;
use opencv::imgproc::put_text;
use opencv::imgproc::FONT_HERSHEY_SIMPLEX;
use opencv::imgproc::LINE_8;
use opencv::imgproc::{rectangle, LineTypes};
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use opencv::videoio::VideoWriter;
use opencv::videoio::VideoWriterTrait;
use opencv::videoio::VideoWriterTraitConst;
use tracing::{debug, info};

use super::stability::TrackerOutput;
use crate::error::{PlateError, Result};

const NO_PLATE_BANNER: &str = "No plate detected";

/// Draws the tracker result on top of the frame and optionally records the
/// annotated stream.
pub struct BoundingBoxRender {
    writer: Option<VideoWriter>,
}

impl BoundingBoxRender {
    pub fn with_save_to_file(path: &Path, fps: f64, size: Size) -> Result<Self> {
        let writer = VideoWriter::new(
            &path.to_string_lossy(),
            VideoWriter::fourcc('M', 'J', 'P', 'G')?,
            fps,
            size,
            true,
        )?;
        if !writer.is_opened()? {
            return Err(PlateError::Display(format!(
                "cannot open video writer {}",
                path.display()
            )));
        }

        info!("Recording annotated video to {}", path.display());
        Ok(Self {
            writer: Some(writer),
        })
    }

    pub fn default() -> Self {
        Self { writer: None }
    }

    pub fn render(&mut self, image: &mut Mat, output: &TrackerOutput, fps: Option<f64>) -> Result<()> {
        let green = Scalar::from((0.0, 255.0, 0.0));
        let red = Scalar::from((0.0, 0.0, 255.0));
        let cyan = Scalar::from((255.0, 255.0, 0.0));
        let thikness_px = 2;

        match (&output.confirmed, output.region) {
            (Some(plate), Some(region)) => draw_plate(image, plate, region, green, thikness_px)?,
            (None, _) => {
                put_text(
                    image,
                    NO_PLATE_BANNER,
                    Point::new(10, 30),
                    FONT_HERSHEY_SIMPLEX,
                    0.7,
                    red,
                    thikness_px,
                    LINE_8,
                    false,
                )?;
            }
            // Confirmed plate kept from earlier frames, nothing to box on this one.
            (Some(_), None) => {}
        }

        if let Some(fps) = fps {
            put_text(
                image,
                &format!("FPS: {}", fps as i32),
                Point::new(10, image.rows() - 10),
                FONT_HERSHEY_SIMPLEX,
                0.6,
                cyan,
                thikness_px,
                LINE_8,
                false,
            )?;
        }

        if let Some(writer) = self.writer.as_mut() {
            writer.write(&*image)?;
        }
        Ok(())
    }
}

fn draw_plate(image: &mut Mat, plate: &str, region: Rect, color: Scalar, thikness_px: i32) -> Result<()> {
    rectangle(
        image,
        region,
        color,
        thikness_px,
        LineTypes::LINE_4 as i32,
        0,
    )?;
    // Label above the box, or inside it when the box touches the top.
    let label_y = if region.y > 20 { region.y - 10 } else { region.y + 20 };
    put_text(
        image,
        plate,
        Point::new(region.x, label_y),
        FONT_HERSHEY_SIMPLEX,
        0.9,
        color,
        thikness_px,
        LINE_8,
        false,
    )?;
    Ok(())
}

impl Drop for BoundingBoxRender {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            debug!("Closing annotated video");
            let _ = writer.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate_detection::stability::TrackerState;
    use opencv::core::Vec3b;
    use opencv::core::CV_8UC3;

    fn frame() -> Mat {
        Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn output(confirmed: Option<&str>, region: Option<Rect>) -> TrackerOutput {
        TrackerOutput {
            state: if confirmed.is_some() {
                TrackerState::Confirmed
            } else {
                TrackerState::Idle
            },
            confirmed: confirmed.map(str::to_string),
            region,
            newly_confirmed: None,
        }
    }

    #[test]
    fn boxes_a_confirmed_plate_in_green() {
        let mut image = frame();
        let region = Rect::new(100, 200, 160, 40);
        BoundingBoxRender::default()
            .render(&mut image, &output(Some("ABC1234"), Some(region)), None)
            .unwrap();

        let top_edge = image.at_2d::<Vec3b>(200, 180).unwrap();
        assert_eq!(top_edge.0, [0, 255, 0]);
    }

    #[test]
    fn banner_when_nothing_confirmed() {
        let mut image = frame();
        BoundingBoxRender::default()
            .render(&mut image, &output(None, None), Some(30.0))
            .unwrap();

        let mut red_pixels = 0;
        for row in 10..35 {
            for col in 10..250 {
                let px = image.at_2d::<Vec3b>(row, col).unwrap();
                if px.0 == [0, 0, 255] {
                    red_pixels += 1;
                }
            }
        }
        assert!(red_pixels > 0);
    }

    #[test]
    fn held_confirmation_without_region_draws_nothing() {
        let mut image = frame();
        BoundingBoxRender::default()
            .render(&mut image, &output(Some("ABC1234"), None), None)
            .unwrap();

        let mut grey = Mat::default();
        opencv::imgproc::cvt_color(&image, &mut grey, opencv::imgproc::COLOR_BGR2GRAY, 0).unwrap();
        assert_eq!(opencv::core::count_non_zero(&grey).unwrap(), 0);
    }
}
