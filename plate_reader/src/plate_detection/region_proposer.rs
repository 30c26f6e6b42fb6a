use opencv::core::Point;
use opencv::core::Rect;
use opencv::core::Size;
use opencv::core::Vector;
use opencv::core::BORDER_DEFAULT;
use opencv::imgproc::approx_poly_dp;
use opencv::imgproc::arc_length;
use opencv::imgproc::bounding_rect;
use opencv::imgproc::canny;
use opencv::imgproc::cvt_color;
use opencv::imgproc::find_contours;
use opencv::imgproc::gaussian_blur;
use opencv::imgproc::CHAIN_APPROX_SIMPLE;
use opencv::imgproc::COLOR_BGR2GRAY;
use opencv::imgproc::RETR_LIST;
use opencv::imgproc::RETR_TREE;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use tracing::trace;

use crate::config::ContourRetrieval;
use crate::config::ProposerConfig;
use crate::error::Result;

/// Geometric acceptance test for plate-shaped rectangles.
#[derive(Clone, Debug)]
pub struct RegionFilter {
    min_width: i32,
    min_height: i32,
    min_aspect: f64,
    max_aspect: f64,
    edge_margin: i32,
}

impl RegionFilter {
    pub fn new(config: &ProposerConfig) -> Self {
        Self {
            min_width: config.min_width,
            min_height: config.min_height,
            min_aspect: config.min_aspect,
            max_aspect: config.max_aspect,
            edge_margin: config.edge_margin,
        }
    }

    /// True when `rect` is big enough, wide enough, and keeps `edge_margin`
    /// pixels away from every border of a frame of size `frame`.
    pub fn accepts(&self, rect: Rect, frame: Size) -> bool {
        if rect.width < self.min_width || rect.height < self.min_height || rect.height <= 0 {
            return false;
        }

        let ratio = rect.width as f64 / rect.height as f64;
        if ratio <= self.min_aspect || ratio >= self.max_aspect {
            return false;
        }

        let margin = self.edge_margin;
        rect.x >= margin
            && rect.y >= margin
            && rect.x + rect.width <= frame.width - margin
            && rect.y + rect.height <= frame.height - margin
    }
}

/// Finds rectangle-like contours that could hold a licence plate.
pub struct RegionProposer {
    filter: RegionFilter,
    blur_kernel: i32,
    canny_low: f64,
    canny_high: f64,
    approx_epsilon: f64,
    retrieval: i32,
}

impl RegionProposer {
    pub fn new(config: &ProposerConfig) -> Self {
        let retrieval = match config.retrieval {
            ContourRetrieval::Tree => RETR_TREE,
            ContourRetrieval::List => RETR_LIST,
        };

        Self {
            filter: RegionFilter::new(config),
            blur_kernel: config.blur_kernel,
            canny_low: config.canny_low,
            canny_high: config.canny_high,
            approx_epsilon: config.approx_epsilon,
            retrieval,
        }
    }

    pub fn filter(&self) -> &RegionFilter {
        &self.filter
    }

    /// Candidate regions of `frame`, largest first. Nested contours that
    /// bound the same rectangle are reported once.
    pub fn propose(&self, frame: &Mat) -> Result<Vec<Rect>> {
        let grey = if frame.channels() == 1 {
            frame.try_clone()?
        } else {
            let mut grey = Mat::default();
            cvt_color(frame, &mut grey, COLOR_BGR2GRAY, 0)?;
            grey
        };

        let mut blurred = Mat::default();
        gaussian_blur(
            &grey,
            &mut blurred,
            Size::new(self.blur_kernel, self.blur_kernel),
            0.0,
            0.0,
            BORDER_DEFAULT,
        )?;

        let mut edges = Mat::default();
        canny(&blurred, &mut edges, self.canny_low, self.canny_high, 3, false)?;

        let mut contours = Vector::<Vector<Point>>::new();
        find_contours(
            &edges,
            &mut contours,
            self.retrieval,
            CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )?;

        let frame_size = Size::new(frame.cols(), frame.rows());
        let mut candidates = Vec::new();
        for contour in contours.iter() {
            let perimeter = arc_length(&contour, true)?;
            let mut approx = Vector::<Point>::new();
            approx_poly_dp(&contour, &mut approx, self.approx_epsilon * perimeter, true)?;
            if approx.len() != 4 {
                continue;
            }

            let rect = bounding_rect(&approx)?;
            if self.filter.accepts(rect, frame_size) {
                candidates.push(rect);
            }
        }

        candidates.sort_by(|a, b| {
            area(b)
                .cmp(&area(a))
                .then(a.y.cmp(&b.y))
                .then(a.x.cmp(&b.x))
                .then(a.width.cmp(&b.width))
        });
        candidates.dedup();

        trace!(
            "{} contours, {} plate candidates",
            contours.len(),
            candidates.len()
        );
        Ok(candidates)
    }
}

fn area(rect: &Rect) -> i64 {
    rect.width as i64 * rect.height as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Scalar;
    use opencv::core::CV_8UC3;
    use opencv::imgproc::rectangle;
    use opencv::imgproc::LINE_8;

    fn filter() -> RegionFilter {
        RegionFilter::new(&ProposerConfig::default())
    }

    fn frame_size() -> Size {
        Size::new(640, 480)
    }

    fn blank_frame() -> Mat {
        Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn draw_plate(frame: &mut Mat, rect: Rect) {
        rectangle(frame, rect, Scalar::all(255.0), -1, LINE_8, 0).unwrap();
    }

    fn near(a: &Rect, b: &Rect) -> bool {
        (a.x - b.x).abs() <= 3
            && (a.y - b.y).abs() <= 3
            && (a.width - b.width).abs() <= 6
            && (a.height - b.height).abs() <= 6
    }

    #[test]
    fn minimum_size_bounds() {
        let f = filter();
        assert!(f.accepts(Rect::new(100, 100, 60, 15), frame_size()));
        assert!(!f.accepts(Rect::new(100, 100, 59, 15), frame_size()));
        assert!(!f.accepts(Rect::new(100, 100, 60, 14), frame_size()));
    }

    #[test]
    fn aspect_ratio_is_an_open_interval() {
        let f = filter();
        assert!(!f.accepts(Rect::new(100, 100, 60, 30), frame_size()));
        assert!(f.accepts(Rect::new(100, 100, 61, 30), frame_size()));
        assert!(!f.accepts(Rect::new(100, 100, 130, 20), frame_size()));
        assert!(f.accepts(Rect::new(100, 100, 129, 20), frame_size()));
    }

    #[test]
    fn edge_margin_on_every_side() {
        let f = filter();
        assert!(f.accepts(Rect::new(5, 100, 120, 40), frame_size()));
        assert!(!f.accepts(Rect::new(4, 100, 120, 40), frame_size()));
        assert!(f.accepts(Rect::new(100, 5, 120, 40), frame_size()));
        assert!(!f.accepts(Rect::new(100, 4, 120, 40), frame_size()));
        assert!(f.accepts(Rect::new(515, 100, 120, 40), frame_size()));
        assert!(!f.accepts(Rect::new(516, 100, 120, 40), frame_size()));
        assert!(f.accepts(Rect::new(100, 435, 120, 40), frame_size()));
        assert!(!f.accepts(Rect::new(100, 436, 120, 40), frame_size()));
    }

    #[test]
    fn blank_frame_has_no_candidates() {
        let proposer = RegionProposer::new(&ProposerConfig::default());
        assert!(proposer.propose(&blank_frame()).unwrap().is_empty());
    }

    #[test]
    fn finds_a_plate_shaped_rectangle() {
        let proposer = RegionProposer::new(&ProposerConfig::default());
        let plate = Rect::new(200, 200, 200, 50);
        let mut frame = blank_frame();
        draw_plate(&mut frame, plate);

        let candidates = proposer.propose(&frame).unwrap();
        assert!(!candidates.is_empty());
        assert!(candidates.iter().any(|c| near(c, &plate)), "{candidates:?}");
    }

    #[test]
    fn ignores_small_square_and_border_shapes() {
        let proposer = RegionProposer::new(&ProposerConfig::default());
        let mut frame = blank_frame();
        draw_plate(&mut frame, Rect::new(100, 100, 40, 10));
        draw_plate(&mut frame, Rect::new(300, 100, 100, 100));
        draw_plate(&mut frame, Rect::new(0, 300, 200, 50));

        assert!(proposer.propose(&frame).unwrap().is_empty());
    }

    #[test]
    fn larger_candidates_come_first() {
        let proposer = RegionProposer::new(&ProposerConfig::default());
        let small = Rect::new(100, 300, 150, 40);
        let large = Rect::new(50, 50, 300, 80);
        let mut frame = blank_frame();
        draw_plate(&mut frame, small);
        draw_plate(&mut frame, large);

        let candidates = proposer.propose(&frame).unwrap();
        assert!(near(&candidates[0], &large), "{candidates:?}");
        assert!(candidates.iter().any(|c| near(c, &small)));
    }

    #[test]
    fn grayscale_frames_are_accepted() {
        let proposer = RegionProposer::new(&ProposerConfig::default());
        let mut frame = blank_frame();
        let plate = Rect::new(200, 200, 200, 50);
        draw_plate(&mut frame, plate);
        let mut grey = Mat::default();
        cvt_color(&frame, &mut grey, COLOR_BGR2GRAY, 0).unwrap();

        let candidates = proposer.propose(&grey).unwrap();
        assert!(candidates.iter().any(|c| near(c, &plate)));
    }
}
