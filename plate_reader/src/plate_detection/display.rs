use opencv::highgui::destroy_window;
use opencv::highgui::imshow;
use opencv::highgui::named_window;
use opencv::highgui::wait_key;
use opencv::highgui::WINDOW_AUTOSIZE;
use opencv::prelude::Mat;
use tracing::info;

use crate::error::Result;

const ESC_KEY: i32 = 27;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenterControl {
    Continue,
    Stop,
}

/// Shows an annotated frame. Returning [`PresenterControl::Stop`] ends the run.
pub trait FramePresenter {
    fn present(&mut self, frame: &Mat) -> Result<PresenterControl>;
}

/// Local HighGUI window; ESC stops the run.
pub struct HighGuiWindow {
    title: String,
}

impl HighGuiWindow {
    pub fn new(title: &str) -> Result<Self> {
        named_window(title, WINDOW_AUTOSIZE)?;
        info!("Press ESC in the video window to quit");
        Ok(Self {
            title: title.to_string(),
        })
    }
}

impl FramePresenter for HighGuiWindow {
    fn present(&mut self, frame: &Mat) -> Result<PresenterControl> {
        imshow(&self.title, frame)?;
        let key = wait_key(1)? & 0xFF;
        if key == ESC_KEY {
            info!("ESC pressed, stopping");
            return Ok(PresenterControl::Stop);
        }
        Ok(PresenterControl::Continue)
    }
}

impl Drop for HighGuiWindow {
    fn drop(&mut self) {
        let _ = destroy_window(&self.title);
    }
}

/// Discards frames, for runs without a screen.
#[derive(Default)]
pub struct Headless {}

impl FramePresenter for Headless {
    fn present(&mut self, _frame: &Mat) -> Result<PresenterControl> {
        Ok(PresenterControl::Continue)
    }
}
