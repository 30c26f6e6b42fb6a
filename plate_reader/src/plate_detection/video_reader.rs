use std::path::PathBuf;

use opencv::core::Size;
use opencv::imgproc::resize;
use opencv::imgproc::INTER_LINEAR;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use opencv::prelude::VideoCaptureTrait;
use opencv::prelude::VideoCaptureTraitConst;
use opencv::videoio::VideoCapture;
use opencv::videoio::CAP_ANY;
use opencv::videoio::CAP_PROP_FRAME_HEIGHT;
use opencv::videoio::CAP_PROP_FRAME_WIDTH;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::error::{PlateError, Result};
use crate::utils::FpsLimiter;

/// Produces the frames the pipeline works on.
pub trait FrameSource {
    /// The next frame, `Ok(None)` once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Mat>>;
}

enum Input {
    Device(i32),
    File(PathBuf),
}

/// Frames from a camera or a video file through OpenCV.
pub struct VideoReader {
    capture: VideoCapture,
    input: Input,
    size: Size,
    fps_limiter: Option<FpsLimiter>,
    do_loop: bool,
    frames: u64,
}

fn open(input: &Input, size: Size) -> Result<VideoCapture> {
    let mut capture = match input {
        Input::Device(index) => VideoCapture::new(*index, CAP_ANY)?,
        Input::File(path) => VideoCapture::from_file(&path.to_string_lossy(), CAP_ANY)?,
    };
    if !capture.is_opened()? {
        let what = match input {
            Input::Device(index) => format!("cannot open video device {index}"),
            Input::File(path) => format!("cannot open video file {}", path.display()),
        };
        return Err(PlateError::SourceUnavailable(what));
    }

    if let Input::Device(_) = input {
        // The backend may ignore these, frames are resized on read when it does.
        capture.set(CAP_PROP_FRAME_WIDTH, size.width as f64)?;
        capture.set(CAP_PROP_FRAME_HEIGHT, size.height as f64)?;
    }
    Ok(capture)
}

impl VideoReader {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let input = match &config.file {
            Some(path) => Input::File(path.clone()),
            None => Input::Device(config.device_index),
        };
        let size = Size::new(config.width, config.height);
        let capture = open(&input, size)?;

        match &input {
            Input::Device(index) => info!("Opened video device {index}"),
            Input::File(path) => info!("Opened video file {}", path.display()),
        }

        Ok(Self {
            capture,
            input,
            size,
            fps_limiter: config.max_fps.map(FpsLimiter::new),
            do_loop: config.loop_file,
            frames: 0,
        })
    }

    fn grab(&mut self) -> Result<Option<Mat>> {
        let mut image = Mat::default();
        let grabbed = self.capture.read(&mut image)?;
        if grabbed && !image.empty() {
            return Ok(Some(image));
        }

        if self.do_loop && matches!(self.input, Input::File(_)) {
            debug!("End of file after {} frames, looping", self.frames);
            self.capture = open(&self.input, self.size)?;
            let grabbed = self.capture.read(&mut image)?;
            if grabbed && !image.empty() {
                return Ok(Some(image));
            }
        }
        Ok(None)
    }
}

impl FrameSource for VideoReader {
    fn next_frame(&mut self) -> Result<Option<Mat>> {
        let image = match self.grab()? {
            Some(image) => image,
            None => return Ok(None),
        };

        let image = if image.cols() != self.size.width || image.rows() != self.size.height {
            let mut image_resized = Mat::default();
            resize(&image, &mut image_resized, self.size, 0.0, 0.0, INTER_LINEAR)?;
            image_resized
        } else {
            image
        };

        if let Some(limiter) = self.fps_limiter.as_mut() {
            limiter.wait();
        }

        self.frames += 1;
        Ok(Some(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Scalar;
    use opencv::core::CV_8UC3;
    use opencv::videoio::VideoWriter;
    use opencv::videoio::VideoWriterTrait;

    fn write_clip(path: &std::path::Path, frames: usize) {
        let mut writer = VideoWriter::new(
            &path.to_string_lossy(),
            VideoWriter::fourcc('M', 'J', 'P', 'G').unwrap(),
            10.0,
            Size::new(320, 240),
            true,
        )
        .unwrap();
        for i in 0..frames {
            let frame = Mat::new_rows_cols_with_default(
                240,
                320,
                CV_8UC3,
                Scalar::all(40.0 * i as f64),
            )
            .unwrap();
            writer.write(&frame).unwrap();
        }
        writer.release().unwrap();
    }

    fn file_config(path: &std::path::Path, loop_file: bool) -> SourceConfig {
        SourceConfig {
            file: Some(path.to_path_buf()),
            loop_file,
            ..SourceConfig::default()
        }
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir.path().join("missing.avi"), false);
        assert!(matches!(
            VideoReader::new(&config),
            Err(PlateError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn reads_file_frames_at_target_size_until_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.avi");
        write_clip(&clip, 3);

        let mut reader = VideoReader::new(&file_config(&clip, false)).unwrap();
        for _ in 0..3 {
            let frame = reader.next_frame().unwrap().unwrap();
            assert_eq!(frame.cols(), 640);
            assert_eq!(frame.rows(), 480);
        }
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn looping_restarts_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.avi");
        write_clip(&clip, 2);

        let mut reader = VideoReader::new(&file_config(&clip, true)).unwrap();
        for _ in 0..5 {
            assert!(reader.next_frame().unwrap().is_some());
        }
    }
}
