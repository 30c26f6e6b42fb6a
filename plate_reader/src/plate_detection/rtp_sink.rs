use gstreamer::parse_launch;
use gstreamer::prelude::Cast;
use gstreamer::prelude::ElementExt;
use gstreamer::prelude::GstBinExt;
use gstreamer::prelude::MulDiv;
use gstreamer::Buffer;
use gstreamer::Caps;
use gstreamer::ClockTime;
use gstreamer_app::AppSrc;
use gstreamer_video::VideoCapsBuilder;
use gstreamer_video::VideoFormat;
use opencv::core::Size;
use opencv::imgproc::resize;
use opencv::imgproc::INTER_LINEAR;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use opencv::prelude::MatTraitConstManual;
use tracing::{info, trace, warn};

use super::display::{FramePresenter, PresenterControl};
use crate::error::{PlateError, Result};

/// Streams the annotated frames as H.264 over RTP.
pub struct RtpSink {
    pipeline: gstreamer::Pipeline,
    app_src: AppSrc,
    size: Size,
    frame_duration: ClockTime,
    frames: u64,
}

pub fn create_caps(width: i32, height: i32, fps: i32) -> Caps {
    VideoCapsBuilder::new()
        .width(width)
        .height(height)
        .framerate(gstreamer::Fraction::new(fps, 1))
        .format(VideoFormat::Bgr)
        .build()
}

impl RtpSink {
    pub fn new(fps: u32, host: &str, port: u16, size: Size) -> Result<Self> {
        gstreamer::init().map_err(|e| PlateError::Display(e.to_string()))?;

        let pipeline_str = format!(
            "appsrc name=frames ! videoconvert ! x264enc tune=zerolatency bitrate=500 speed-preset=superfast ! rtph264pay ! udpsink host={host} port={port}"
        );
        let pipeline = parse_launch(&pipeline_str)
            .map_err(|e| PlateError::Display(format!("cannot create pipeline {pipeline_str}: {e}")))?
            .dynamic_cast::<gstreamer::Pipeline>()
            .map_err(|_| PlateError::Display("launch line is not a pipeline".to_string()))?;

        let app_src = pipeline
            .by_name("frames")
            .and_then(|element| element.dynamic_cast::<AppSrc>().ok())
            .ok_or_else(|| PlateError::Display("cannot find AppSrc".to_string()))?;

        let fps = fps.max(1);
        app_src.set_caps(Some(&create_caps(size.width, size.height, fps as i32)));
        app_src.set_format(gstreamer::Format::Time);

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| PlateError::Display(format!("cannot start RTP pipeline: {e}")))?;

        let frame_duration = ClockTime::SECOND
            .mul_div_floor(1, fps as u64)
            .unwrap_or(ClockTime::ZERO);

        info!("Streaming RTP to {host}:{port}");
        Ok(Self {
            pipeline,
            app_src,
            size,
            frame_duration,
            frames: 0,
        })
    }
}

impl FramePresenter for RtpSink {
    fn present(&mut self, frame: &Mat) -> Result<PresenterControl> {
        let mut resized = Mat::default();
        let image = if frame.cols() == self.size.width && frame.rows() == self.size.height {
            frame
        } else {
            resize(frame, &mut resized, self.size, 0.0, 0.0, INTER_LINEAR)?;
            &resized
        };

        let mut buffer = Buffer::from_mut_slice(image.data_bytes()?.to_vec());
        let pts = self.frame_duration * self.frames;
        if let Some(buffer) = buffer.get_mut() {
            buffer.set_duration(self.frame_duration);
            buffer.set_pts(pts);
            buffer.set_dts(pts);
        }

        if let Err(e) = self.app_src.push_buffer(buffer) {
            // The stream went away, keep reading plates anyway.
            warn!("Cannot push frame to RTP stream: {e:?}");
        } else {
            trace!("RTP frame {}", self.frames);
        }
        self.frames += 1;
        Ok(PresenterControl::Continue)
    }
}

impl Drop for RtpSink {
    fn drop(&mut self) {
        let _ = self.app_src.end_of_stream();
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}
