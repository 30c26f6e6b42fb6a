use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use opencv::core::Size;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use plate_reader::config::{DisplayMode, PipelineConfig};
use plate_reader::metrics;
use plate_reader::plate_detection::bounding_box_render::BoundingBoxRender;
use plate_reader::plate_detection::capture_sink::{CaptureSink, DiskCaptureSink};
use plate_reader::plate_detection::display::{FramePresenter, Headless, HighGuiWindow};
use plate_reader::plate_detection::ocr::TesseractOcr;
use plate_reader::plate_detection::pipeline::{PlatePipeline, PlateReaderLoop};
use plate_reader::plate_detection::rtp_sink::RtpSink;
use plate_reader::plate_detection::video_reader::VideoReader;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DisplayArg {
    Window,
    Rtp,
    Headless,
}

impl From<DisplayArg> for DisplayMode {
    fn from(arg: DisplayArg) -> Self {
        match arg {
            DisplayArg::Window => DisplayMode::Window,
            DisplayArg::Rtp => DisplayMode::Rtp,
            DisplayArg::Headless => DisplayMode::Headless,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "plates_realtime", about = "Reads licence plates from a live video stream")]
struct Args {
    /// JSON configuration file. Flags below override its values.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long)]
    device: Option<i32>,
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
    #[arg(long)]
    width: Option<i32>,
    #[arg(long)]
    height: Option<i32>,
    #[arg(long, value_enum)]
    display: Option<DisplayArg>,
    #[arg(long)]
    rtp_host: Option<String>,
    #[arg(long)]
    rtp_port: Option<u16>,
    /// Also write the annotated video to this file.
    #[arg(long, value_name = "PATH")]
    record: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    capture_dir: Option<PathBuf>,
    #[arg(long)]
    no_capture: bool,
    #[arg(long)]
    confirm_threshold: Option<u32>,
    /// Empty frames tolerated before a reading is dropped.
    #[arg(long)]
    miss_tolerance: Option<u32>,
    /// Tesseract data directory.
    #[arg(long, value_name = "DIR")]
    tessdata: Option<String>,
    #[arg(long)]
    language: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("cannot load configuration {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(device) = self.device {
            config.source.device_index = device;
        }
        if self.file.is_some() {
            config.source.file = self.file;
        }
        if let Some(width) = self.width {
            config.source.width = width;
        }
        if let Some(height) = self.height {
            config.source.height = height;
        }
        if let Some(display) = self.display {
            config.display.mode = display.into();
        }
        if let Some(host) = self.rtp_host {
            config.display.rtp_host = host;
        }
        if let Some(port) = self.rtp_port {
            config.display.rtp_port = port;
        }
        if self.record.is_some() {
            config.display.record_to = self.record;
        }
        if let Some(dir) = self.capture_dir {
            config.capture.directory = dir;
        }
        if self.no_capture {
            config.capture.enabled = false;
        }
        if let Some(threshold) = self.confirm_threshold {
            config.tracker.confirm_threshold = threshold;
        }
        if let Some(tolerance) = self.miss_tolerance {
            config.tracker.miss_tolerance = tolerance;
        }
        if self.tessdata.is_some() {
            config.ocr.data_path = self.tessdata;
        }
        if let Some(language) = self.language {
            config.ocr.language = language;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn setup(config: &PipelineConfig) -> Result<PlateReaderLoop> {
    let size = Size::new(config.source.width, config.source.height);
    let fps = config.source.max_fps.unwrap_or(25);

    let ocr = TesseractOcr::new(&config.ocr).context("cannot start Tesseract")?;
    let pipeline = PlatePipeline::new(config, Box::new(ocr))?;

    let source = VideoReader::new(&config.source).context("cannot open video source")?;

    let render = match &config.display.record_to {
        Some(path) => BoundingBoxRender::with_save_to_file(path, fps as f64, size)?,
        None => BoundingBoxRender::default(),
    };

    let presenter: Box<dyn FramePresenter> = match config.display.mode {
        DisplayMode::Window => Box::new(HighGuiWindow::new(&config.display.window_title)?),
        DisplayMode::Rtp => Box::new(RtpSink::new(
            fps,
            &config.display.rtp_host,
            config.display.rtp_port,
            size,
        )?),
        DisplayMode::Headless => Box::new(Headless::default()),
    };

    let capture: Option<Box<dyn CaptureSink>> = if config.capture.enabled {
        let sink = DiskCaptureSink::new(&config.capture.directory).with_context(|| {
            format!(
                "cannot create capture directory {}",
                config.capture.directory.display()
            )
        })?;
        info!("Saving captures to {}", sink.directory().display());
        Some(Box::new(sink))
    } else {
        None
    };

    Ok(PlateReaderLoop::new(
        pipeline,
        Box::new(source),
        render,
        presenter,
        capture,
    ))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("plate_reader=info,plates_realtime=info")),
        )
        .init();

    let config = Args::parse().into_config()?;
    debug!("{config:?}");

    let mut reader = setup(&config)?;
    let summary = reader.run()?;
    for plate in &summary.plates {
        info!("Plate read: {plate}");
    }

    debug!("{}", metrics::render()?);
    info!("Done");
    Ok(())
}
