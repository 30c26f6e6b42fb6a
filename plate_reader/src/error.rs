use thiserror::Error;

/// Errors raised by the plate reading pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum PlateError {
    #[error("opencv error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("video source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("cannot initialize OCR engine: {0}")]
    OcrInit(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("cannot write capture {path}: {reason}")]
    CaptureWrite { path: String, reason: String },

    #[error("display error: {0}")]
    Display(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, PlateError>;
