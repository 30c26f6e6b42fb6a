use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use opencv::core::Vector;
use opencv::imgcodecs::imwrite;
use opencv::prelude::Mat;
use tracing::info;

use crate::error::{PlateError, Result};

/// Archives the frame on which a plate got confirmed.
pub trait CaptureSink {
    fn persist(&mut self, frame: &Mat, plate: &str, timestamp: DateTime<Local>) -> Result<PathBuf>;
}

/// Writes `plate_<PLATE>_<YYYYmmdd_HHMMSS>.png` files into one directory.
pub struct DiskCaptureSink {
    directory: PathBuf,
}

impl DiskCaptureSink {
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn file_name(plate: &str, timestamp: DateTime<Local>) -> String {
        format!("plate_{}_{}.png", plate, timestamp.format("%Y%m%d_%H%M%S"))
    }
}

impl CaptureSink for DiskCaptureSink {
    fn persist(&mut self, frame: &Mat, plate: &str, timestamp: DateTime<Local>) -> Result<PathBuf> {
        // The directory may have been removed while running.
        fs::create_dir_all(&self.directory)?;

        let path = self.directory.join(Self::file_name(plate, timestamp));
        let path_str = path.to_string_lossy().into_owned();
        let written = imwrite(&path_str, frame, &Vector::new()).map_err(|e| {
            PlateError::CaptureWrite {
                path: path_str.clone(),
                reason: e.to_string(),
            }
        })?;
        if !written {
            return Err(PlateError::CaptureWrite {
                path: path_str,
                reason: "encoder refused the image".to_string(),
            });
        }

        info!("Saved capture {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use opencv::core::Scalar;
    use opencv::core::CV_8UC3;
    use opencv::prelude::MatTraitConst;

    fn timestamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn file_name_is_deterministic() {
        assert_eq!(
            DiskCaptureSink::file_name("ABC1234", timestamp()),
            "plate_ABC1234_20240309_140507.png"
        );
    }

    #[test]
    fn creates_directory_and_writes_png() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join("captures");
        let mut sink = DiskCaptureSink::new(&dir).unwrap();
        assert!(dir.is_dir());

        let frame = Mat::new_rows_cols_with_default(48, 64, CV_8UC3, Scalar::all(90.0)).unwrap();
        let path = sink.persist(&frame, "XYZ987", timestamp()).unwrap();

        assert_eq!(path, dir.join("plate_XYZ987_20240309_140507.png"));
        let loaded = opencv::imgcodecs::imread(
            &path.to_string_lossy(),
            opencv::imgcodecs::IMREAD_COLOR,
        )
        .unwrap();
        assert_eq!(loaded.cols(), 64);
        assert_eq!(loaded.rows(), 48);
    }

    #[test]
    fn empty_frame_is_a_capture_error() {
        let root = tempfile::tempdir().unwrap();
        let mut sink = DiskCaptureSink::new(root.path()).unwrap();
        let result = sink.persist(&Mat::default(), "ABC1234", timestamp());
        assert!(matches!(result, Err(PlateError::CaptureWrite { .. })));
    }
}
