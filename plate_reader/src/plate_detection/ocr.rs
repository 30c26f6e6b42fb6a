use std::ffi::CString;

use leptess::tesseract::TessApi;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use opencv::prelude::MatTraitConstManual;
use tesseract_plumbing::TessBaseApi;
use tracing::{debug, info};

use crate::config::OcrConfig;
use crate::error::{PlateError, Result};

/// Reads one line of text from a binarized plate image.
pub trait PlateOcr {
    fn read_text(&mut self, binary: &Mat) -> Result<String>;
}

pub struct TesseractOcr {
    ocr: TessApi,
}

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let mut api = TessApi::new(config.data_path.as_deref(), &config.language)
            .map_err(|e| PlateError::OcrInit(format!("{e:?}")))?;

        set_variable(&mut api.raw, "tessedit_char_whitelist", &config.whitelist)?;
        set_variable(
            &mut api.raw,
            "tessedit_pageseg_mode",
            &config.page_seg_mode.to_string(),
        )?;

        info!(
            "Tesseract ready, language {}, page segmentation mode {}",
            config.language, config.page_seg_mode
        );
        Ok(Self { ocr: api })
    }
}

fn set_variable(raw: &mut TessBaseApi, name: &str, value: &str) -> Result<()> {
    let name_c = CString::new(name).map_err(|e| PlateError::OcrInit(e.to_string()))?;
    let value_c = CString::new(value).map_err(|e| PlateError::OcrInit(e.to_string()))?;
    raw.set_variable(&name_c, &value_c)
        .map_err(|e| PlateError::OcrInit(format!("cannot set {name}: {e:?}")))
}

impl PlateOcr for TesseractOcr {
    fn read_text(&mut self, binary: &Mat) -> Result<String> {
        // Tesseract needs a tightly packed buffer.
        let packed;
        let image = if binary.is_continuous() {
            binary
        } else {
            packed = binary.try_clone()?;
            &packed
        };

        let cols = image.cols();
        let rows = image.rows();
        let channels = image.channels();
        self.ocr
            .raw
            .set_image(image.data_bytes()?, cols, rows, channels, cols * channels)
            .map_err(|e| PlateError::Ocr(format!("{e:?}")))?;

        let text = self
            .ocr
            .get_utf8_text()
            .map_err(|e| PlateError::Ocr(format!("{e:?}")))?;

        debug!("OCR {:?}", text.trim());
        Ok(text.trim().to_string())
    }
}
