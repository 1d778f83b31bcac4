use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::ProcessError;

/// Recognizes text in a rendered page image (PNG bytes).
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &[u8]) -> Result<String, ProcessError>;
}

fn language_arg(languages: &[String]) -> String {
    if languages.is_empty() {
        "eng".to_string()
    } else {
        languages.join("+")
    }
}

/// Runs the system `tesseract` binary, piping the image through stdin.
pub struct TesseractCli {
    binary: String,
    languages: String,
}

impl TesseractCli {
    pub fn new(binary: &str, languages: &[String]) -> Self {
        Self {
            binary: binary.to_string(),
            languages: language_arg(languages),
        }
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &[u8]) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.ocr", engine = "tesseract").entered();

        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", &self.languages])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ProcessError::OcrFailed(format!(
                    "Failed to run {}: {}. Make sure tesseract is installed.",
                    self.binary, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(image)
                .map_err(|e| ProcessError::OcrFailed(format!("Failed to pipe image: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| ProcessError::OcrFailed(format!("tesseract did not finish: {}", e)))?;

        if !output.status.success() {
            return Err(ProcessError::OcrFailed(format!(
                "tesseract failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// In-process Tesseract through leptess.
#[cfg(feature = "leptess")]
pub struct LeptessOcr {
    languages: String,
}

#[cfg(feature = "leptess")]
impl LeptessOcr {
    pub fn new(languages: &[String]) -> Self {
        Self {
            languages: language_arg(languages),
        }
    }
}

#[cfg(feature = "leptess")]
impl OcrEngine for LeptessOcr {
    fn recognize(&self, image: &[u8]) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.ocr", engine = "leptess").entered();

        // leptess only reads a few formats reliably, so normalize to PNG first
        let img = image::load_from_memory(image)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to load image: {}", e)))?;
        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to convert image: {}", e)))?;

        let mut lt = leptess::LepTess::new(None, &self.languages).map_err(|e| {
            ProcessError::OcrFailed(format!("Failed to initialize Tesseract: {}", e))
        })?;
        lt.set_image_from_mem(&png)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;
        lt.get_utf8_text()
            .map_err(|e| ProcessError::OcrFailed(format!("OCR failed: {}", e)))
    }
}
