pub mod docx;
pub mod ocr;
pub mod pdf;
pub mod raster;

use std::sync::Arc;

use crate::config::OcrConfig;
use crate::error::ProcessError;
use crate::processor::ocr::OcrEngine;
use crate::processor::raster::{PageRasterizer, Poppler};

/// Prefix of the inline text returned when the OCR path fails.
///
/// Such text is stored and evaluated like any other extraction result.
pub const DIAGNOSTIC_PREFIX: &str = "[extraction diagnostic]";

pub(crate) fn diagnostic(reason: impl std::fmt::Display) -> String {
    format!("{} {}", DIAGNOSTIC_PREFIX, reason)
}

/// Returns true when `text` is an inline extraction diagnostic.
pub fn is_diagnostic(text: &str) -> bool {
    text.starts_with(DIAGNOSTIC_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    /// `doc` and `docx`, both read as OOXML packages.
    Word,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" | "docx" => Some(Self::Word),
            _ => None,
        }
    }
}

/// Converts raw résumé bytes into plain text.
///
/// OCR is optional: without an engine, image-only PDFs yield a diagnostic.
#[derive(Clone)]
pub struct TextExtractor {
    ocr: Option<Arc<dyn OcrEngine>>,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl TextExtractor {
    pub fn new(ocr: Option<Arc<dyn OcrEngine>>, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self { ocr, rasterizer }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        let rasterizer: Arc<dyn PageRasterizer> = Arc::new(Poppler::new(config.dpi));
        let ocr: Option<Arc<dyn OcrEngine>> = if config.enabled {
            Some(default_engine(config))
        } else {
            None
        };
        Self::new(ocr, rasterizer)
    }

    pub fn extract(&self, bytes: &[u8], extension: &str) -> Result<String, ProcessError> {
        let format = DocumentFormat::from_extension(extension)
            .ok_or_else(|| ProcessError::UnsupportedFormat(extension.to_string()))?;

        let _span = tracing::info_span!("processor.extract", format = ?format).entered();

        match format {
            DocumentFormat::Pdf => {
                let ocr = self
                    .ocr
                    .as_deref()
                    .map(|engine| pdf::OcrFallback::new(engine, self.rasterizer.as_ref()));
                pdf::extract_pdf_text(bytes, ocr.as_ref())
            }
            DocumentFormat::Word => docx::extract_docx_text(bytes),
        }
    }
}

#[cfg(feature = "leptess")]
fn default_engine(config: &OcrConfig) -> Arc<dyn OcrEngine> {
    Arc::new(ocr::LeptessOcr::new(&config.languages))
}

#[cfg(not(feature = "leptess"))]
fn default_engine(config: &OcrConfig) -> Arc<dyn OcrEngine> {
    Arc::new(ocr::TesseractCli::new(&config.tesseract_binary, &config.languages))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use lopdf::{dictionary, Document, Object, Stream};

    use super::*;

    /// OCR engine that returns a fixed string and counts calls.
    pub struct CountingOcr {
        pub text: String,
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl CountingOcr {
        pub fn returning(text: &str) -> Self {
            Self {
                text: text.to_string(),
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::returning("")
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl OcrEngine for CountingOcr {
        fn recognize(&self, _image: &[u8]) -> Result<String, ProcessError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProcessError::OcrFailed("engine unavailable".to_string()));
            }
            Ok(self.text.clone())
        }
    }

    pub struct FakeRasterizer {
        pub pages: u32,
    }

    impl PageRasterizer for FakeRasterizer {
        fn page_count(&self, _pdf: &[u8]) -> Result<u32, ProcessError> {
            Ok(self.pages)
        }

        fn render_page(&self, _pdf: &[u8], page: u32) -> Result<Vec<u8>, ProcessError> {
            Ok(format!("page-{}", page).into_bytes())
        }
    }

    /// Builds a PDF with one page per entry; `None` pages carry no text layer.
    pub fn build_pdf(pages: &[Option<&str>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for page in pages {
            let mut page_dict = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
            };
            if let Some(text) = page {
                let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
                let content_id = doc.add_object(Object::Stream(Stream::new(
                    dictionary! {},
                    content.into_bytes(),
                )));
                page_dict.set("Contents", content_id);
            }
            let page_id = doc.add_object(page_dict);
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }
}
