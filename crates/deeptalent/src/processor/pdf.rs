use crate::error::ProcessError;
use crate::processor::diagnostic;
use crate::processor::ocr::OcrEngine;
use crate::processor::raster::PageRasterizer;

/// Marker lopdf emits for CID fonts it cannot decode. Not real text.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// OCR path used when a PDF has no usable text layer.
pub struct OcrFallback<'a> {
    engine: &'a dyn OcrEngine,
    rasterizer: &'a dyn PageRasterizer,
}

impl<'a> OcrFallback<'a> {
    pub fn new(engine: &'a dyn OcrEngine, rasterizer: &'a dyn PageRasterizer) -> Self {
        Self { engine, rasterizer }
    }

    fn recognize_pages(&self, pdf_bytes: &[u8], page_count: u32) -> Result<String, ProcessError> {
        let mut pages = Vec::with_capacity(page_count as usize);
        for page in 1..=page_count {
            let image = self.rasterizer.render_page(pdf_bytes, page)?;
            let text = self.engine.recognize(&image)?;
            pages.push(text.trim().to_string());
        }
        Ok(pages.join("\n"))
    }
}

/// Extracts text page by page, falling back to OCR for image-only documents.
///
/// Only structural problems outside the OCR path are returned as errors;
/// OCR failures come back as a diagnostic string.
pub fn extract_pdf_text(
    pdf_bytes: &[u8],
    ocr: Option<&OcrFallback<'_>>,
) -> Result<String, ProcessError> {
    let _span = tracing::info_span!("processor.pdf").entered();

    let page_count = match lopdf::Document::load_mem(pdf_bytes) {
        Ok(doc) => {
            let pages = extract_page_texts(&doc);
            if !is_image_only(&pages) {
                return Ok(pages.join("\n"));
            }
            pages.len() as u32
        }
        Err(e) => {
            // poppler copes with more broken cross-reference tables than lopdf
            tracing::warn!("lopdf failed to parse PDF: {}. Falling back to OCR.", e);
            match ocr {
                Some(fallback) => match fallback.rasterizer.page_count(pdf_bytes) {
                    Ok(count) => count,
                    Err(err) => return Ok(diagnostic(err)),
                },
                None => {
                    return Err(ProcessError::PdfProcessing(format!(
                        "Failed to load PDF: {}. OCR fallback unavailable.",
                        e
                    )))
                }
            }
        }
    };

    let Some(fallback) = ocr else {
        return Ok(diagnostic("PDF has no text layer and OCR is disabled"));
    };

    let _ocr_span = tracing::info_span!("processor.ocr_fallback", pages = page_count).entered();
    match fallback.recognize_pages(pdf_bytes, page_count) {
        Ok(text) => Ok(text),
        Err(e) => {
            log::warn!("OCR fallback failed: {}", e);
            Ok(diagnostic(e))
        }
    }
}

fn extract_page_texts(doc: &lopdf::Document) -> Vec<String> {
    doc.get_pages()
        .keys()
        .map(|&page_num| doc.extract_text(&[page_num]).unwrap_or_default())
        .collect()
}

/// True when every page is blank once decoder markers are removed.
fn is_image_only(pages: &[String]) -> bool {
    pages
        .iter()
        .all(|text| text.replace(IDENTITY_H_PATTERN, "").trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::test_support::{build_pdf, CountingOcr, FakeRasterizer};

    #[test]
    fn test_is_image_only() {
        assert!(is_image_only(&["  ".to_string(), "\n\t".to_string()]));
        assert!(is_image_only(&[
            "?Identity-H Unimplemented? ?Identity-H Unimplemented?".to_string()
        ]));
        assert!(!is_image_only(&["".to_string(), "Python".to_string()]));
        assert!(is_image_only(&[]));
    }

    #[test]
    fn test_mixed_pdf_keeps_text_layer() {
        let pdf = build_pdf(&[None, Some("Experiencia 5 anos")]);
        let ocr = CountingOcr::returning("unused");
        let rasterizer = FakeRasterizer { pages: 2 };
        let fallback = OcrFallback::new(&ocr, &rasterizer);

        let text = extract_pdf_text(&pdf, Some(&fallback)).unwrap();

        assert!(text.contains("Experiencia 5 anos"));
        assert_eq!(ocr.calls(), 0);
    }

    #[test]
    fn test_unparseable_pdf_uses_rasterizer_page_count() {
        let ocr = CountingOcr::returning("pagina");
        let rasterizer = FakeRasterizer { pages: 3 };
        let fallback = OcrFallback::new(&ocr, &rasterizer);

        let text = extract_pdf_text(b"%PDF-1.4 garbage", Some(&fallback)).unwrap();

        assert_eq!(ocr.calls(), 3);
        assert_eq!(text, "pagina\npagina\npagina");
    }

    #[test]
    fn test_unparseable_pdf_without_ocr_is_error() {
        let err = extract_pdf_text(b"not a pdf", None).unwrap_err();
        match err {
            ProcessError::PdfProcessing(msg) => assert!(msg.contains("Failed to load PDF")),
            other => panic!("Expected PdfProcessing, got {:?}", other),
        }
    }
}
