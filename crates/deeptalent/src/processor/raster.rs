//! Page rendering for the OCR path via poppler-utils.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ProcessError;

pub trait PageRasterizer: Send + Sync {
    fn page_count(&self, pdf: &[u8]) -> Result<u32, ProcessError>;

    /// Renders a 1-based page to PNG bytes.
    fn render_page(&self, pdf: &[u8], page: u32) -> Result<Vec<u8>, ProcessError>;
}

/// `pdfinfo` / `pdftoppm` from poppler-utils.
pub struct Poppler {
    dpi: u32,
}

impl Poppler {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }
}

/// PDF bytes spilled to a temp file, removed on drop.
struct TempPdf {
    path: PathBuf,
}

impl TempPdf {
    fn write(bytes: &[u8]) -> Result<Self, ProcessError> {
        let path =
            std::env::temp_dir().join(format!("deeptalent_{}.pdf", uuid::Uuid::new_v4()));
        std::fs::write(&path, bytes)
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to write temp PDF: {}", e)))?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempPdf {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn run(command: &mut Command, tool: &str) -> Result<Vec<u8>, ProcessError> {
    let output = command.output().map_err(|e| {
        ProcessError::PdfProcessing(format!(
            "Failed to run {}: {}. Make sure poppler-utils is installed.",
            tool, e
        ))
    })?;

    if !output.status.success() {
        return Err(ProcessError::PdfProcessing(format!(
            "{} failed: {}",
            tool,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(output.stdout)
}

fn parse_page_count(pdfinfo_output: &str) -> Option<u32> {
    pdfinfo_output
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse().ok())
}

impl PageRasterizer for Poppler {
    fn page_count(&self, pdf: &[u8]) -> Result<u32, ProcessError> {
        let temp = TempPdf::write(pdf)?;
        let stdout = run(Command::new("pdfinfo").arg(temp.path()), "pdfinfo")?;
        parse_page_count(&String::from_utf8_lossy(&stdout)).ok_or_else(|| {
            ProcessError::PdfProcessing("pdfinfo reported no page count".to_string())
        })
    }

    fn render_page(&self, pdf: &[u8], page: u32) -> Result<Vec<u8>, ProcessError> {
        let temp = TempPdf::write(pdf)?;
        let page_arg = page.to_string();

        // without an output root, pdftoppm writes the single page to stdout
        let png = run(
            Command::new("pdftoppm")
                .args(["-png", "-singlefile", "-r", &self.dpi.to_string()])
                .args(["-f", &page_arg, "-l", &page_arg])
                .arg(temp.path()),
            "pdftoppm",
        )
        .map_err(|e| ProcessError::Rasterize {
            page,
            reason: e.to_string(),
        })?;

        if png.is_empty() {
            return Err(ProcessError::Rasterize {
                page,
                reason: "pdftoppm produced no image".to_string(),
            });
        }
        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_count() {
        let output = "Producer: test\nPages:          4\nEncrypted: no\n";
        assert_eq!(parse_page_count(output), Some(4));
        assert_eq!(parse_page_count("Producer: test\n"), None);
    }

    #[test]
    fn test_temp_pdf_is_removed_on_drop() {
        let temp = TempPdf::write(b"%PDF-1.4").unwrap();
        let path = temp.path().to_path_buf();
        assert!(path.exists());
        drop(temp);
        assert!(!path.exists());
    }
}
