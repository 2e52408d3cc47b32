//! Text extraction from uploaded documents using pdftotext and Tesseract.
//!
//! PDFs are processed per page: direct text extraction runs first, and OCR
//! replaces it on pages where it yields materially more content (scanned
//! pages produce near-empty pdftotext output). Images go straight to
//! Tesseract. External binaries come from poppler-utils and tesseract-ocr.

use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;
use contendo_core::{ExtractedDocument, OcrExtractor};
use contendo_domain::{ContendoError, OcrConfig, Result, UploadedFile};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExtractionError> for ContendoError {
    fn from(value: ExtractionError) -> Self {
        match value {
            ExtractionError::UnsupportedFileType(mime) => {
                ContendoError::Validation(format!("unsupported file type: {mime}"))
            }
            ExtractionError::ToolNotFound(tool) => {
                ContendoError::Upstream(format!("external tool not found: {tool}"))
            }
            ExtractionError::ExtractionFailed(message) => ContendoError::Upstream(message),
            ExtractionError::Io(e) => ContendoError::Internal(format!("extraction io error: {e}")),
        }
    }
}

/// Handle command output, extracting stdout on success.
fn handle_cmd_output(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
    error_prefix: &str,
) -> std::result::Result<String, ExtractionError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ExtractionError::ExtractionFailed(format!("{error_prefix}: {stderr}")))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractionError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(ExtractionError::Io(e)),
    }
}

/// Check command status, returning an error on failure.
fn check_cmd_status(
    result: std::io::Result<std::process::ExitStatus>,
    tool_name: &str,
    error_msg: &str,
) -> std::result::Result<(), ExtractionError> {
    match result {
        Ok(s) if s.success() => Ok(()),
        Ok(_) => Err(ExtractionError::ExtractionFailed(error_msg.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractionError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(ExtractionError::Io(e)),
    }
}

/// Text extractor that uses external tools.
#[derive(Clone)]
pub struct TextExtractor {
    /// Minimum non-whitespace characters per page before the direct text is
    /// trusted over OCR output.
    min_chars_per_page: usize,
    /// Tesseract language setting.
    tesseract_lang: String,
}

impl TextExtractor {
    /// Create an extractor from the OCR configuration.
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            min_chars_per_page: config.min_chars_per_page,
            tesseract_lang: config.tesseract_lang.clone(),
        }
    }

    /// Check if required tools are available.
    pub fn check_tools() -> Vec<(String, bool)> {
        ["pdftotext", "pdftoppm", "pdfinfo", "tesseract"]
            .iter()
            .map(|tool| {
                let found = Command::new(tool).arg("--help").output().is_ok();
                ((*tool).to_string(), found)
            })
            .collect()
    }

    fn extract_blocking(
        &self,
        file: &UploadedFile,
    ) -> std::result::Result<ExtractedDocument, ExtractionError> {
        match file.mime.as_str() {
            "text/plain" => Ok(ExtractedDocument {
                text: String::from_utf8_lossy(&file.bytes).into_owned(),
                page_count: 1,
            }),
            "application/pdf" => {
                let temp = TempDir::new()?;
                let pdf_path = temp.path().join("upload.pdf");
                std::fs::write(&pdf_path, &file.bytes)?;
                self.extract_pdf(&pdf_path)
            }
            "image/png" | "image/jpeg" | "image/tiff" | "image/gif" | "image/bmp" => {
                let temp = TempDir::new()?;
                let image_path = temp.path().join("upload.img");
                std::fs::write(&image_path, &file.bytes)?;
                let text = self.run_tesseract(&image_path)?;
                Ok(ExtractedDocument { text, page_count: 1 })
            }
            other => Err(ExtractionError::UnsupportedFileType(other.to_string())),
        }
    }

    /// Extract text from a PDF using per-page analysis: pdftotext first, OCR
    /// where a page's direct text is sparse and OCR finds more.
    fn extract_pdf(
        &self,
        pdf_path: &Path,
    ) -> std::result::Result<ExtractedDocument, ExtractionError> {
        let page_count = self.get_pdf_page_count(pdf_path).unwrap_or(1);

        let mut page_texts: Vec<String> = Vec::with_capacity(page_count as usize);
        for page in 1..=page_count {
            let direct = self.extract_pdf_page_text(pdf_path, page).unwrap_or_default();
            let direct_chars = non_ws_chars(&direct);

            let mut final_text = direct;
            if direct_chars < self.min_chars_per_page {
                match self.ocr_pdf_page(pdf_path, page) {
                    Ok(ocr_text) => {
                        // Prefer OCR only when it finds materially more
                        // content (>20% more characters).
                        if non_ws_chars(&ocr_text) > direct_chars + direct_chars / 5 {
                            final_text = ocr_text;
                        }
                    }
                    Err(e) => {
                        warn!(page, error = %e, "ocr failed for page, keeping direct text");
                    }
                }
            }
            page_texts.push(final_text);
        }

        Ok(ExtractedDocument { text: join_pages(&page_texts), page_count })
    }

    /// Run pdftotext on a single page of a PDF file.
    fn extract_pdf_page_text(
        &self,
        pdf_path: &Path,
        page: u32,
    ) -> std::result::Result<String, ExtractionError> {
        let page_str = page.to_string();
        let output = Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8", "-f", &page_str, "-l", &page_str])
            .arg(pdf_path)
            .arg("-")
            .output();

        handle_cmd_output(
            output,
            "pdftotext (install poppler-utils)",
            &format!("pdftotext failed on page {page}"),
        )
    }

    /// Get the page count of a PDF via pdfinfo.
    fn get_pdf_page_count(&self, pdf_path: &Path) -> Option<u32> {
        let output = Command::new("pdfinfo").arg(pdf_path).output().ok()?;
        if !output.status.success() {
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            if line.starts_with("Pages:") {
                return line.split_whitespace().nth(1).and_then(|s| s.parse().ok());
            }
        }
        None
    }

    /// OCR a single page: convert it to an image with pdftoppm, then run
    /// Tesseract on it.
    fn ocr_pdf_page(
        &self,
        pdf_path: &Path,
        page: u32,
    ) -> std::result::Result<String, ExtractionError> {
        let temp = TempDir::new()?;
        let prefix = temp.path().join("page");

        let page_str = page.to_string();
        let status = Command::new("pdftoppm")
            .args(["-png", "-r", "300", "-f", &page_str, "-l", &page_str])
            .arg(pdf_path)
            .arg(&prefix)
            .status();

        check_cmd_status(
            status,
            "pdftoppm (install poppler-utils)",
            &format!("pdftoppm failed to convert page {page}"),
        )?;

        match find_page_image(temp.path(), page) {
            Some(image_path) => self.run_tesseract(&image_path),
            None => Err(ExtractionError::ExtractionFailed(format!(
                "no image generated for page {page}"
            ))),
        }
    }

    /// Run Tesseract OCR on an image.
    fn run_tesseract(&self, image_path: &Path) -> std::result::Result<String, ExtractionError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.tesseract_lang])
            .output();

        handle_cmd_output(output, "tesseract (install tesseract-ocr)", "tesseract failed")
    }
}

/// Find the image pdftoppm generated for a page (page-01.png, page-001.png…).
fn find_page_image(dir: &Path, page: u32) -> Option<PathBuf> {
    for digits in [1, 2, 3, 4] {
        let filename = format!("page-{page:0width$}.png", width = digits);
        let path = dir.join(&filename);
        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Join page texts with the markers the schedule parser understands.
fn join_pages(pages: &[String]) -> String {
    if pages.len() <= 1 {
        return pages.first().cloned().unwrap_or_default();
    }
    let mut combined = String::new();
    for (index, text) in pages.iter().enumerate() {
        combined.push_str(&format!("--- página {} ---\n", index + 1));
        combined.push_str(text);
        if !combined.ends_with('\n') {
            combined.push('\n');
        }
    }
    combined
}

fn non_ws_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

#[async_trait]
impl OcrExtractor for TextExtractor {
    async fn extract(&self, file: &UploadedFile) -> Result<ExtractedDocument> {
        let extractor = self.clone();
        let file = file.clone();

        debug!(name = %file.name, mime = %file.mime, size = file.bytes.len(), "extracting text");
        let extracted = tokio::task::spawn_blocking(move || extractor.extract_blocking(&file))
            .await
            .map_err(|e| ContendoError::Internal(format!("extraction task panicked: {e}")))??;

        Ok(extracted)
    }
}
