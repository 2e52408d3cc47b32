//! OCR text extraction

mod extractor;

pub use extractor::{ExtractionError, TextExtractor};
