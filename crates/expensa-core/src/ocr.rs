//! Receipt reading: routes a receipt file through the external recognizer to extraction.
//!
//! Text recognition and PDF rendering are collaborators behind [`OcrProvider`] and
//! [`PdfRasterizer`]. Only the first page of a PDF is ever read.

use tracing::{debug, warn};

use crate::error::{ExtractionError, RecognitionError};
use crate::models::config::ExtractionConfig;
use crate::models::expense::AttachmentKind;
use crate::receipt::{ExtractedFields, ReceiptFieldExtractor};

/// Turns image bytes into raw text.
pub trait OcrProvider {
    fn recognize(&self, image: &[u8]) -> Result<String, RecognitionError>;
}

/// Renders the first page of a PDF into image bytes.
pub trait PdfRasterizer {
    fn rasterize_first_page(&self, pdf: &[u8], scale: f32) -> Result<Vec<u8>, RecognitionError>;
}

/// A receipt file as uploaded.
#[derive(Debug, Clone)]
pub struct ReceiptFile {
    pub bytes: Vec<u8>,
    pub kind: AttachmentKind,
}

impl ReceiptFile {
    pub fn image(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            kind: AttachmentKind::Image,
        }
    }

    pub fn pdf(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            kind: AttachmentKind::Pdf,
        }
    }
}

/// Reads receipt files into extracted fields.
pub struct ReceiptReader {
    ocr: Box<dyn OcrProvider>,
    rasterizer: Option<Box<dyn PdfRasterizer>>,
    extractor: ReceiptFieldExtractor,
    pdf_render_scale: f32,
}

impl ReceiptReader {
    /// Create a reader for images only.
    pub fn new(ocr: impl OcrProvider + 'static) -> Self {
        Self {
            ocr: Box::new(ocr),
            rasterizer: None,
            extractor: ReceiptFieldExtractor::new(),
            pdf_render_scale: ExtractionConfig::default().pdf_render_scale,
        }
    }

    /// Enable PDF receipts.
    pub fn with_rasterizer(mut self, rasterizer: impl PdfRasterizer + 'static) -> Self {
        self.rasterizer = Some(Box::new(rasterizer));
        self
    }

    pub fn with_config(mut self, config: &ExtractionConfig) -> Self {
        self.extractor = ReceiptFieldExtractor::from_config(config);
        self.pdf_render_scale = config.pdf_render_scale;
        self
    }

    /// Use a prepared extractor, e.g. one pinned to a reference year.
    pub fn with_extractor(mut self, extractor: ReceiptFieldExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Recognize the text of a receipt file.
    pub fn recognize(&self, file: &ReceiptFile) -> Result<String, ExtractionError> {
        let text = match file.kind {
            AttachmentKind::Image => self.ocr.recognize(&file.bytes),
            AttachmentKind::Pdf => {
                let rasterizer = self.rasterizer.as_ref().ok_or_else(|| ExtractionError::Unavailable {
                    reason: "no PDF rasterizer configured".to_string(),
                })?;
                rasterizer
                    .rasterize_first_page(&file.bytes, self.pdf_render_scale)
                    .and_then(|page| self.ocr.recognize(&page))
            }
        };

        text.map_err(|e| {
            warn!("receipt could not be read: {}", e);
            ExtractionError::from(e)
        })
    }

    /// Recognize and extract fields.
    ///
    /// Fails only when the recognizer fails. Text with nothing recognizable yields
    /// empty fields.
    pub fn read(&self, file: &ReceiptFile) -> Result<ExtractedFields, ExtractionError> {
        let text = self.recognize(file)?;
        debug!("recognized {} characters", text.len());
        Ok(self.extractor.extract(&text))
    }
}
