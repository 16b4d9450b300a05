use cardscan_core::{FieldName, StudentCard};
use image::DynamicImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::barcode::{BarcodeError, BarcodeScanner};
use crate::config::PipelineConfig;
use crate::extract::Extractor;
use crate::preprocess;
use crate::quality::{Quality, QualityGate};
use crate::reconcile;
use crate::recognizer::{OcrBackend, OcrError};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Could not read the uploaded image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image is too blurry or poorly lit (sharpness {score:.1}, need {threshold}). Please retake the photo")]
    Blurry { score: f64, threshold: f64 },
    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("Barcode reading failed: {0}")]
    Barcode(#[from] BarcodeError),
    #[error("Student ID mismatch between OCR ({ocr}) and barcode ({barcode}). Please check the photo")]
    MssvConflict { ocr: String, barcode: String },
    #[error("Missing information: {}. Please check the photo", join_fields(.0))]
    IncompleteFields(Vec<FieldName>),
}

impl ExtractionError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::Decode(_) => "decode_failure",
            ExtractionError::Blurry { .. } => "blurry_image",
            ExtractionError::Ocr(_) => "ocr_failure",
            ExtractionError::Barcode(_) => "barcode_failure",
            ExtractionError::MssvConflict { .. } => "mssv_conflict",
            ExtractionError::IncompleteFields(_) => "incomplete_fields",
        }
    }
}

fn join_fields(fields: &[FieldName]) -> String {
    fields.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ")
}

/// A verified card: the accepted OCR text, all five fields, and the barcode
/// ID when one was found (it always equals `info.mssv`).
#[derive(Debug, Clone, Serialize)]
pub struct CardScan {
    pub texts: Vec<String>,
    pub info: StudentCard,
    pub barcode_mssv: Option<String>,
}

/// Orchestrates: decode → resize → sharpness gate → binarize → OCR → barcode
/// → extract → reconcile.
///
/// Holds no per-request state, so one instance can serve concurrent requests.
pub struct CardPipeline<R: OcrBackend, B: BarcodeScanner> {
    recognizer: R,
    scanner: B,
    gate: QualityGate,
    config: PipelineConfig,
}

impl<R: OcrBackend, B: BarcodeScanner> CardPipeline<R, B> {
    pub fn new(recognizer: R, scanner: B, config: PipelineConfig) -> Self {
        Self {
            recognizer,
            scanner,
            gate: QualityGate::new(config.blur_threshold),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process raw uploaded bytes (JPEG / PNG / WEBP / …).
    #[instrument(skip_all, fields(bytes = data.len()))]
    pub fn process_bytes(&self, data: &[u8]) -> Result<CardScan, ExtractionError> {
        let result = preprocess::decode(data)
            .map_err(ExtractionError::from)
            .and_then(|img| self.process_image(img));
        match &result {
            Ok(scan) => info!(tokens = scan.texts.len(), barcode = scan.barcode_mssv.is_some(), "card accepted"),
            Err(e) => warn!(kind = e.kind(), "card rejected: {e}"),
        }
        result
    }

    /// Process an already decoded image.
    pub fn process_image(&self, img: DynamicImage) -> Result<CardScan, ExtractionError> {
        // 1. Downscale; the sharpness score depends on resolution, so the gate
        //    must see the same pixels OCR will.
        let img = preprocess::resize(img, self.config.max_dim);
        let gray = img.to_luma8();

        // 2. Reject blurry photos before any recognition runs.
        if let Quality::Blurry { score } = self.gate.assess(&gray) {
            return Err(ExtractionError::Blurry { score, threshold: self.gate.threshold() });
        }

        // 3. OCR on the binarized image; drop low-confidence fragments once, here.
        let enhanced = preprocess::enhance(&gray, self.config.threshold_window, self.config.threshold_bias);
        let tokens = self.recognizer.recognize(&DynamicImage::ImageLuma8(enhanced))?;
        let recognized = tokens.len();
        let texts: Vec<String> = tokens
            .into_iter()
            .filter(|t| t.passes(self.config.min_token_confidence))
            .map(|t| t.text)
            .collect();
        debug!(recognized, kept = texts.len(), "OCR tokens filtered");

        // 4. Barcodes from the un-binarized grayscale.
        let barcodes = self.scanner.scan(&gray)?;
        debug!(found = barcodes.len(), "barcodes decoded");

        // 5. Extract, cross-check, require completeness.
        let fields = Extractor::extract(&texts);
        reconcile::reconcile(texts, fields, &barcodes)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::{MockBarcodeScanner, NoBarcodeScanner};
    use crate::preprocess::encode_png;
    use crate::recognizer::MockRecognizer;
    use cardscan_core::{BarcodeRecord, BoundingBox, RecognizedToken, Symbology};
    use image::{GrayImage, ImageBuffer, Luma};
    use std::sync::Arc;

    const CARD: [&str; 6] = [
        "THẺ SINH VIÊN",
        "Nguyen Van A",
        "1234567890",
        "01-01-2000",
        "Ngành Công nghệ thông tin",
        "Khoá học 2020-2024",
    ];

    fn png(img: GrayImage) -> Vec<u8> {
        encode_png(&DynamicImage::ImageLuma8(img)).unwrap()
    }

    /// Fine checkerboard: far above the default sharpness threshold.
    fn sharp_png() -> Vec<u8> {
        png(ImageBuffer::from_fn(64, 48, |x, y| {
            Luma([if (x + y) % 2 == 0 { 0u8 } else { 255u8 }])
        }))
    }

    fn flat_png() -> Vec<u8> {
        png(GrayImage::from_pixel(64, 48, Luma([128])))
    }

    fn pipeline(
        recognizer: Arc<MockRecognizer>,
        scanner: Arc<MockBarcodeScanner>,
    ) -> CardPipeline<Arc<MockRecognizer>, Arc<MockBarcodeScanner>> {
        CardPipeline::new(recognizer, scanner, PipelineConfig::default())
    }

    #[test]
    fn clear_card_without_barcode_succeeds() {
        let ocr = Arc::new(MockRecognizer::from_texts(&CARD));
        let codes = Arc::new(MockBarcodeScanner::new(vec![]));
        let scan = pipeline(ocr.clone(), codes.clone()).process_bytes(&sharp_png()).unwrap();

        assert_eq!(scan.texts.len(), 6);
        assert_eq!(scan.info.name, "Nguyen Van A");
        assert_eq!(scan.info.course, "2020-2024");
        assert_eq!(scan.barcode_mssv, None);
        assert_eq!((ocr.calls(), codes.calls()), (1, 1));

        let json = serde_json::to_value(&scan).unwrap();
        assert!(json["barcode_mssv"].is_null());
        assert_eq!(json["info"]["mssv"], "1234567890");
    }

    #[test]
    fn mismatching_barcode_fails_the_request() {
        let ocr = Arc::new(MockRecognizer::from_texts(&CARD));
        let codes = Arc::new(MockBarcodeScanner::new(vec![BarcodeRecord::new(
            Symbology::Code128,
            "9999999999",
            BoundingBox { left: 10, top: 5, width: 40, height: 12 },
        )]));
        let err = pipeline(ocr, codes).process_bytes(&sharp_png()).unwrap_err();
        assert_eq!(err.kind(), "mssv_conflict");
        assert!(err.to_string().contains("9999999999"));
    }

    #[test]
    fn missing_major_fails_with_field_name() {
        let texts: Vec<&str> = CARD.iter().copied().filter(|t| !t.starts_with("Ngành")).collect();
        let ocr = Arc::new(MockRecognizer::from_texts(&texts));
        let codes = Arc::new(MockBarcodeScanner::new(vec![]));
        let err = pipeline(ocr, codes).process_bytes(&sharp_png()).unwrap_err();
        assert!(matches!(err, ExtractionError::IncompleteFields(ref m) if m == &vec![FieldName::Major]));
        assert!(err.to_string().contains("major"));
    }

    #[test]
    fn blurry_image_never_reaches_recognition() {
        let ocr = Arc::new(MockRecognizer::from_texts(&CARD));
        let codes = Arc::new(MockBarcodeScanner::new(vec![]));
        let err = pipeline(ocr.clone(), codes.clone()).process_bytes(&flat_png()).unwrap_err();

        assert!(matches!(err, ExtractionError::Blurry { threshold, .. } if threshold == 120.0));
        assert_eq!(ocr.calls(), 0);
        assert_eq!(codes.calls(), 0);
    }

    #[test]
    fn undecodable_bytes_fail_before_anything_runs() {
        let ocr = Arc::new(MockRecognizer::from_texts(&CARD));
        let codes = Arc::new(MockBarcodeScanner::new(vec![]));
        let err = pipeline(ocr.clone(), codes).process_bytes(b"definitely not an image").unwrap_err();
        assert_eq!(err.kind(), "decode_failure");
        assert_eq!(ocr.calls(), 0);
    }

    #[test]
    fn ocr_failure_carries_engine_message() {
        let ocr = Arc::new(MockRecognizer::failing("model not loaded"));
        let codes = Arc::new(MockBarcodeScanner::new(vec![]));
        let err = pipeline(ocr, codes.clone()).process_bytes(&sharp_png()).unwrap_err();
        assert_eq!(err.kind(), "ocr_failure");
        assert!(err.to_string().contains("model not loaded"));
        assert_eq!(codes.calls(), 0);
    }

    #[test]
    fn barcode_failure_fails_the_request() {
        let ocr = Arc::new(MockRecognizer::from_texts(&CARD));
        let codes = Arc::new(MockBarcodeScanner::failing("corrupt symbol"));
        let err = pipeline(ocr, codes).process_bytes(&sharp_png()).unwrap_err();
        assert_eq!(err.kind(), "barcode_failure");
    }

    #[test]
    fn low_confidence_tokens_are_dropped_once() {
        let mut tokens: Vec<RecognizedToken> =
            CARD.iter().map(|t| RecognizedToken::new(*t, 0.9)).collect();
        tokens.insert(2, RecognizedToken::new("0000000000", 0.4));
        tokens.push(RecognizedToken::new("noise", 0.1));

        let pipeline = CardPipeline::new(MockRecognizer::new(tokens), NoBarcodeScanner, PipelineConfig::default());
        let scan = pipeline.process_bytes(&sharp_png()).unwrap();
        assert_eq!(scan.texts, CARD.iter().map(|t| t.to_string()).collect::<Vec<_>>());
        assert_eq!(scan.info.mssv, "1234567890");
    }

    #[test]
    fn gate_scores_the_downscaled_image() {
        // A 1px checkerboard is sharp at full size but averages to flat gray
        // once halved, so the gate must reject it.
        let board = png(ImageBuffer::from_fn(200, 200, |x, y| {
            Luma([if (x + y) % 2 == 0 { 0u8 } else { 255u8 }])
        }));
        let ocr = Arc::new(MockRecognizer::from_texts(&CARD));
        let config = PipelineConfig { max_dim: 100, ..PipelineConfig::default() };
        let pipeline = CardPipeline::new(ocr.clone(), NoBarcodeScanner, config);

        let err = pipeline.process_bytes(&board).unwrap_err();
        assert_eq!(err.kind(), "blurry_image");
        assert_eq!(ocr.calls(), 0);
        assert_eq!(pipeline.config().max_dim, 100);
    }

    #[test]
    fn error_messages_list_fields() {
        let err = ExtractionError::IncompleteFields(vec![FieldName::Mssv, FieldName::Course]);
        assert_eq!(err.to_string(), "Missing information: mssv, course. Please check the photo");
    }
}
