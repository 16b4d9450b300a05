use std::sync::Arc;

use anyhow::{Context, Result};
use cardscan_ocr::{BarcodeScanner, CardPipeline, MockRecognizer, NoBarcodeScanner, OcrError, OcrWorker};

use crate::config::{BarcodeScannerKind, OcrEngineKind, OcrSettings, Settings};

pub type Pipeline = CardPipeline<OcrWorker, Box<dyn BarcodeScanner>>;

/// Shared across handlers. The pipeline is read-only; the OCR engine inside
/// it serializes its own access.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline: Arc::new(pipeline) }
    }
}

/// Load the OCR model and pick the barcode decoder. Runs once at start-up.
pub fn build_pipeline(settings: &Settings) -> Result<Pipeline> {
    let ocr = start_ocr(&settings.ocr).context("Failed to start OCR engine")?;
    let scanner = barcode_scanner(settings.barcode.scanner)?;
    Ok(CardPipeline::new(ocr, scanner, settings.pipeline.clone()))
}

fn start_ocr(ocr: &OcrSettings) -> Result<OcrWorker, OcrError> {
    tracing::info!(engine = ?ocr.engine, lang = %ocr.lang, data_path = ?ocr.data_path, "starting OCR engine");
    match ocr.engine {
        OcrEngineKind::Mock => {
            tracing::warn!("using mock OCR engine; every image yields the configured tokens");
            let tokens = ocr.mock_tokens.clone();
            OcrWorker::spawn("ocr-mock", move || Ok(MockRecognizer::from_texts(&tokens)))
        }
        OcrEngineKind::Tesseract => start_tesseract(ocr),
    }
}

#[cfg(feature = "tesseract")]
fn start_tesseract(ocr: &OcrSettings) -> Result<OcrWorker, OcrError> {
    use cardscan_ocr::recognizer::tesseract_backend::TesseractEngine;

    let data_path = ocr.data_path.as_ref().map(|p| p.to_string_lossy().into_owned());
    let lang = ocr.lang.clone();
    OcrWorker::spawn("ocr-tesseract", move || TesseractEngine::new(data_path.as_deref(), &lang))
}

#[cfg(not(feature = "tesseract"))]
fn start_tesseract(_ocr: &OcrSettings) -> Result<OcrWorker, OcrError> {
    Err(OcrError::NotAvailable)
}

fn barcode_scanner(kind: BarcodeScannerKind) -> Result<Box<dyn BarcodeScanner>> {
    match kind {
        BarcodeScannerKind::None => Ok(Box::new(NoBarcodeScanner)),
        #[cfg(feature = "rxing")]
        BarcodeScannerKind::Rxing => Ok(Box::new(cardscan_ocr::barcode::rxing_backend::RxingScanner)),
        #[cfg(not(feature = "rxing"))]
        BarcodeScannerKind::Rxing => {
            anyhow::bail!("Barcode scanner 'rxing' not available: build with the `rxing` feature")
        }
    }
}
