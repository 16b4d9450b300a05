use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cardscan_core::BarcodeRecord;
use image::GrayImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BarcodeError {
    #[error("Barcode decoder error: {0}")]
    Decoder(String),
}

/// Barcode decoding capability. Finding nothing is `Ok(vec![])`, not an error.
///
/// The pipeline hands scanners the resized grayscale image *before*
/// binarization; thresholding tends to break thin bars apart.
pub trait BarcodeScanner: Send + Sync {
    fn scan(&self, image: &GrayImage) -> Result<Vec<BarcodeRecord>, BarcodeError>;
}

impl<T: BarcodeScanner + ?Sized> BarcodeScanner for Arc<T> {
    fn scan(&self, image: &GrayImage) -> Result<Vec<BarcodeRecord>, BarcodeError> {
        (**self).scan(image)
    }
}

impl<T: BarcodeScanner + ?Sized> BarcodeScanner for Box<T> {
    fn scan(&self, image: &GrayImage) -> Result<Vec<BarcodeRecord>, BarcodeError> {
        (**self).scan(image)
    }
}

/// Used when no decoder is configured: every image has no barcode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBarcodeScanner;

impl BarcodeScanner for NoBarcodeScanner {
    fn scan(&self, _image: &GrayImage) -> Result<Vec<BarcodeRecord>, BarcodeError> {
        Ok(Vec::new())
    }
}

/// Returns preset records (or a preset failure) and counts how often it ran.
pub struct MockBarcodeScanner {
    outcome: Result<Vec<BarcodeRecord>, String>,
    calls: AtomicUsize,
}

impl MockBarcodeScanner {
    pub fn new(records: Vec<BarcodeRecord>) -> Self {
        Self { outcome: Ok(records), calls: AtomicUsize::new(0) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { outcome: Err(message.into()), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BarcodeScanner for MockBarcodeScanner {
    fn scan(&self, _image: &GrayImage) -> Result<Vec<BarcodeRecord>, BarcodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone().map_err(BarcodeError::Decoder)
    }
}

// ── rxing backend (optional, gated behind `rxing` feature) ────────────────────

#[cfg(feature = "rxing")]
pub mod rxing_backend {
    use super::{BarcodeError, BarcodeScanner};
    use cardscan_core::{BarcodeRecord, BoundingBox, Symbology};
    use image::GrayImage;

    /// Multi-format decoder working directly on the luma buffer.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct RxingScanner;

    impl BarcodeScanner for RxingScanner {
        fn scan(&self, image: &GrayImage) -> Result<Vec<BarcodeRecord>, BarcodeError> {
            let found = match rxing::helpers::detect_multiple_in_luma(
                image.as_raw().clone(),
                image.width(),
                image.height(),
            ) {
                Ok(found) => found,
                Err(rxing::Exceptions::NotFoundException(_)) => return Ok(Vec::new()),
                Err(e) => return Err(BarcodeError::Decoder(e.to_string())),
            };

            Ok(found
                .iter()
                .map(|r| {
                    let symbology = symbology(r.getBarcodeFormat());
                    BarcodeRecord::new(symbology, r.getText(), bounding_box(r.getPoints()))
                })
                .collect())
        }
    }

    /// rxing format names ("CODE_128", "EAN_13") as card symbologies.
    pub(crate) fn symbology(format: impl std::fmt::Debug) -> Symbology {
        Symbology::from(format!("{format:?}").as_str())
    }

    fn bounding_box(points: &[rxing::Point]) -> BoundingBox {
        if points.is_empty() {
            return BoundingBox::default();
        }
        let (min_x, max_x) = points.iter().fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
        let (min_y, max_y) = points.iter().fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
        BoundingBox {
            left: min_x.max(0.0) as u32,
            top: min_y.max(0.0) as u32,
            width: (max_x - min_x).max(0.0) as u32,
            height: (max_y - min_y).max(0.0) as u32,
        }
    }
}
