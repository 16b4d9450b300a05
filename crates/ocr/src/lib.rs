pub mod barcode;
pub mod config;
pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod quality;
pub mod recognizer;
pub mod reconcile;

pub use barcode::{BarcodeError, BarcodeScanner, MockBarcodeScanner, NoBarcodeScanner};
pub use config::PipelineConfig;
pub use extract::Extractor;
pub use pipeline::{CardPipeline, CardScan, ExtractionError};
pub use preprocess::{decode, encode_png, enhance, resize, PreprocessError};
pub use quality::{laplacian_variance, Quality, QualityGate};
pub use recognizer::{MockRecognizer, OcrBackend, OcrEngine, OcrError, OcrWorker};
pub use reconcile::{reconcile, select_barcode_mssv};
