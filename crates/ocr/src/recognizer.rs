use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use cardscan_core::RecognizedToken;
use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("OCR worker is not running")]
    WorkerGone,
    #[error("Tesseract not available: build with the `tesseract` feature")]
    NotAvailable,
}

/// Shared OCR capability. Implementations must be callable from many request
/// threads at once; engines that are not thread-safe go behind [`OcrWorker`].
pub trait OcrBackend: Send + Sync {
    /// Recognized text in reading order, with per-token confidence.
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RecognizedToken>, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for Arc<T> {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RecognizedToken>, OcrError> {
        (**self).recognize(image)
    }
}

impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RecognizedToken>, OcrError> {
        (**self).recognize(image)
    }
}

/// An OCR engine confined to the thread that created it.
pub trait OcrEngine {
    fn recognize(&mut self, image: &DynamicImage) -> Result<Vec<RecognizedToken>, OcrError>;
}

impl<T: OcrEngine + ?Sized> OcrEngine for Box<T> {
    fn recognize(&mut self, image: &DynamicImage) -> Result<Vec<RecognizedToken>, OcrError> {
        (**self).recognize(image)
    }
}

// ── Serialized worker ────────────────────────────────────────────────────────

type Reply = mpsc::Sender<Result<Vec<RecognizedToken>, OcrError>>;

/// Owns one engine on a dedicated thread and feeds it jobs one at a time.
///
/// The engine is built on the worker thread, once, when the worker spawns.
/// Requests queue on an unbounded channel; dropping the worker stops the thread
/// after the queue drains.
pub struct OcrWorker {
    jobs: mpsc::Sender<(DynamicImage, Reply)>,
}

impl OcrWorker {
    /// Spawn the worker and wait for `init` to finish. Engine start-up errors
    /// are returned here rather than on the first request.
    pub fn spawn<E, F>(name: &str, init: F) -> Result<Self, OcrError>
    where
        E: OcrEngine,
        F: FnOnce() -> Result<E, OcrError> + Send + 'static,
    {
        let (jobs, queue) = mpsc::channel::<(DynamicImage, Reply)>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), OcrError>>();

        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut engine = match init() {
                    Ok(engine) => {
                        let _ = ready_tx.send(Ok(()));
                        engine
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                for (image, reply) in queue {
                    let _ = reply.send(engine.recognize(&image));
                }
                tracing::debug!("OCR worker queue closed");
            })
            .map_err(|e| OcrError::Engine(format!("failed to start OCR worker: {e}")))?;

        ready_rx.recv().map_err(|_| OcrError::WorkerGone)??;
        Ok(Self { jobs })
    }
}

impl OcrBackend for OcrWorker {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RecognizedToken>, OcrError> {
        let (reply, result) = mpsc::channel();
        self.jobs
            .send((image.clone(), reply))
            .map_err(|_| OcrError::WorkerGone)?;
        result.recv().map_err(|_| OcrError::WorkerGone)?
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns preset tokens (or a preset failure) and counts how often it ran.
/// Lets the pipeline be exercised without an OCR engine installed.
pub struct MockRecognizer {
    outcome: Result<Vec<RecognizedToken>, String>,
    calls: AtomicUsize,
}

impl MockRecognizer {
    pub fn new(tokens: Vec<RecognizedToken>) -> Self {
        Self { outcome: Ok(tokens), calls: AtomicUsize::new(0) }
    }

    /// Every token gets full confidence.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Self::new(texts.iter().map(|t| RecognizedToken::new(t.as_ref(), 1.0)).collect())
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { outcome: Err(message.into()), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn respond(&self) -> Result<Vec<RecognizedToken>, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone().map_err(OcrError::Engine)
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image: &DynamicImage) -> Result<Vec<RecognizedToken>, OcrError> {
        self.respond()
    }
}

impl OcrEngine for MockRecognizer {
    fn recognize(&mut self, _image: &DynamicImage) -> Result<Vec<RecognizedToken>, OcrError> {
        self.respond()
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrEngine, OcrError};
    use crate::preprocess::encode_png;
    use cardscan_core::RecognizedToken;
    use image::DynamicImage;
    use leptess::LepTess;

    /// One Tesseract instance; the model is loaded in [`TesseractEngine::new`].
    /// Not thread-safe: run it inside an [`super::OcrWorker`].
    pub struct TesseractEngine {
        lt: LepTess,
    }

    impl TesseractEngine {
        pub fn new(data_path: Option<&str>, lang: &str) -> Result<Self, OcrError> {
            let lt = LepTess::new(data_path, lang).map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(Self { lt })
        }
    }

    impl OcrEngine for TesseractEngine {
        /// One token per non-empty line, each carrying the page's mean confidence.
        fn recognize(&mut self, image: &DynamicImage) -> Result<Vec<RecognizedToken>, OcrError> {
            let png = encode_png(image).map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            self.lt
                .set_image_from_mem(&png)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            let text = self.lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))?;
            let confidence = self.lt.mean_text_conf() as f32 / 100.0;
            Ok(text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| RecognizedToken::new(l, confidence))
                .collect())
        }
    }
}
