use serde::{Deserialize, Serialize};

/// One piece of text reported by the OCR engine, in reading order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecognizedToken {
    pub text: String,
    /// Engine confidence (0.0–1.0).
    pub confidence: f32,
}

impl RecognizedToken {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self { text: text.into(), confidence: confidence.clamp(0.0, 1.0) }
    }

    /// Tokens at or below `min_confidence` are treated as noise.
    pub fn passes(&self, min_confidence: f32) -> bool {
        self.confidence > min_confidence
    }
}
