use serde::{Deserialize, Serialize};

/// Tunables for [`crate::CardPipeline`]. Every field has a default, so a
/// partial `[pipeline]` table is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longest image side after downscaling (pixels).
    pub max_dim: u32,
    /// Minimum Laplacian variance for an image to count as sharp.
    pub blur_threshold: f64,
    /// Tokens with confidence at or below this are dropped before extraction.
    pub min_token_confidence: f32,
    /// Side of the square window used for adaptive thresholding (pixels).
    pub threshold_window: u32,
    /// Subtracted from the local mean before comparing.
    pub threshold_bias: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_dim: 800,
            blur_threshold: 120.0,
            min_token_confidence: 0.4,
            threshold_window: 15,
            threshold_bias: 10,
        }
    }
}
