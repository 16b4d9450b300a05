use image::GrayImage;

/// Outcome of the sharpness check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quality {
    Clear { score: f64 },
    Blurry { score: f64 },
}

impl Quality {
    pub fn score(self) -> f64 {
        match self {
            Quality::Clear { score } | Quality::Blurry { score } => score,
        }
    }

    pub fn is_clear(self) -> bool {
        matches!(self, Quality::Clear { .. })
    }
}

/// Rejects images too blurry for OCR to read reliably.
#[derive(Debug, Clone, Copy)]
pub struct QualityGate {
    threshold: f64,
}

impl QualityGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn assess(&self, gray: &GrayImage) -> Quality {
        self.classify(laplacian_variance(gray))
    }

    /// The boundary is inclusive: a score equal to the threshold is clear.
    pub fn classify(&self, score: f64) -> Quality {
        if score >= self.threshold {
            Quality::Clear { score }
        } else {
            Quality::Blurry { score }
        }
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(120.0)
    }
}

/// Variance of the 3x3 Laplacian response `[0,1,0; 1,-4,1; 0,1,0]`.
///
/// Every pixel contributes; neighbours outside the image are mirrored without
/// repeating the edge pixel (`dcb|abcd|cba`), so the score matches what
/// OpenCV-style tooling reports for the same image.
pub fn laplacian_variance(img: &GrayImage) -> f64 {
    let (w, h) = (img.width() as i64, img.height() as i64);
    if w == 0 || h == 0 {
        return 0.0;
    }

    let px = |x: i64, y: i64| img.get_pixel(reflect101(x, w), reflect101(y, h))[0] as f64;

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for y in 0..h {
        for x in 0..w {
            let lap = px(x, y - 1) + px(x, y + 1) + px(x - 1, y) + px(x + 1, y) - 4.0 * px(x, y);
            sum += lap;
            sum_sq += lap * lap;
        }
    }

    let n = (w * h) as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

fn reflect101(i: i64, len: i64) -> u32 {
    if len == 1 {
        return 0;
    }
    let r = if i < 0 {
        -i
    } else if i >= len {
        2 * len - 2 - i
    } else {
        i
    };
    r.clamp(0, len - 1) as u32
}
