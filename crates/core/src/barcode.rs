use serde::{Deserialize, Serialize};
use std::fmt;

/// Barcode encoding standard, named the way zbar-style decoders report it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Symbology {
    #[serde(rename = "CODE128")]
    Code128,
    #[serde(rename = "EAN13")]
    Ean13,
    #[serde(rename = "CODE39")]
    Code39,
    Other(String),
}

impl Symbology {
    /// Linear symbologies that student cards print their ID with.
    pub fn carries_student_id(&self) -> bool {
        matches!(self, Symbology::Code128 | Symbology::Ean13 | Symbology::Code39)
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbology::Code128 => write!(f, "CODE128"),
            Symbology::Ean13 => write!(f, "EAN13"),
            Symbology::Code39 => write!(f, "CODE39"),
            Symbology::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Decoders spell formats differently ("CODE_128", "code128", "EAN-13"); only
/// the letters and digits count.
impl From<&str> for Symbology {
    fn from(s: &str) -> Self {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "CODE128" => Symbology::Code128,
            "EAN13" => Symbology::Ean13,
            "CODE39" => Symbology::Code39,
            _ => Symbology::Other(s.to_string()),
        }
    }
}

/// Axis-aligned region of the image the barcode was found in (pixels).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeRecord {
    pub symbology: Symbology,
    pub data: String,
    pub bbox: BoundingBox,
}

impl BarcodeRecord {
    pub fn new(symbology: Symbology, data: impl Into<String>, bbox: BoundingBox) -> Self {
        Self { symbology, data: data.into(), bbox }
    }
}
