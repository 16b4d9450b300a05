pub mod barcode;
pub mod field;
pub mod token;

pub use barcode::{BarcodeRecord, BoundingBox, Symbology};
pub use field::{FieldName, FieldSet, StudentCard};
pub use token::RecognizedToken;
