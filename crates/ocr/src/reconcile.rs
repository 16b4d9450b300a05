use cardscan_core::{BarcodeRecord, FieldSet};

use crate::pipeline::{CardScan, ExtractionError};

/// Data of the first barcode, in decoder order, printed in a symbology that
/// student cards use for their ID.
pub fn select_barcode_mssv(barcodes: &[BarcodeRecord]) -> Option<&str> {
    barcodes
        .iter()
        .find(|b| b.symbology.carries_student_id())
        .map(|b| b.data.as_str())
}

/// Cross-check the extracted fields against the barcode, then require every
/// field. A barcode/OCR mismatch is reported even when fields are missing.
pub fn reconcile(
    texts: Vec<String>,
    fields: FieldSet,
    barcodes: &[BarcodeRecord],
) -> Result<CardScan, ExtractionError> {
    let barcode_mssv = select_barcode_mssv(barcodes).map(str::to_string);

    if let (Some(barcode), Some(ocr)) = (&barcode_mssv, &fields.mssv) {
        if barcode != ocr {
            return Err(ExtractionError::MssvConflict {
                ocr: ocr.clone(),
                barcode: barcode.clone(),
            });
        }
    }

    let info = fields.into_card().map_err(ExtractionError::IncompleteFields)?;

    Ok(CardScan { texts, info, barcode_mssv })
}
