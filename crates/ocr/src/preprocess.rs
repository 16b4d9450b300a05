use image::metadata::Orientation;
use image::{
    imageops, DynamicImage, GrayImage, ImageBuffer, ImageDecoder, ImageError, ImageReader, ImageResult,
    Luma, RgbaImage,
};
use imageproc::filter::gaussian_blur_f32;
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Decode an upload and turn it upright according to its EXIF orientation.
/// A missing or unreadable orientation tag leaves the pixels as stored.
pub fn decode(data: &[u8]) -> ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(ImageError::IoError)?
        .into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Scale down so the longer side is at most `max_dim`. Never scales up.
pub fn resize(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let longest = w.max(h);
    if longest <= max_dim || max_dim == 0 {
        return img;
    }

    let scale = max_dim as f64 / longest as f64;
    let new_w = ((w as f64 * scale) as u32).max(1);
    let new_h = ((h as f64 * scale) as u32).max(1);
    DynamicImage::ImageRgba8(resample_bilinear(&img.to_rgba8(), new_w, new_h))
}

/// Plain bilinear sampling at pixel centres, no antialiasing prefilter: each
/// output pixel blends the four source pixels around its centre. Sharpness
/// scores are calibrated against this resampler.
fn resample_bilinear(src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (src_w, src_h) = src.dimensions();
    let (step_x, step_y) = (src_w as f32 / width as f32, src_h as f32 / height as f32);
    let (max_x, max_y) = ((src_w - 1) as f32, (src_h - 1) as f32);

    ImageBuffer::from_fn(width, height, |x, y| {
        let u = ((x as f32 + 0.5) * step_x - 0.5).clamp(0.0, max_x);
        let v = ((y as f32 + 0.5) * step_y - 0.5).clamp(0.0, max_y);
        imageops::interpolate_bilinear(src, u, v).unwrap_or_else(|| *src.get_pixel(u as u32, v as u32))
    })
}

/// Local-adaptive binarization: a pixel turns white when it is brighter than
/// the Gaussian-weighted mean of its `window`-sized neighbourhood minus `bias`,
/// black otherwise. Borders replicate the edge pixels.
pub fn enhance(gray: &GrayImage, window: u32, bias: u8) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }

    let local = gaussian_blur_f32(gray, window_sigma(window));
    ImageBuffer::from_fn(w, h, |x, y| {
        let threshold = local.get_pixel(x, y)[0] as i16 - bias as i16;
        let p = gray.get_pixel(x, y)[0] as i16;
        Luma([if p > threshold { 255 } else { 0 }])
    })
}

/// Sigma of a `window`-tap Gaussian kernel when none is given explicitly
/// (OpenCV's `getGaussianKernel` default).
fn window_sigma(window: u32) -> f32 {
    0.3 * ((window.max(1) as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// PNG bytes, for engines that only accept encoded images.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::laplacian_variance;

    fn solid(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(width, height, |_, _| Luma([value])))
    }

    #[test]
    fn large_image_is_scaled_down_keeping_aspect() {
        let result = resize(solid(1600, 1200, 200), 800);
        assert_eq!((result.width(), result.height()), (800, 600));
    }

    #[test]
    fn portrait_image_limits_height() {
        let result = resize(solid(1000, 2000, 200), 800);
        assert_eq!((result.width(), result.height()), (400, 800));
    }

    #[test]
    fn small_image_is_never_upscaled() {
        let result = resize(solid(300, 200, 200), 800);
        assert_eq!((result.width(), result.height()), (300, 200));
    }

    #[test]
    fn image_at_limit_is_untouched() {
        let result = resize(solid(800, 10, 200), 800);
        assert_eq!((result.width(), result.height()), (800, 10));
    }

    #[test]
    fn enhance_outputs_only_black_and_white() {
        let gray: GrayImage = ImageBuffer::from_fn(40, 40, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let out = enhance(&gray, 15, 10);
        assert_eq!(out.dimensions(), gray.dimensions());
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn enhance_keeps_dark_strokes_on_light_paper() {
        // A dark vertical stroke in the middle of a light page.
        let gray: GrayImage = ImageBuffer::from_fn(30, 30, |x, _| {
            Luma([if (14..16).contains(&x) { 20u8 } else { 220u8 }])
        });
        let out = enhance(&gray, 15, 10);
        assert_eq!(out.get_pixel(15, 15)[0], 0);
        assert_eq!(out.get_pixel(2, 15)[0], 255);
    }

    #[test]
    fn enhance_flat_page_turns_white() {
        let gray = solid(20, 20, 128).to_luma8();
        let out = enhance(&gray, 15, 10);
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn enhance_weights_neighbours_by_distance() {
        // Column 13 is slightly darker than the page; a dark block starts 7px
        // away. A flat window mean would let the block drag the threshold down
        // and keep the column white; Gaussian weights barely see the block.
        let gray: GrayImage = ImageBuffer::from_fn(40, 30, |x, _| {
            Luma([match x {
                13 => 180u8,
                x if x >= 20 => 0,
                _ => 200,
            }])
        });
        let out = enhance(&gray, 15, 10);
        assert_eq!(out.get_pixel(13, 15)[0], 0);
        assert_eq!(out.get_pixel(5, 15)[0], 255);
    }

    #[test]
    fn window_sigma_follows_kernel_size() {
        assert!((window_sigma(15) - 2.6).abs() < 1e-6);
        assert!((window_sigma(3) - 0.8).abs() < 1e-6);
        assert!(window_sigma(0) > 0.0);
    }

    #[test]
    fn downscale_samples_without_smoothing() {
        // 2px-wide stripes halved become 1px stripes: bilinear sampling hits
        // the middle of each same-coloured pair, so contrast survives intact.
        let stripes: GrayImage = ImageBuffer::from_fn(1600, 8, |x, _| {
            Luma([if (x / 2) % 2 == 0 { 0u8 } else { 255u8 }])
        });
        let small = resize(DynamicImage::ImageLuma8(stripes), 800).to_luma8();
        assert_eq!(small.dimensions(), (800, 4));
        assert_eq!(small.get_pixel(0, 0)[0], 0);
        assert_eq!(small.get_pixel(1, 0)[0], 255);
        assert_eq!(small.get_pixel(798, 3)[0], 0);
        assert_eq!(small.get_pixel(799, 3)[0], 255);
        assert!((laplacian_variance(&small) - 260_100.0).abs() < 1e-6);
    }

    #[test]
    fn resize_blends_between_source_pixels() {
        // 3 -> 2 columns: output centres land at source x = 0.25 and 1.75.
        let src: GrayImage = ImageBuffer::from_fn(3, 1, |x, _| Luma([[0u8, 100, 200][x as usize]]));
        let out = resample_bilinear(&DynamicImage::ImageLuma8(src).to_rgba8(), 2, 1);
        assert!((24..=26).contains(&out.get_pixel(0, 0)[0]));
        assert!((174..=176).contains(&out.get_pixel(1, 0)[0]));
    }

    #[test]
    fn decode_applies_exif_orientation() {
        let wide = solid(40, 20, 90);
        let mut jpeg = Vec::new();
        wide.write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg).unwrap();

        // APP1 Exif segment: little-endian TIFF, one IFD entry, Orientation = 6
        // (rotate 90° clockwise).
        let app1: [u8; 36] = [
            0xFF, 0xE1, 0x00, 0x22, b'E', b'x', b'i', b'f', 0, 0, b'I', b'I', 0x2A, 0x00, 0x08, 0x00,
            0x00, 0x00, 0x01, 0x00, 0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        jpeg.splice(2..2, app1);

        let img = decode(&jpeg).unwrap();
        assert_eq!((img.width(), img.height()), (20, 40));
    }

    #[test]
    fn decode_keeps_plain_png_as_stored() {
        let png = encode_png(&solid(40, 20, 90)).unwrap();
        let img = decode(&png).unwrap();
        assert_eq!((img.width(), img.height()), (40, 20));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode(b"not an image at all").is_err());
    }

    #[test]
    fn encode_png_produces_png_header() {
        let result = encode_png(&solid(4, 4, 100)).unwrap();
        // PNG magic bytes: 0x89 0x50 0x4E 0x47
        assert_eq!(&result[..4], b"\x89PNG");
    }
}
