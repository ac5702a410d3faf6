use std::io::{BufReader, Cursor};
use std::path::Path;

use fast_image_resize::{self as fir, images::Image as FirImage};
use image::DynamicImage;

/// Compute average hash (aHash) and difference hash (dHash) for an image file.
/// Returns (ahash, dhash) as u64 values, or None if the image cannot be decoded.
/// Both hashes are 8x8 = 64-bit; the aHash is the stored perceptual fingerprint
/// and the dHash is kept alongside it for dual-hash consensus.
///
/// EXIF orientation is applied before resizing, so photos with rotation tags
/// (common on iPhone originals) produce the same hash as physically-rotated
/// exports.
pub fn compute_perceptual_hashes(path: &Path) -> Option<(u64, u64)> {
    let img = image::open(path).ok()?;
    let orientation = read_exif_orientation(path);
    hashes_from_image(&img, orientation)
}

/// Hash an already-decoded image. The pipeline decodes each photo once and
/// reuses it for hashing, embedding, and face extraction.
pub fn hashes_from_image(img: &DynamicImage, orientation: u8) -> Option<(u64, u64)> {
    let pixels = reduce_9x8_grayscale(img, orientation)?;
    Some((compute_ahash(&pixels), compute_dhash(&pixels)))
}

/// Read EXIF orientation tag (1-8) from a file. Returns 1 (normal) if missing
/// or unreadable.
pub fn read_exif_orientation(path: &Path) -> u8 {
    let read = || -> Option<u8> {
        let file = std::fs::File::open(path).ok()?;
        let mut reader = BufReader::new(file);
        orientation_from_reader(&mut reader)
    };
    read().unwrap_or(1)
}

/// Read EXIF orientation from raw image bytes. Returns 1 if missing.
pub fn orientation_from_bytes(bytes: &[u8]) -> u8 {
    let mut cursor = Cursor::new(bytes);
    orientation_from_reader(&mut cursor).unwrap_or(1)
}

fn orientation_from_reader<R: std::io::BufRead + std::io::Seek>(reader: &mut R) -> Option<u8> {
    let exif = exif::Reader::new().read_from_container(reader).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0).map(|v| v as u8)
}

/// Apply EXIF orientation to an RGB buffer, returning the corrected buffer and
/// new dimensions. Handles all 8 EXIF orientation values.
///
/// Orientations:
/// 1: Normal                    5: Mirror + rotate 90° CW
/// 2: Mirror horizontal         6: Rotate 90° CW
/// 3: Rotate 180°               7: Mirror + rotate 90° CCW
/// 4: Mirror vertical           8: Rotate 90° CCW
fn apply_orientation_rgb(
    buf: &[u8],
    w: usize,
    h: usize,
    orientation: u8,
) -> (Vec<u8>, usize, usize) {
    if orientation <= 1 || orientation > 8 {
        return (buf.to_vec(), w, h);
    }

    let pixel_count = w * h;
    let mut out = vec![0u8; pixel_count * 3];
    let (new_w, new_h) = if orientation >= 5 { (h, w) } else { (w, h) };

    for y in 0..h {
        for x in 0..w {
            let src_idx = (y * w + x) * 3;
            let (dx, dy) = match orientation {
                2 => (w - 1 - x, y),
                3 => (w - 1 - x, h - 1 - y),
                4 => (x, h - 1 - y),
                5 => (y, x),
                6 => (h - 1 - y, x),
                7 => (h - 1 - y, w - 1 - x),
                8 => (y, w - 1 - x),
                _ => (x, y),
            };
            let dst_idx = (dy * new_w + dx) * 3;
            out[dst_idx..dst_idx + 3].copy_from_slice(&buf[src_idx..src_idx + 3]);
        }
    }
    (out, new_w, new_h)
}

/// Reduce a decoded image to the 9x8 grayscale buffer both hashes are
/// computed from: orientation correction, SIMD resize of the RGB data to 9x8,
/// then grayscale conversion of only those 72 pixels (BT.601).
fn reduce_9x8_grayscale(img: &DynamicImage, orientation: u8) -> Option<[u8; 72]> {
    let rgb = img.to_rgb8();
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    if w == 0 || h == 0 {
        return None;
    }

    let (rgb_data, w, h) = apply_orientation_rgb(rgb.as_raw(), w, h, orientation);

    let src = FirImage::from_vec_u8(w as u32, h as u32, rgb_data, fir::PixelType::U8x3).ok()?;
    let mut dst = FirImage::new(9, 8, fir::PixelType::U8x3);
    fir::Resizer::new().resize(&src, &mut dst, None).ok()?;

    let rgb_buf = dst.buffer();
    let mut gray = [0u8; 72];
    for i in 0..72 {
        let r = rgb_buf[i * 3] as f32;
        let g = rgb_buf[i * 3 + 1] as f32;
        let b = rgb_buf[i * 3 + 2] as f32;
        gray[i] = (0.299 * r + 0.587 * g + 0.114 * b) as u8;
    }
    Some(gray)
}

/// Compute average hash (aHash) from 9x8 grayscale pixels.
/// Uses the left 8x8 block. Each bit = 1 if pixel >= mean, 0 otherwise.
fn compute_ahash(pixels: &[u8]) -> u64 {
    let mut block = [0u8; 64];
    for row in 0..8 {
        for col in 0..8 {
            block[row * 8 + col] = pixels[row * 9 + col];
        }
    }

    let mean: u64 = block.iter().map(|&p| p as u64).sum::<u64>() / 64;
    let mut hash: u64 = 0;
    for (i, &pixel) in block.iter().enumerate() {
        if pixel as u64 >= mean {
            hash |= 1 << i;
        }
    }
    hash
}

/// Compute difference hash (dHash) from 9x8 grayscale pixels.
/// For each row of 9 pixels, compare adjacent pairs → 8 bits per row × 8 rows.
fn compute_dhash(pixels: &[u8]) -> u64 {
    let mut hash: u64 = 0;
    let mut bit = 0;
    for row in 0..8 {
        for col in 0..8 {
            let left = pixels[row * 9 + col];
            let right = pixels[row * 9 + col + 1];
            if left > right {
                hash |= 1 << bit;
            }
            bit += 1;
        }
    }
    hash
}

/// Compute the Hamming distance between two hash values.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}
