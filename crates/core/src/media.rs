//! Content-addressed media storage: a copy of the original bytes plus a
//! normalized derivative (orientation applied, bounded size, JPEG) used for
//! display and as the input to downstream models.

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::{Error, Result};

/// Copy the original file into `<root>/originals/<hh>/<hash>.<ext>`, where
/// `hh` is the first two hex chars of the content hash. Skips the copy if the
/// target already exists (same hash means same bytes).
pub fn store_original(root: &Path, hash: &str, src: &Path) -> Result<PathBuf> {
    let ext = src
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    let target = shard_path(root, "originals", hash, &ext);

    if !target.exists() {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(src, &target)?;
    }
    Ok(target)
}

/// Write the normalized derivative to `<root>/derived/<hh>/<hash>.jpg`:
/// orientation applied, longest edge bounded by `max_edge`. Skips re-encoding
/// if the target already exists.
pub fn store_derivative(
    root: &Path,
    hash: &str,
    img: &DynamicImage,
    orientation: u8,
    max_edge: u32,
) -> Result<PathBuf> {
    let target = shard_path(root, "derived", hash, "jpg");
    if target.exists() {
        return Ok(target);
    }
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let oriented = apply_orientation(img.clone(), orientation);
    let bounded = if oriented.width() > max_edge || oriented.height() > max_edge {
        oriented.thumbnail(max_edge, max_edge)
    } else {
        oriented
    };
    // JPEG has no alpha channel
    bounded.to_rgb8().save(&target)?;
    Ok(target)
}

/// Validate that a configured media root exists and is a directory.
pub fn check_media_root(root: &Path) -> Result<()> {
    if !root.is_dir() {
        return Err(Error::MediaRootNotFound(root.to_path_buf()));
    }
    Ok(())
}

fn shard_path(root: &Path, kind: &str, hash: &str, ext: &str) -> PathBuf {
    let shard = &hash[..hash.len().min(2)];
    root.join(kind).join(shard).join(format!("{hash}.{ext}"))
}

fn apply_orientation(img: DynamicImage, orientation: u8) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
