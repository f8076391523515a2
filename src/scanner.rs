use crate::error::{LabelError, Result};
use image::ImageFormat;
use std::fs;
use std::path::{Path, PathBuf};

/// Formats the `image` backend is built with (see the crate features in Cargo.toml).
const DECODABLE_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Bmp,
    ImageFormat::Gif,
];

/// Lowercase file extensions, without the dot, that the decoder can read.
/// Used both for the open-file filter and for directory scans.
pub fn supported_extensions() -> Vec<&'static str> {
    DECODABLE_FORMATS
        .iter()
        .flat_map(|format| format.extensions_str().iter().copied())
        .collect()
}

pub fn has_supported_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions.iter().any(|candidate| *candidate == ext)
        })
        .unwrap_or(false)
}

/// Recursively collects every image under `root` whose extension is in
/// `extensions`, as absolute paths sorted by their lowercased string form.
pub fn scan_images(root: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(LabelError::DirectoryNotFound(root.to_path_buf()));
    }
    let root = absolute(root)?;

    let mut images = Vec::new();
    let mut pending = vec![root.clone()];
    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|e| LabelError::io(&dir, e))?;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                pending.push(path);
            } else if path.is_file() && has_supported_extension(&path, extensions) {
                images.push(path);
            }
        }
    }

    images.sort_by_cached_key(|path| path.to_string_lossy().to_lowercase());
    log::info!("Scanned {}: {} images", root.display(), images.len());
    Ok(images)
}

pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| LabelError::io(path, e))?;
    Ok(cwd.join(path))
}
