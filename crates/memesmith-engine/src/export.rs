use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use memesmith_contracts::image::EncodedImage;

pub const DEFAULT_EXPORT_STEM: &str = "meme-gen-image";

/// Where [`save_image`] would write `image` for the given target.
///
/// The written file always carries the extension of the image's MIME type.
/// A target whose extension names another format has it replaced.
pub fn export_path(image: &EncodedImage, target: &Path) -> PathBuf {
    let names_directory = target.is_dir()
        || target
            .as_os_str()
            .to_string_lossy()
            .ends_with(['/', std::path::MAIN_SEPARATOR]);
    if names_directory {
        return target.join(format!("{DEFAULT_EXPORT_STEM}.{}", image.extension()));
    }
    match target.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if extension_matches(ext, image.extension()) => target.to_path_buf(),
        _ => target.with_extension(image.extension()),
    }
}

fn extension_matches(requested: &str, expected: &str) -> bool {
    let requested = requested.to_ascii_lowercase();
    requested == expected || (expected == "jpg" && requested == "jpeg")
}

pub fn save_image(image: &EncodedImage, target: &Path) -> Result<PathBuf> {
    let path = export_path(image, target);
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, image.bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
