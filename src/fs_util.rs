use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tempfile::Builder;

use crate::domain::COMPRESSED_SUFFIX;
use crate::error::SyncError;

/// `data.csv.gz` -> `data.csv`. Paths without the suffix are returned unchanged.
pub fn decompressed_path(compressed: &Path) -> PathBuf {
    match compressed
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(COMPRESSED_SUFFIX))
    {
        Some(stem) => compressed.with_file_name(stem),
        None => compressed.to_path_buf(),
    }
}

/// Decodes a single-member gzip file next to itself and removes the compressed file.
///
/// The whole compressed payload is read and decoded before anything is written, and the
/// target is replaced atomically, so a malformed stream never leaves a half-written file.
pub fn gunzip_in_place(compressed: &Path) -> Result<PathBuf, SyncError> {
    let target = decompressed_path(compressed);
    if target == compressed {
        return Err(SyncError::Decompress(format!(
            "{} has no {COMPRESSED_SUFFIX} suffix",
            compressed.display()
        )));
    }

    let raw = fs::read(compressed)
        .map_err(|err| SyncError::Filesystem(format!("read {}: {err}", compressed.display())))?;
    let mut decoded = Vec::new();
    GzDecoder::new(raw.as_slice())
        .read_to_end(&mut decoded)
        .map_err(|err| SyncError::Decompress(format!("{}: {err}", compressed.display())))?;

    write_bytes_atomic(&target, &decoded)?;
    fs::remove_file(compressed)
        .map_err(|err| SyncError::Filesystem(format!("remove {}: {err}", compressed.display())))?;
    Ok(target)
}

pub fn write_bytes_atomic(path: &Path, content: &[u8]) -> Result<(), SyncError> {
    let parent = path
        .parent()
        .ok_or_else(|| SyncError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent).map_err(|err| SyncError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix(".opendata-sync")
        .tempfile_in(parent)
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    temp.persist(path)
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    Ok(())
}
