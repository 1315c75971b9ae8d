//! File moves for the organizer.
//!
//! Destinations are never overwritten: a taken name gets a `_1`, `_2`, ...
//! suffix before the extension.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// First free path for `file_name` inside `dir`
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    let extension = name.extension().map(|e| e.to_string_lossy().to_string());

    let mut n = 1u32;
    loop {
        let numbered = match &extension {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        let candidate = dir.join(numbered);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Move `source` to `dest`, copying across filesystems
///
/// The fallback copy is size-verified before the source is deleted.
pub fn move_file(source: &Path, dest: &Path) -> io::Result<()> {
    if !source.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("source file not found: {}", source.display()),
        ));
    }

    fs::rename(source, dest).or_else(|_| {
        let source_size = fs::metadata(source)?.len();
        fs::copy(source, dest)?;

        let dest_size = fs::metadata(dest)?.len();
        if dest_size != source_size {
            let _ = fs::remove_file(dest);
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!(
                    "copy verification failed: source {} bytes, dest {} bytes",
                    source_size, dest_size
                ),
            ));
        }

        fs::remove_file(source)
    })
}

/// Move `source` into `dir` as `file_name`, creating `dir` if needed
///
/// Returns where the file ended up.
pub fn move_into(source: &Path, dir: &Path, file_name: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let dest = unique_destination(dir, file_name);
    move_file(source, &dest)?;
    Ok(dest)
}
