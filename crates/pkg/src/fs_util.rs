//! Filesystem helpers: every deterministic output is written to a
//! temporary file in the target directory, then renamed into place.

use std::fs;
use std::path::Path;

use crate::PkgResult;

/// Write bytes atomically (create new file, rename into place).
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> PkgResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    std::io::Write::write_all(&mut tmp, bytes)?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Copy a file atomically into `dst`.
pub fn copy_file_atomic(src: &Path, dst: &Path) -> PkgResult<()> {
    let bytes = fs::read(src)?;
    write_bytes_atomic(dst, &bytes)
}
