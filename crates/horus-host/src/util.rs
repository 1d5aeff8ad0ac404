//! Small filesystem helpers shared by the metadata store and artifact writers.

use std::io::Write;
use std::path::Path;

use crate::error::{HorusResult, io_error};

/// Replace `path` with `contents` via a temp file in the same directory.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> HorusResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error(dir, e))?;
    tmp.write_all(contents).map_err(|e| io_error(path, e))?;
    tmp.flush().map_err(|e| io_error(path, e))?;
    tmp.persist(path).map_err(|e| io_error(path, e.error))?;
    Ok(())
}

pub(crate) fn read_to_string(path: &Path) -> HorusResult<String> {
    std::fs::read_to_string(path).map_err(|e| io_error(path, e))
}
