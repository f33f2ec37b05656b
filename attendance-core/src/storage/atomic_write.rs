//! Temp file + rename writes
//!
//! The temp file is created next to the destination so the final rename never
//! crosses a filesystem boundary.

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    if !parent.exists() {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| e.error)?;

    #[cfg(unix)]
    {
        // Best-effort: the rename already succeeded.
        if let Err(e) = std::fs::File::open(parent).and_then(|d| d.sync_all()) {
            log::debug!("Directory sync failed for {:?}: {}", parent, e);
        }
    }

    Ok(())
}
