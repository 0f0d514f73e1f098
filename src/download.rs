//! Export download capture.
//!
//! The download wait is armed before the trigger is clicked so a fast
//! download cannot slip past. The finished file is copied next to its
//! destination under a temporary name and renamed into place; on any failure
//! the destination keeps whatever it held before.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::browser::{LabelQuery, PortalPage};
use crate::config::TimeoutConfig;
use crate::error::ScrapeError;

/// A downloaded export that has been persisted at its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    /// Where the browser originally wrote the file.
    pub source: PathBuf,
    pub destination: PathBuf,
    pub bytes: u64,
}

/// Click `trigger` on `page` and persist the resulting download at `destination`.
pub async fn capture_download(
    page: &dyn PortalPage,
    trigger: &LabelQuery,
    destination: &Path,
    timeouts: &TimeoutConfig,
) -> Result<ExportArtifact, ScrapeError> {
    let watch = page
        .arm_download()
        .await
        .map_err(|e| ScrapeError::download(format!("could not arm download listener: {e}")))?;

    page.click_label(trigger, timeouts.element)
        .await
        .map_err(|e| ScrapeError::download(format!("could not trigger export: {e}")))?;

    let file = watch
        .wait(timeouts.download)
        .await
        .map_err(|e| ScrapeError::download(e.to_string()))?;

    let bytes = persist_atomically(&file.path, destination).map_err(|e| {
        ScrapeError::download(format!(
            "could not save {} to {}: {e}",
            file.path.display(),
            destination.display()
        ))
    })?;

    info!(destination = %destination.display(), bytes, "Saved export");
    Ok(ExportArtifact {
        source: file.path.clone(),
        destination: destination.to_path_buf(),
        bytes,
    })
}

/// Copy `source` to `destination` via a temporary file in the destination's
/// directory, then rename it over the destination.
///
/// Returns the number of bytes written. Empty sources are rejected.
pub fn persist_atomically(source: &Path, destination: &Path) -> io::Result<u64> {
    let parent = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".partial-")
        .tempfile_in(parent)?;
    let mut input = File::open(source)?;
    let bytes = io::copy(&mut input, staged.as_file_mut())?;
    if bytes == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "downloaded file is empty",
        ));
    }
    staged.as_file().sync_all()?;
    staged.persist(destination).map_err(|e| e.error)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn persist_replaces_existing_destination() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("download.xlsx");
        let destination = dir.path().join("out").join("export.xlsx");
        std::fs::write(&source, b"new contents")?;
        std::fs::create_dir_all(destination.parent().unwrap())?;
        std::fs::write(&destination, b"old")?;

        let bytes = persist_atomically(&source, &destination)?;

        assert_eq!(bytes, 12);
        assert_eq!(std::fs::read(&destination)?, b"new contents");
        Ok(())
    }

    #[test]
    fn persist_keeps_destination_when_source_is_missing() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let destination = dir.path().join("export.xlsx");
        std::fs::write(&destination, b"previous run")?;

        assert!(persist_atomically(&dir.path().join("missing.xlsx"), &destination).is_err());

        assert_eq!(std::fs::read(&destination)?, b"previous run");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".partial-"))
            .collect();
        assert!(leftovers.is_empty());
        Ok(())
    }

    #[test]
    fn persist_rejects_empty_download() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("empty.xlsx");
        std::fs::write(&source, b"")?;
        let destination = dir.path().join("export.xlsx");

        assert!(persist_atomically(&source, &destination).is_err());
        assert!(!destination.exists());
        Ok(())
    }
}
