//! Output directory precondition checks.
//!
//! Every run starts from an empty directory so that the set of page files
//! it leaves behind is never mixed with a previous run's output. Hidden
//! entries (names starting with `.`) do not count, which lets editor or VCS
//! metadata live alongside the data.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::validation::ValidationError;

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "data";

/// Checks that `path` is either absent or an empty directory.
///
/// # Errors
///
/// Returns [`ValidationError::OutputDirNotEmpty`] when a visible entry is
/// present, [`ValidationError::OutputNotDirectory`] when `path` is a file, and
/// [`ValidationError::OutputDirIo`] when the directory cannot be read.
pub fn ensure_empty(path: &Path) -> Result<(), ValidationError> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "output directory does not exist yet");
            return Ok(());
        }
        Err(e) => return Err(ValidationError::output_io(path, e)),
    };

    if !metadata.is_dir() {
        return Err(ValidationError::OutputNotDirectory {
            path: path.to_path_buf(),
        });
    }

    let entries = fs::read_dir(path).map_err(|e| ValidationError::output_io(path, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ValidationError::output_io(path, e))?;
        if !entry.file_name().to_string_lossy().starts_with('.') {
            return Err(ValidationError::OutputDirNotEmpty {
                path: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

/// Verifies the emptiness precondition and creates the directory if needed.
///
/// # Errors
///
/// Returns the errors of [`ensure_empty`], plus
/// [`ValidationError::OutputDirIo`] when creation fails.
pub fn prepare(path: &Path) -> Result<(), ValidationError> {
    ensure_empty(path)?;
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| ValidationError::output_io(path, e))?;
        info!(dir = %path.display(), "Created output directory");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_directory_is_accepted() {
        let temp = TempDir::new().unwrap();
        assert!(ensure_empty(&temp.path().join("data")).is_ok());
    }

    #[test]
    fn test_empty_directory_is_accepted() {
        let temp = TempDir::new().unwrap();
        assert!(ensure_empty(temp.path()).is_ok());
    }

    #[test]
    fn test_hidden_entries_are_ignored() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".gitkeep"), b"").unwrap();
        assert!(ensure_empty(temp.path()).is_ok());
    }

    #[test]
    fn test_visible_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("0.xml"), b"<result/>").unwrap();
        assert!(matches!(
            ensure_empty(temp.path()),
            Err(ValidationError::OutputDirNotEmpty { .. })
        ));
    }

    #[test]
    fn test_visible_subdirectory_is_rejected() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("old-run")).unwrap();
        assert!(matches!(
            ensure_empty(temp.path()),
            Err(ValidationError::OutputDirNotEmpty { .. })
        ));
    }

    #[test]
    fn test_file_path_is_rejected() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("data");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            ensure_empty(&file),
            Err(ValidationError::OutputNotDirectory { .. })
        ));
    }

    #[test]
    fn test_prepare_creates_nested_directory() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("a").join("b");
        prepare(&target).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_prepare_refuses_non_empty_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("500.xml"), b"x").unwrap();
        assert!(prepare(temp.path()).is_err());
        assert!(temp.path().join("500.xml").exists());
    }
}
