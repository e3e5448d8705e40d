//! Recursive directory copy.

use std::path::Path;

use ngstage_common::error::{Result, StageError};
use walkdir::WalkDir;

/// Copies the contents of `src` into `dst`, creating `dst` if needed.
///
/// Symbolic links are recreated rather than followed on Unix.
///
/// # Errors
///
/// Returns an error if any entry cannot be read or written.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e: std::io::Error| StageError::Io { path, source: e }
    };

    std::fs::create_dir_all(dst).map_err(io_err(dst))?;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            StageError::Io {
                path,
                source: e.into(),
            }
        })?;
        let relative = entry.path().strip_prefix(src).map_err(|_| StageError::Config {
            message: format!("{} is outside {}", entry.path().display(), src.display()),
        })?;
        let target = dst.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target).map_err(io_err(&target))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            let _ = std::fs::copy(entry.path(), &target).map_err(io_err(&target))?;
        }
    }

    tracing::debug!(src = %src.display(), dst = %dst.display(), "copied directory");
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    let pointee = std::fs::read_link(link).map_err(|e| StageError::Io {
        path: link.to_path_buf(),
        source: e,
    })?;
    std::os::unix::fs::symlink(pointee, target).map_err(|e| StageError::Io {
        path: target.to_path_buf(),
        source: e,
    })
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    std::fs::copy(link, target)
        .map(|_| ())
        .map_err(|e| StageError::Io {
            path: target.to_path_buf(),
            source: e,
        })
}
