//! Writes a [`BuildResult`] to disk.
//!
//! All target paths are validated against the output directory before any
//! byte is written, content goes to `<name>.tmp` files first, and the temp
//! files are renamed into place only once every write succeeded.

// Writing the final output is the one place outside the Runtime that needs std::fs
#![allow(clippy::disallowed_methods)]

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;

use super::BuildResult;
use crate::{Error, Result};

struct WriteOp<'a> {
    target: PathBuf,
    content: &'a [u8],
    permissions: Option<u32>,
}

pub(crate) fn write_result_to(result: &BuildResult, dir: &Path, filename: &str) -> Result<()> {
    let dir = normalize_dir(dir)?;

    fs::create_dir_all(&dir).map_err(|e| {
        Error::WriteFailure(format!(
            "Failed to create output directory '{}': {}",
            dir.display(),
            e
        ))
    })?;

    let map_json = result.source_map.as_ref().map(|map| map.to_json_string());

    let mut operations = vec![WriteOp {
        target: validate_output_path(&dir, filename)?,
        content: result.code.as_bytes(),
        permissions: None,
    }];

    if let Some(json) = &map_json {
        operations.push(WriteOp {
            target: validate_output_path(&dir, &format!("{filename}.map"))?,
            content: json.as_bytes(),
            permissions: None,
        });
    }

    for (name, asset) in &result.assets {
        operations.push(WriteOp {
            target: validate_output_path(&dir, name)?,
            content: &asset.source,
            permissions: asset.permissions,
        });
    }

    write_files_atomic(&operations)?;
    tracing::debug!(
        "wrote {} files to {}",
        operations.len(),
        dir.display()
    );
    Ok(())
}

fn normalize_dir(dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }

    let cwd = std::env::current_dir().map_err(|e| {
        Error::InvalidOutputPath(format!("Failed to get current directory: {}", e))
    })?;
    Ok(cwd.join(cleaned).clean())
}

/// Reject names that would land outside `base_dir`.
fn validate_output_path(base_dir: &Path, name: &str) -> Result<PathBuf> {
    if name.contains('\0') {
        return Err(Error::InvalidOutputPath(format!(
            "'{}' contains a null byte",
            name.escape_default()
        )));
    }

    let full_path = base_dir.join(Path::new(name).clean()).clean();
    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(Error::InvalidOutputPath(format!(
            "'{}' escapes output directory '{}'",
            name,
            base_dir.display()
        )));
    }

    Ok(full_path)
}

fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_files_atomic(operations: &[WriteOp<'_>]) -> Result<()> {
    let mut temp_files: Vec<(PathBuf, &WriteOp<'_>)> = Vec::new();

    for op in operations {
        if let Some(parent) = op.target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                cleanup_temp_files(&temp_files);
                Error::WriteFailure(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let temp_path = temp_path_for(&op.target);
        fs::write(&temp_path, op.content).map_err(|e| {
            cleanup_temp_files(&temp_files);
            Error::WriteFailure(format!(
                "Failed to write temporary file '{}': {}",
                temp_path.display(),
                e
            ))
        })?;

        temp_files.push((temp_path, op));
    }

    for (temp_path, op) in &temp_files {
        fs::rename(temp_path, &op.target).map_err(|e| {
            cleanup_temp_files(&temp_files);
            Error::WriteFailure(format!(
                "Failed to rename '{}' to '{}': {}",
                temp_path.display(),
                op.target.display(),
                e
            ))
        })?;

        if let Some(mode) = op.permissions {
            apply_permissions(&op.target, mode)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn apply_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| {
        Error::WriteFailure(format!(
            "Failed to set permissions on '{}': {}",
            path.display(),
            e
        ))
    })
}

#[cfg(not(unix))]
fn apply_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

fn cleanup_temp_files(temp_files: &[(PathBuf, &WriteOp<'_>)]) {
    for (temp_path, _) in temp_files {
        if temp_path.exists() {
            if let Err(e) = fs::remove_file(temp_path) {
                tracing::warn!(
                    "Failed to clean up temporary file '{}': {}",
                    temp_path.display(),
                    e
                );
            }
        }
    }
}
