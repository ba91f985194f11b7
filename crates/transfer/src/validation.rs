use std::path::{Component, Path};

use crate::TransferError;

/// Checks that an uploaded file name stays inside the storage root.
///
/// Names may contain subdirectories. Empty names, absolute paths, drive or
/// UNC prefixes and any `..` component are rejected.
pub fn validate_upload_path(file_name: &str) -> Result<(), TransferError> {
    let reject = |reason: &str| -> Result<(), TransferError> {
        Err(TransferError::InvalidPath(format!("{reason}: {file_name}")))
    };

    if file_name.trim().is_empty() {
        return Err(TransferError::InvalidPath("empty file name".into()));
    }

    let path = Path::new(file_name);
    if path.is_absolute() {
        return reject("absolute path");
    }

    for component in path.components() {
        match component {
            Component::ParentDir => return reject("parent traversal"),
            Component::Prefix(_) | Component::RootDir => return reject("absolute path"),
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    if !path.components().any(|c| matches!(c, Component::Normal(_))) {
        return reject("no file component");
    }

    Ok(())
}
