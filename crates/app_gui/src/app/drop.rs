use dandelion_core::{IntakeChannel, IntakeError, SubmittedFile};
use eframe::egui;
use std::path::Path;

/// Converts an egui drop into a submission candidate.
///
/// Web builds hand over bytes and a mime type; native builds usually only
/// provide a path. Returns `None` when the drop carries neither.
pub(super) fn submitted_from_drop(
    file: &egui::DroppedFile,
) -> Result<Option<SubmittedFile>, IntakeError> {
    let declared = Some(file.mime.trim())
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    if let Some(bytes) = &file.bytes {
        let name = if file.name.is_empty() {
            file.path
                .as_deref()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "dropped image".to_string())
        } else {
            file.name.clone()
        };
        return Ok(Some(SubmittedFile::from_bytes(
            name,
            declared,
            bytes.to_vec(),
            IntakeChannel::DragDrop,
        )));
    }

    let Some(path) = &file.path else {
        tracing::debug!("drop without bytes or path ignored");
        return Ok(None);
    };
    let mut submitted = SubmittedFile::from_path(path, IntakeChannel::DragDrop)?;
    if declared.is_some() {
        submitted.media_type = declared;
    }
    Ok(Some(submitted))
}
