use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::state::{lock, AppState};
use crate::viewer;

pub const UPLOAD_FAILED: &str = "Failed to upload the PDF. Please try again.";

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Reference to the currently loaded document.
///
/// Owns the transient on-disk copy that backs the viewer; dropping the
/// reference (or replacing it with the next upload) removes the copy.
#[derive(Debug)]
pub struct DocumentRef {
    /// Name the backend stored the file under; question calls reference it.
    pub remote_name: String,
    /// Snippet of extracted text returned by the upload, display only.
    pub preview_text: String,
    blob: NamedTempFile,
}

impl DocumentRef {
    pub fn blob_path(&self) -> &Path {
        self.blob.path()
    }
}

/// Why an upload did not start. None of these touch any state or the network.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{0} is not a PDF file")]
    NotAPdf(String),
    #[error("invalid file path")]
    InvalidPath,
    #[error("could not read the file: {0}")]
    Read(std::io::Error),
    #[error("could not stage the local copy: {0}")]
    Stage(std::io::Error),
}

/// Uploads the PDF at `path` and makes it the current document.
///
/// Files without the `%PDF-` magic are rejected up front. Otherwise the
/// document panel opens and the local preview loads before the upload is
/// sent; a preview parse failure only marks the viewer, the upload still
/// runs. On upload failure the staged copy is released again, any previously
/// loaded document is dropped and the fixed fallback line lands in the log.
pub async fn upload_pdf(state: &AppState, path: &Path) -> Result<(), UploadError> {
    let bytes = std::fs::read(path).map_err(UploadError::Read)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(UploadError::InvalidPath)?
        .to_string();
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(UploadError::NotAPdf(filename));
    }

    let mut blob = NamedTempFile::new().map_err(UploadError::Stage)?;
    blob.write_all(&bytes).map_err(UploadError::Stage)?;
    debug!(%filename, blob = %blob.path().display(), "staged local copy");

    state
        .panel_open
        .store(true, std::sync::atomic::Ordering::SeqCst);
    {
        let mut pane = lock(&state.viewer);
        match pdf_extract::extract_text_from_mem_by_pages(&bytes) {
            Ok(pages) => pane.load(pages),
            Err(err) => {
                warn!(error = ?err, %filename, "local preview failed");
                pane.fail(viewer::LOAD_ERROR);
            }
        }
    }

    let client = state.client();
    let outcome = client.upload_pdf(&filename, bytes).await;

    match outcome {
        Ok(uploaded) => {
            let message = format!("PDF \"{}\" loaded successfully.", uploaded.filename);
            *lock(&state.document) = Some(DocumentRef {
                remote_name: uploaded.filename,
                preview_text: uploaded.pdf_text,
                blob,
            });
            lock(&state.session).push_assistant(message);
        }
        Err(err) => {
            warn!(error = %err, %filename, "upload failed");
            drop(blob);
            *lock(&state.document) = None;
            lock(&state.viewer).clear();
            lock(&state.session).push_assistant(UPLOAD_FAILED);
        }
    }
    Ok(())
}
