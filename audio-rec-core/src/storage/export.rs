use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::models::artifact::{hex_encode, Artifact, ArtifactReady};
use crate::models::error::CaptureError;
use crate::storage::metadata::{write_metadata, ArtifactMetadata};
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::export_sink::{ExportReceipt, ExportSink};

/// File name every export is saved under.
pub const EXPORT_FILE_NAME: &str = "audio.mp3";

/// Media type every export declares, whatever the encoder produced.
pub const EXPORT_MEDIA_TYPE: &str = "audio/mp3";

/// Saves artifacts as `audio.mp3` plus a JSON metadata sidecar.
///
/// Each export overwrites the previous one in the same directory.
#[derive(Debug, Clone)]
pub struct FileExportSink {
    output_directory: PathBuf,
}

impl FileExportSink {
    pub fn new(output_directory: impl Into<PathBuf>) -> Self {
        Self {
            output_directory: output_directory.into(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Path the next export will be written to.
    pub fn export_path(&self) -> PathBuf {
        self.output_directory.join(EXPORT_FILE_NAME)
    }
}

impl ExportSink for FileExportSink {
    fn export(&self, artifact: &Artifact) -> Result<ExportReceipt, CaptureError> {
        fs::create_dir_all(&self.output_directory)
            .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;

        let path = self.export_path();
        fs::write(&path, artifact.payload())
            .map_err(|e| CaptureError::StorageError(format!("failed to write artifact: {}", e)))?;

        let checksum = sha256_file(&path)?;
        let metadata = ArtifactMetadata::for_export(artifact, EXPORT_FILE_NAME, EXPORT_MEDIA_TYPE, &checksum);
        write_metadata(&metadata, &path)?;

        Ok(ExportReceipt {
            path,
            media_type: EXPORT_MEDIA_TYPE.to_string(),
            size_bytes: artifact.len() as u64,
            checksum,
        })
    }
}

/// Subscribes an `ExportSink` to a capture session.
///
/// Exports every ready artifact synchronously. Failures are logged and
/// kept for inspection; they never reach back into the session.
pub struct ExportDelegate<S: ExportSink> {
    sink: S,
    last_receipt: Mutex<Option<ExportReceipt>>,
    last_error: Mutex<Option<CaptureError>>,
}

impl<S: ExportSink> ExportDelegate<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            last_receipt: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn last_receipt(&self) -> Option<ExportReceipt> {
        self.last_receipt.lock().clone()
    }

    pub fn last_error(&self) -> Option<CaptureError> {
        self.last_error.lock().clone()
    }
}

impl<S: ExportSink> CaptureDelegate for ExportDelegate<S> {
    fn on_artifact_ready(&self, ready: &ArtifactReady) {
        match self.sink.export(&ready.artifact) {
            Ok(receipt) => {
                log::info!(
                    "exported {} bytes as {} to {}",
                    receipt.size_bytes,
                    receipt.media_type,
                    receipt.path.display()
                );
                *self.last_receipt.lock() = Some(receipt);
                *self.last_error.lock() = None;
            }
            Err(e) => {
                log::error!("export of artifact {} failed: {}", ready.artifact.id(), e);
                *self.last_error.lock() = Some(e);
            }
        }
    }
}

/// Compute SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let data = fs::read(path)
        .map_err(|e| CaptureError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    Ok(hex_encode(&Sha256::digest(&data)))
}
