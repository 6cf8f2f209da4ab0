use std::path::PathBuf;

use crate::models::artifact::Artifact;
use crate::models::error::CaptureError;

/// Where and how an artifact was persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReceipt {
    pub path: PathBuf,
    pub media_type: String,
    pub size_bytes: u64,
    pub checksum: String,
}

/// Persists a finished artifact (e.g. triggers a file save).
pub trait ExportSink: Send + Sync {
    fn export(&self, artifact: &Artifact) -> Result<ExportReceipt, CaptureError>;
}
