use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::artifact::Artifact;
use crate::models::error::CaptureError;

/// Metadata stored alongside an exported artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub id: String,
    pub file_name: String,
    pub media_type: String,
    pub encoded_as: String,
    pub size_bytes: u64,
    pub checksum: String,
    pub created_at: String,
    pub duration_secs: f64,
    pub chunk_count: usize,
}

impl ArtifactMetadata {
    pub fn for_export(artifact: &Artifact, file_name: &str, media_type: &str, checksum: &str) -> Self {
        Self {
            id: artifact.id().to_string(),
            file_name: file_name.to_string(),
            media_type: media_type.to_string(),
            encoded_as: artifact.encoded_as().to_string(),
            size_bytes: artifact.len() as u64,
            checksum: checksum.to_string(),
            created_at: artifact.created_at().to_string(),
            duration_secs: artifact.duration_secs(),
            chunk_count: artifact.chunk_count(),
        }
    }
}

/// Write artifact metadata as a JSON sidecar file.
///
/// `audio.mp3` gets `audio.metadata.json` next to it.
pub fn write_metadata(metadata: &ArtifactMetadata, artifact_path: &Path) -> Result<(), CaptureError> {
    let metadata_path = artifact_path.with_extension("metadata.json");
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| CaptureError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&metadata_path, json)
        .map_err(|e| CaptureError::StorageError(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read artifact metadata from a JSON sidecar file.
pub fn read_metadata(artifact_path: &Path) -> Result<ArtifactMetadata, CaptureError> {
    let metadata_path = artifact_path.with_extension("metadata.json");
    let json = fs::read_to_string(&metadata_path)
        .map_err(|e| CaptureError::StorageError(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| CaptureError::StorageError(format!("failed to parse metadata: {}", e)))
}
