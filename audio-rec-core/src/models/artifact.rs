use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The finalized, immutable result of one completed recording cycle.
///
/// The payload is the concatenation of every encoded chunk in arrival order.
/// `media_type` is what the session declares; `encoded_as` is what the
/// encoder actually produced. The two are allowed to disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    id: String,
    payload: Arc<[u8]>,
    media_type: String,
    encoded_as: String,
    chunk_count: usize,
    duration_secs: f64,
    created_at: String,
}

impl Artifact {
    /// Concatenate `chunks` in order into a new artifact.
    pub fn assemble(
        chunks: Vec<Vec<u8>>,
        media_type: &str,
        encoded_as: &str,
        duration_secs: f64,
    ) -> Self {
        let chunk_count = chunks.len();
        let total: usize = chunks.iter().map(Vec::len).sum();
        let mut payload = Vec::with_capacity(total);
        for chunk in chunks {
            payload.extend_from_slice(&chunk);
        }

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload: payload.into(),
            media_type: media_type.to_string(),
            encoded_as: encoded_as.to_string(),
            chunk_count,
            duration_secs,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Declared media type.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Media type the encoder actually produced.
    pub fn encoded_as(&self) -> &str {
        &self.encoded_as
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    /// SHA-256 hex digest of the payload.
    pub fn checksum(&self) -> String {
        hex_encode(&Sha256::digest(&self.payload))
    }
}

/// Opaque URI through which a playback surface can load an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayableRef(String);

impl PlayableRef {
    pub(crate) fn generate() -> Self {
        Self(format!("blob:audio-rec/{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Published once per completed cycle, after the session is back to idle.
#[derive(Debug, Clone)]
pub struct ArtifactReady {
    pub artifact: Arc<Artifact>,
    pub playable_reference: PlayableRef,
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
