//! # audio-rec-core
//!
//! Platform-agnostic audio capture session library.
//!
//! Drives one capture cycle at a time: request the input device, stream
//! encoded chunks while recording, then finalize them into a single
//! [`Artifact`] that is published for playback and handed to subscribers
//! such as the file export sink. Platform backends (Windows WASAPI, the demo
//! tone generator) implement [`DeviceStreamProvider`] and plug into the
//! generic [`CaptureSession`].
//!
//! ## Architecture
//!
//! ```text
//! audio-rec-core (this crate)
//! ├── traits/       ← DeviceStreamProvider, Encoder, CaptureDelegate, ExportSink
//! ├── models/       ← CaptureError, CaptureState, CaptureConfiguration, Artifact, etc.
//! ├── processing/   ← ChunkBuffer, WavEncoder, WAV header generation
//! ├── session/      ← CaptureSession (generic orchestrator), CancelToken, SessionSlot
//! ├── playback/     ← PlaybackRegistry (playable references)
//! └── storage/      ← FileExportSink, ExportDelegate, metadata sidecar
//! ```

pub mod models;
pub mod playback;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use models::artifact::{Artifact, ArtifactReady, PlayableRef};
pub use models::audio_models::{AudioSource, AudioTransportType, CaptureDiagnostics, MediaKind, StreamFormat};
pub use models::config::{CaptureConfiguration, EncoderConfiguration};
pub use models::error::CaptureError;
pub use models::state::{CaptureSnapshot, CaptureState};
pub use playback::registry::PlaybackRegistry;
pub use processing::chunk_buffer::ChunkBuffer;
pub use processing::wav_encoder::WavEncoder;
pub use session::cancel::CancelToken;
pub use session::capture::CaptureSession;
pub use session::slot::SessionSlot;
pub use storage::export::{ExportDelegate, FileExportSink};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::device_provider::{AudioBufferCallback, DeviceStream, DeviceStreamProvider, StreamErrors};
pub use traits::encoder::{Encoder, EncoderEvent, EncoderEvents};
pub use traits::export_sink::{ExportReceipt, ExportSink};
