use crossbeam_channel::Sender;

use crate::models::audio_models::StreamFormat;
use crate::models::error::CaptureError;
use crate::traits::device_provider::AudioBufferCallback;

/// Events an encoder emits toward its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// Encoded bytes covering the stream since the previous chunk.
    Chunk(Vec<u8>),
    /// Flush completed; no further chunks for this cycle.
    Done,
    /// The encoder cannot continue.
    Failed(String),
}

/// Sending half of a session's per-cycle event channel.
#[derive(Debug, Clone)]
pub struct EncoderEvents {
    sender: Sender<EncoderEvent>,
}

impl EncoderEvents {
    pub fn new(sender: Sender<EncoderEvent>) -> Self {
        Self { sender }
    }

    /// Emit a chunk. Empty chunks are not emitted.
    pub fn chunk(&self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        self.send(EncoderEvent::Chunk(bytes));
    }

    pub fn done(&self) {
        self.send(EncoderEvent::Done);
    }

    pub fn fail(&self, reason: impl Into<String>) {
        self.send(EncoderEvent::Failed(reason.into()));
    }

    fn send(&self, event: EncoderEvent) {
        // The session drops the receiver when the cycle ends; late events have nowhere to go.
        if self.sender.send(event).is_err() {
            log::debug!("encoder event dropped: cycle already closed");
        }
    }
}

/// Turns a live stream into discrete encoded byte chunks.
///
/// Lifecycle per recording cycle: `bind` → `begin` → (chunks) → `flush` →
/// final chunk + `Done`. The session owns the device stream; the encoder
/// only sees samples through the callback returned by `bind`.
pub trait Encoder: Send {
    /// Media type of the bytes this encoder actually produces.
    fn media_type(&self) -> &str;

    /// Attach to a freshly acquired stream.
    ///
    /// Returns the callback the session hands to `DeviceStream::start`.
    /// Any state from a previous cycle is discarded.
    fn bind(
        &mut self,
        format: StreamFormat,
        events: EncoderEvents,
    ) -> Result<AudioBufferCallback, CaptureError>;

    /// Start accepting audio.
    fn begin(&mut self) -> Result<(), CaptureError>;

    /// Stop accepting audio, emit whatever is staged, then `Done`.
    fn flush(&mut self) -> Result<(), CaptureError>;
}
