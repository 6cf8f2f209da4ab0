use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::models::audio_models::{AudioSource, MediaKind, StreamFormat};
use crate::models::error::CaptureError;
use crate::session::cancel::CancelToken;

/// Callback invoked when an audio buffer is available.
///
/// Parameters:
/// - `samples`: Interleaved f32 samples.
/// - `sample_rate`: The actual sample rate of the delivered audio.
/// - `channels`: Number of channels (1 = mono, 2 = stereo interleaved).
pub type AudioBufferCallback = Arc<dyn Fn(&[f32], u32, u16) + Send + Sync + 'static>;

/// Reports a failure of a running stream back to its session.
///
/// Backends call `report` from their capture thread when the input dies
/// mid-recording (device unplugged, driver error). The session then fails
/// the cycle instead of finalizing a truncated recording.
#[derive(Debug, Clone)]
pub struct StreamErrors {
    sender: Sender<CaptureError>,
}

impl StreamErrors {
    pub fn new(sender: Sender<CaptureError>) -> Self {
        Self { sender }
    }

    pub fn report(&self, error: CaptureError) {
        if self.sender.send(error).is_err() {
            log::debug!("stream error dropped: cycle already closed");
        }
    }
}

/// Grants access to a microphone-like input.
///
/// Implemented by:
/// - `WasapiMicProvider` (Windows)
/// - `CpalMicProvider` (macOS, Linux and other cpal hosts)
/// - `ToneProvider` (demo app, synthetic)
pub trait DeviceStreamProvider: Send {
    type Stream: DeviceStream;

    /// Whether at least one usable input device exists.
    fn is_available(&self) -> bool;

    /// Request an exclusively-owned input stream.
    ///
    /// `device_id` selects a specific input (as listed by
    /// `available_sources`); `None` means the system default. May block
    /// for as long as the user takes to answer a permission prompt.
    /// Implementations must poll `cancel` while waiting and return
    /// `CaptureError::Cancelled` once it fires.
    fn acquire(
        &mut self,
        kind: MediaKind,
        device_id: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<Self::Stream, CaptureError>;

    /// Input devices this provider can open.
    fn available_sources(&self) -> Result<Vec<AudioSource>, CaptureError>;
}

/// An acquired input stream. Owned by exactly one session at a time.
pub trait DeviceStream: Send {
    /// Native format the stream delivers.
    fn format(&self) -> StreamFormat;

    /// Information about the device backing this stream.
    fn source(&self) -> AudioSource;

    /// Start delivering buffers to `callback`.
    ///
    /// The callback may fire on a dedicated audio thread; keep it light.
    /// Failures after a successful start go to `errors`.
    fn start(&mut self, callback: AudioBufferCallback, errors: StreamErrors) -> Result<(), CaptureError>;

    /// Stop all underlying tracks and release the device. Idempotent.
    fn release(&mut self);

    /// Whether the device is still held and delivering (false once released
    /// or once the capture thread has died).
    fn is_live(&self) -> bool;
}
