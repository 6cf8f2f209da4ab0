//! Scripted providers, encoders and subscribers for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::artifact::{Artifact, ArtifactReady};
use crate::models::audio_models::{AudioSource, MediaKind, StreamFormat};
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::session::cancel::CancelToken;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::device_provider::{AudioBufferCallback, DeviceStream, DeviceStreamProvider, StreamErrors};
use crate::traits::encoder::{Encoder, EncoderEvents};
use crate::traits::export_sink::{ExportReceipt, ExportSink};

/// How a `ScriptedProvider` answers `acquire`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Allow,
    Deny,
    NoDevice,
    /// Wait until the token is cancelled, then report `Cancelled`.
    WaitForCancel,
    /// Hand out a stream even though the token was cancelled meanwhile.
    AllowIgnoringCancel,
}

pub struct ScriptedProvider {
    grant: Arc<Mutex<Grant>>,
    pub format: StreamFormat,
    pub fail_stream_start: bool,
    pub acquisitions: Arc<AtomicUsize>,
    /// Liveness flag of every stream handed out, in order.
    pub streams: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
    /// Callback of the most recently started stream.
    pub callback: Arc<Mutex<Option<AudioBufferCallback>>>,
    /// Error reporter of the most recently started stream.
    pub stream_errors: Arc<Mutex<Option<StreamErrors>>>,
    /// `device_id` of every `acquire`, in order.
    pub requested_devices: Arc<Mutex<Vec<Option<String>>>>,
}

impl ScriptedProvider {
    pub fn new(grant: Grant) -> Self {
        Self {
            grant: Arc::new(Mutex::new(grant)),
            format: StreamFormat::new(8000, 1),
            fail_stream_start: false,
            acquisitions: Arc::new(AtomicUsize::new(0)),
            streams: Arc::new(Mutex::new(Vec::new())),
            callback: Arc::new(Mutex::new(None)),
            stream_errors: Arc::new(Mutex::new(None)),
            requested_devices: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Change the answer for later requests, even after moving into a session.
    pub fn set_grant(&self, grant: Grant) {
        *self.grant.lock() = grant;
    }

    pub fn live_streams(&self) -> usize {
        self.streams
            .lock()
            .iter()
            .filter(|live| live.load(Ordering::SeqCst))
            .count()
    }

    fn hand_out(&self) -> ScriptedStream {
        let live = Arc::new(AtomicBool::new(true));
        self.streams.lock().push(Arc::clone(&live));
        ScriptedStream {
            format: self.format,
            live,
            fail_start: self.fail_stream_start,
            callback: Arc::clone(&self.callback),
            stream_errors: Arc::clone(&self.stream_errors),
        }
    }

    /// Report a failure through the running stream, as a capture thread would.
    pub fn fail_running_stream(&self, error: CaptureError) {
        self.stream_errors
            .lock()
            .as_ref()
            .expect("no stream started")
            .report(error);
    }
}

impl DeviceStreamProvider for ScriptedProvider {
    type Stream = ScriptedStream;

    fn is_available(&self) -> bool {
        *self.grant.lock() != Grant::NoDevice
    }

    fn acquire(
        &mut self,
        _kind: MediaKind,
        device_id: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<ScriptedStream, CaptureError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.requested_devices.lock().push(device_id.map(str::to_string));
        let grant = *self.grant.lock();
        match grant {
            Grant::Allow | Grant::AllowIgnoringCancel => Ok(self.hand_out()),
            Grant::Deny => Err(CaptureError::PermissionDenied),
            Grant::NoDevice => Err(CaptureError::DeviceUnavailable),
            Grant::WaitForCancel => loop {
                cancel.check()?;
                thread::sleep(Duration::from_millis(2));
            },
        }
    }

    fn available_sources(&self) -> Result<Vec<AudioSource>, CaptureError> {
        if !self.is_available() {
            return Ok(Vec::new());
        }
        Ok(vec![test_source()])
    }
}

pub struct ScriptedStream {
    format: StreamFormat,
    live: Arc<AtomicBool>,
    fail_start: bool,
    callback: Arc<Mutex<Option<AudioBufferCallback>>>,
    stream_errors: Arc<Mutex<Option<StreamErrors>>>,
}

impl DeviceStream for ScriptedStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn source(&self) -> AudioSource {
        test_source()
    }

    fn start(&mut self, callback: AudioBufferCallback, errors: StreamErrors) -> Result<(), CaptureError> {
        if self.fail_start {
            return Err(CaptureError::DeviceUnavailable);
        }
        *self.callback.lock() = Some(callback);
        *self.stream_errors.lock() = Some(errors);
        Ok(())
    }

    fn release(&mut self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

fn test_source() -> AudioSource {
    AudioSource {
        id: "test-mic".into(),
        name: "Test Microphone".into(),
        is_default: true,
        transport_type: None,
    }
}

/// What a `ScriptedEncoder` does when flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushMode {
    /// Emit this final chunk (if non-empty) and `Done` immediately.
    Finish(Vec<u8>),
    /// Record the flush; the test emits `Done` itself.
    Defer,
    /// Return an error from `flush`.
    Reject,
}

/// Test-side handle onto a `ScriptedEncoder` that moved into a session.
#[derive(Clone)]
pub struct EncoderHandle {
    events: Arc<Mutex<Option<EncoderEvents>>>,
    pub binds: Arc<AtomicUsize>,
    pub flushes: Arc<AtomicUsize>,
}

impl EncoderHandle {
    pub fn emit(&self, bytes: Vec<u8>) {
        self.events.lock().as_ref().expect("encoder not bound").chunk(bytes);
    }

    pub fn done(&self) {
        self.events.lock().as_ref().expect("encoder not bound").done();
    }

    pub fn fail(&self, reason: &str) {
        self.events.lock().as_ref().expect("encoder not bound").fail(reason);
    }

    /// Drop the sender without finishing.
    pub fn hang_up(&self) {
        self.events.lock().take();
    }
}

pub struct ScriptedEncoder {
    pub flush_mode: FlushMode,
    pub fail_bind: bool,
    handle: EncoderHandle,
}

impl ScriptedEncoder {
    pub fn new(flush_mode: FlushMode) -> (Self, EncoderHandle) {
        let handle = EncoderHandle {
            events: Arc::new(Mutex::new(None)),
            binds: Arc::new(AtomicUsize::new(0)),
            flushes: Arc::new(AtomicUsize::new(0)),
        };
        (
            Self {
                flush_mode,
                fail_bind: false,
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl Encoder for ScriptedEncoder {
    fn media_type(&self) -> &str {
        "audio/webm"
    }

    fn bind(&mut self, _format: StreamFormat, events: EncoderEvents) -> Result<AudioBufferCallback, CaptureError> {
        self.handle.binds.fetch_add(1, Ordering::SeqCst);
        if self.fail_bind {
            return Err(CaptureError::EncoderFailure("codec unavailable".into()));
        }
        *self.handle.events.lock() = Some(events);
        Ok(Arc::new(|_: &[f32], _: u32, _: u16| {}))
    }

    fn begin(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CaptureError> {
        self.handle.flushes.fetch_add(1, Ordering::SeqCst);
        match &self.flush_mode {
            FlushMode::Finish(last) => {
                let events = self.handle.events.lock();
                let events = events
                    .as_ref()
                    .ok_or_else(|| CaptureError::InvalidState("not bound".into()))?;
                events.chunk(last.clone());
                events.done();
                Ok(())
            }
            FlushMode::Defer => Ok(()),
            FlushMode::Reject => Err(CaptureError::EncoderFailure("flush rejected".into())),
        }
    }
}

/// Records every notification it receives.
#[derive(Default)]
pub struct RecordingDelegate {
    pub states: Mutex<Vec<CaptureState>>,
    pub errors: Mutex<Vec<CaptureError>>,
    pub ready: Mutex<Vec<ArtifactReady>>,
}

impl CaptureDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: CaptureState) {
        self.states.lock().push(state);
    }

    fn on_error(&self, error: &CaptureError) {
        self.errors.lock().push(error.clone());
    }

    fn on_artifact_ready(&self, ready: &ArtifactReady) {
        self.ready.lock().push(ready.clone());
    }
}

/// Export sink that keeps what it was given.
#[derive(Default)]
pub struct RecordingSink {
    pub exported: Mutex<Vec<Artifact>>,
}

impl ExportSink for RecordingSink {
    fn export(&self, artifact: &Artifact) -> Result<ExportReceipt, CaptureError> {
        self.exported.lock().push(artifact.clone());
        Ok(ExportReceipt {
            path: "memory://audio.mp3".into(),
            media_type: "audio/mp3".into(),
            size_bytes: artifact.len() as u64,
            checksum: artifact.checksum(),
        })
    }
}

impl ExportSink for Arc<RecordingSink> {
    fn export(&self, artifact: &Artifact) -> Result<ExportReceipt, CaptureError> {
        self.as_ref().export(artifact)
    }
}
