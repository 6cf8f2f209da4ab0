//! Synthetic microphone: a sine tone delivered on its own thread.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use audio_rec_core::{
    AudioBufferCallback, AudioSource, AudioTransportType, CancelToken, CaptureError, DeviceStream,
    DeviceStreamProvider, MediaKind, StreamErrors, StreamFormat,
};

const BLOCK_MS: u32 = 10;
const TONE_SOURCE_ID: &str = "tone";

/// Hands out tone streams; stands in for a microphone where none is wired up.
pub struct ToneProvider {
    format: StreamFormat,
    frequency_hz: f32,
}

impl ToneProvider {
    pub fn new(format: StreamFormat, frequency_hz: f32) -> Self {
        Self { format, frequency_hz }
    }
}

impl DeviceStreamProvider for ToneProvider {
    type Stream = ToneStream;

    fn is_available(&self) -> bool {
        true
    }

    fn acquire(
        &mut self,
        _kind: MediaKind,
        device_id: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<ToneStream, CaptureError> {
        cancel.check()?;
        if let Some(id) = device_id.filter(|id| *id != TONE_SOURCE_ID) {
            log::warn!("no tone source named {:?}", id);
            return Err(CaptureError::DeviceUnavailable);
        }
        Ok(ToneStream {
            format: self.format,
            frequency_hz: self.frequency_hz,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            released: false,
        })
    }

    fn available_sources(&self) -> Result<Vec<AudioSource>, CaptureError> {
        Ok(vec![tone_source(self.frequency_hz)])
    }
}

pub struct ToneStream {
    format: StreamFormat,
    frequency_hz: f32,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    released: bool,
}

impl DeviceStream for ToneStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn source(&self) -> AudioSource {
        tone_source(self.frequency_hz)
    }

    fn start(&mut self, callback: AudioBufferCallback, _errors: StreamErrors) -> Result<(), CaptureError> {
        if self.released || self.handle.is_some() {
            return Err(CaptureError::InvalidState("tone stream cannot start twice".into()));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let StreamFormat { sample_rate, channels } = self.format;
        let step = TAU * self.frequency_hz / sample_rate as f32;

        let handle = thread::Builder::new()
            .name("tone-generator".into())
            .spawn(move || {
                let frames = (sample_rate * BLOCK_MS / 1000) as usize;
                let mut block = vec![0.0f32; frames * channels as usize];
                let mut phase = 0.0f32;
                while running.load(Ordering::SeqCst) {
                    for frame in block.chunks_mut(channels as usize) {
                        frame.fill(0.25 * phase.sin());
                        phase = (phase + step) % TAU;
                    }
                    callback(&block, sample_rate, channels);
                    thread::sleep(Duration::from_millis(BLOCK_MS as u64));
                }
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn tone thread: {}", e)))?;

        self.handle = Some(handle);
        Ok(())
    }

    fn release(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("tone thread panicked");
            }
        }
        self.released = true;
    }

    fn is_live(&self) -> bool {
        !self.released
    }
}

impl Drop for ToneStream {
    fn drop(&mut self) {
        self.release();
    }
}

fn tone_source(frequency_hz: f32) -> AudioSource {
    AudioSource {
        id: TONE_SOURCE_ID.into(),
        name: format!("{} Hz test tone", frequency_hz),
        is_default: true,
        transport_type: Some(AudioTransportType::Virtual),
    }
}
