//! cpal microphone stream provider.
//!
//! Devices are addressed by their cpal name, which doubles as the source ID.
//! Every sample format cpal hands over (F32, I16, U16) is converted to f32
//! before it reaches the `AudioBufferCallback`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};

use audio_rec_core::{
    AudioBufferCallback, AudioSource, CancelToken, CaptureError, DeviceStream, DeviceStreamProvider, MediaKind,
    StreamErrors, StreamFormat,
};

use crate::error::CpalError;

/// Hands out cpal input streams from the default host.
#[derive(Debug, Default)]
pub struct CpalMicProvider;

impl CpalMicProvider {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceStreamProvider for CpalMicProvider {
    type Stream = CpalMicStream;

    fn is_available(&self) -> bool {
        match cpal::default_host().input_devices() {
            Ok(mut devices) => devices.next().is_some(),
            Err(e) => {
                log::debug!("could not list input devices: {}", e);
                false
            }
        }
    }

    fn acquire(
        &mut self,
        kind: MediaKind,
        device_id: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<CpalMicStream, CaptureError> {
        debug_assert_eq!(kind, MediaKind::Audio);
        cancel.check()?;

        let host = cpal::default_host();
        let device = find_input_device(&host, device_id)?;
        let name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());
        let supported = device.default_input_config().map_err(CpalError::from)?;
        cancel.check()?;

        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let format = StreamFormat::new(config.sample_rate.0, config.channels);
        log::info!(
            "microphone granted: {} ({} Hz, {} ch, {:?})",
            name,
            format.sample_rate,
            format.channels,
            sample_format
        );

        Ok(CpalMicStream {
            source: AudioSource {
                id: name.clone(),
                is_default: device_id.is_none() || default_input_name(&host).as_deref() == Some(name.as_str()),
                name,
                transport_type: None,
            },
            requested: device_id.map(str::to_string),
            format,
            sample_format,
            config,
            live: Arc::new(AtomicBool::new(true)),
            worker: None,
            released: false,
        })
    }

    fn available_sources(&self) -> Result<Vec<AudioSource>, CaptureError> {
        let host = cpal::default_host();
        let default_name = default_input_name(&host);
        let devices = host.input_devices().map_err(CpalError::from)?;
        Ok(devices
            .filter_map(|device| device.name().ok())
            .map(|name| AudioSource {
                id: name.clone(),
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                transport_type: None,
            })
            .collect())
    }
}

fn default_input_name(host: &cpal::Host) -> Option<String> {
    host.default_input_device().and_then(|device| device.name().ok())
}

fn find_input_device(host: &cpal::Host, device_id: Option<&str>) -> Result<cpal::Device, CpalError> {
    match device_id {
        Some(name) => host
            .input_devices()?
            .find(|device| device.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| CpalError::DeviceNotFound(name.to_string())),
        None => host.default_input_device().ok_or(CpalError::NoDefaultDevice),
    }
}

/// An acquired cpal input.
///
/// `cpal::Stream` cannot leave the thread that built it on every host, so
/// the stream is built, played and dropped on a dedicated capture thread.
/// `start` waits for that thread to report whether the stream is playing.
/// A stream error marks the stream dead and is reported once through
/// `StreamErrors`.
pub struct CpalMicStream {
    source: AudioSource,
    requested: Option<String>,
    format: StreamFormat,
    sample_format: SampleFormat,
    config: StreamConfig,
    live: Arc<AtomicBool>,
    worker: Option<Worker>,
    released: bool,
}

struct Worker {
    stop: Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl DeviceStream for CpalMicStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn source(&self) -> AudioSource {
        self.source.clone()
    }

    fn start(&mut self, callback: AudioBufferCallback, errors: StreamErrors) -> Result<(), CaptureError> {
        if self.released {
            return Err(CaptureError::InvalidState("stream already released".into()));
        }
        if self.worker.is_some() {
            return Err(CaptureError::InvalidState("mic capture already running".into()));
        }

        let (ready_tx, ready_rx) = bounded(1);
        let (stop_tx, stop_rx) = bounded(1);
        let setup = CaptureSetup {
            requested: self.requested.clone(),
            sample_format: self.sample_format,
            config: self.config.clone(),
            live: Arc::clone(&self.live),
            callback,
            errors,
        };

        let handle = thread::Builder::new()
            .name("cpal-mic-capture".into())
            .spawn(move || setup.run(ready_tx, stop_rx))
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn mic thread: {}", e)))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(CaptureError::Unknown("mic thread exited during setup".into())));
        if let Err(e) = ready {
            if handle.join().is_err() {
                log::error!("mic capture thread panicked");
            }
            self.live.store(false, Ordering::SeqCst);
            return Err(e);
        }

        self.worker = Some(Worker { stop: stop_tx, handle });
        Ok(())
    }

    fn release(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.stop.send(()).is_err() {
                log::debug!("mic thread already gone");
            }
            if worker.handle.join().is_err() {
                log::error!("mic capture thread panicked");
            }
        }
        self.live.store(false, Ordering::SeqCst);
        self.released = true;
    }

    fn is_live(&self) -> bool {
        !self.released && self.live.load(Ordering::SeqCst)
    }
}

impl Drop for CpalMicStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Everything the capture thread needs to open the device on its own.
struct CaptureSetup {
    requested: Option<String>,
    sample_format: SampleFormat,
    config: StreamConfig,
    live: Arc<AtomicBool>,
    callback: AudioBufferCallback,
    errors: StreamErrors,
}

impl CaptureSetup {
    /// Capture thread body: open, play, hold until stopped, drop.
    fn run(self, ready: Sender<Result<(), CaptureError>>, stop: Receiver<()>) {
        let stream = match self.open() {
            Ok(stream) => stream,
            Err(e) => {
                log::error!("could not open microphone: {}", e);
                report_setup(&ready, Err(e.into()));
                return;
            }
        };
        if let Err(e) = stream.play() {
            let e = CpalError::from(e);
            log::error!("could not start microphone: {}", e);
            report_setup(&ready, Err(e.into()));
            return;
        }
        log::debug!("cpal capture running");
        report_setup(&ready, Ok(()));

        if stop.recv().is_err() {
            log::debug!("mic stream owner dropped without stopping");
        }
        if let Err(e) = stream.pause() {
            log::debug!("failed to pause input stream: {}", e);
        }
        drop(stream);
        log::debug!("cpal capture stopped");
    }

    fn open(&self) -> Result<cpal::Stream, CpalError> {
        let host = cpal::default_host();
        let device = find_input_device(&host, self.requested.as_deref())?;
        match self.sample_format {
            SampleFormat::F32 => self.build::<f32>(&device, |sample| sample),
            SampleFormat::I16 => self.build::<i16>(&device, i16_to_f32),
            SampleFormat::U16 => self.build::<u16>(&device, u16_to_f32),
            other => Err(CpalError::UnsupportedFormat(format!("{:?}", other))),
        }
    }

    fn build<T: SizedSample + 'static>(&self, device: &cpal::Device, convert: fn(T) -> f32) -> Result<cpal::Stream, CpalError> {
        let callback = Arc::clone(&self.callback);
        let sample_rate = self.config.sample_rate.0;
        let channels = self.config.channels;
        let mut converted = Vec::new();

        let live = Arc::clone(&self.live);
        let errors = self.errors.clone();
        let mut reported = false;
        let err_fn = move |err: cpal::StreamError| {
            log::error!("input stream error: {}", err);
            // Only the first failure ends the cycle; it is queued before the stream reads as dead.
            if !reported {
                reported = true;
                errors.report(CpalError::from(err).into());
            }
            live.store(false, Ordering::SeqCst);
        };

        let stream = device.build_input_stream(
            &self.config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                convert_samples(&mut converted, data, convert);
                callback(&converted, sample_rate, channels);
            },
            err_fn,
            None,
        )?;
        Ok(stream)
    }
}

fn report_setup(ready: &Sender<Result<(), CaptureError>>, result: Result<(), CaptureError>) {
    if ready.send(result).is_err() {
        log::debug!("mic setup result dropped");
    }
}

fn convert_samples<T: Copy>(out: &mut Vec<f32>, data: &[T], convert: fn(T) -> f32) {
    out.clear();
    out.extend(data.iter().map(|&sample| convert(sample)));
}

fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32_768.0
}

fn u16_to_f32(sample: u16) -> f32 {
    (sample as f32 - 32_768.0) / 32_768.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn integer_samples_map_onto_unit_range() {
        assert_relative_eq!(i16_to_f32(i16::MIN), -1.0);
        assert_relative_eq!(i16_to_f32(0), 0.0);
        assert_relative_eq!(i16_to_f32(16_384), 0.5);

        assert_relative_eq!(u16_to_f32(0), -1.0);
        assert_relative_eq!(u16_to_f32(32_768), 0.0);
        assert_relative_eq!(u16_to_f32(u16::MAX), 32_767.0 / 32_768.0);
    }

    #[test]
    fn conversion_reuses_the_scratch_buffer() {
        let mut out = vec![9.0; 8];
        convert_samples(&mut out, &[0i16, i16::MIN], i16_to_f32);
        assert_eq!(out, vec![0.0, -1.0]);

        convert_samples(&mut out, &[32_768u16], u16_to_f32);
        assert_eq!(out, vec![0.0]);
    }

    #[test]
    fn cancelled_request_never_opens_a_device() {
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = CpalMicProvider::new().acquire(MediaKind::Audio, None, &cancel);

        assert!(matches!(result, Err(CaptureError::Cancelled)));
    }

    #[test]
    fn unknown_device_name_is_unavailable() {
        let result = CpalMicProvider::new().acquire(
            MediaKind::Audio,
            Some("no such microphone 7f3a"),
            &CancelToken::new(),
        );

        match result {
            Err(CaptureError::DeviceUnavailable) | Err(CaptureError::PermissionDenied) => {}
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("unknown device was granted"),
        }
    }
}
