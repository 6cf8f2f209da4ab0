//! WASAPI microphone stream provider.
//!
//! Grants a microphone stream from a WASAPI capture endpoint in shared mode.
//! Delivers Float32 samples via the `AudioBufferCallback`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use windows::core::PCWSTR;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use audio_rec_core::{
    AudioBufferCallback, AudioSource, CancelToken, CaptureError, DeviceStream, DeviceStreamProvider, MediaKind,
    StreamErrors, StreamFormat,
};

use crate::device_enumerator::DeviceEnumerator;
use crate::error::{WasapiError, WasapiResultExt};
use crate::permissions::check_microphone_access;

/// Hands out WASAPI microphone streams.
///
/// The endpoint is chosen per `acquire`: the requested device ID, or the
/// system default capture device when none is given.
#[derive(Debug, Default)]
pub struct WasapiMicProvider;

impl WasapiMicProvider {
    pub fn new() -> Self {
        Self
    }

    fn describe(device_id: Option<&str>) -> AudioSource {
        with_com(|| {
            DeviceEnumerator::new()
                .and_then(|e| e.source_for(device_id))
                .map_err(CaptureError::from)
        })
        .unwrap_or_else(|e| {
            log::debug!("could not describe capture device: {}", e);
            AudioSource {
                id: device_id.unwrap_or("default-mic").to_string(),
                name: "Default Microphone".into(),
                is_default: device_id.is_none(),
                transport_type: None,
            }
        })
    }
}

impl DeviceStreamProvider for WasapiMicProvider {
    type Stream = WasapiMicStream;

    fn is_available(&self) -> bool {
        self.available_sources()
            .map(|sources| !sources.is_empty())
            .unwrap_or(false)
    }

    fn acquire(
        &mut self,
        kind: MediaKind,
        device_id: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<WasapiMicStream, CaptureError> {
        debug_assert_eq!(kind, MediaKind::Audio);
        cancel.check()?;
        let format = check_microphone_access(device_id)?.into_result()?;
        cancel.check()?;

        let source = Self::describe(device_id);
        log::info!(
            "microphone granted: {} ({} Hz, {} ch)",
            source.name,
            format.sample_rate,
            format.channels
        );
        Ok(WasapiMicStream {
            device_id: device_id.map(str::to_string),
            source,
            format,
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
            released: false,
        })
    }

    fn available_sources(&self) -> Result<Vec<AudioSource>, CaptureError> {
        with_com(|| {
            DeviceEnumerator::new()
                .and_then(|e| e.list_capture_devices())
                .map_err(CaptureError::from)
        })
    }
}

/// An acquired microphone endpoint.
///
/// Audio buffers are delivered on a dedicated high-priority thread
/// registered with MMCSS. If that thread fails it reports
/// `DeviceUnavailable` through the stream's `StreamErrors` and the stream
/// stops being live. `release` stops and joins the thread.
pub struct WasapiMicStream {
    device_id: Option<String>,
    source: AudioSource,
    format: StreamFormat,
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
    released: bool,
}

impl DeviceStream for WasapiMicStream {
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
        if self.capture_handle.lock().is_some() {
            return Err(CaptureError::InvalidState("mic capture already running".into()));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let device_id = self.device_id.clone();

        let handle = thread::Builder::new()
            .name("wasapi-mic-capture".into())
            .spawn(move || {
                let result = mic_capture_loop(Arc::clone(&running), device_id, callback);
                running.store(false, Ordering::SeqCst);
                if let Err(e) = result {
                    log::error!("mic capture stopped: {}", e);
                    errors.report(CaptureError::DeviceUnavailable);
                }
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::Unknown(format!("failed to spawn mic thread: {}", e))
            })?;

        *self.capture_handle.lock() = Some(handle);
        Ok(())
    }

    fn release(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            if handle.join().is_err() {
                log::error!("mic capture thread panicked");
            }
        }
        self.released = true;
    }

    /// False once released, or once a started capture thread has exited.
    fn is_live(&self) -> bool {
        if self.released {
            return false;
        }
        self.capture_handle.lock().is_none() || self.running.load(Ordering::SeqCst)
    }
}

impl Drop for WasapiMicStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Run `f` with COM initialized (MTA) on the calling thread.
fn with_com<T>(f: impl FnOnce() -> Result<T, CaptureError>) -> Result<T, CaptureError> {
    unsafe {
        CoInitializeEx(None, COINIT_MULTITHREADED)
            .ok()
            .map_err(|e| CaptureError::Unknown(format!("CoInitializeEx failed: {}", e)))?;
        let _com_guard = CoUninitializeGuard;
        f()
    }
}

/// Capture thread body.
///
/// Opens the endpoint in shared mode, registers with MMCSS for real-time
/// priority, then polls for packets every 10 ms until `running` clears.
fn mic_capture_loop(
    running: Arc<AtomicBool>,
    device_id: Option<String>,
    callback: AudioBufferCallback,
) -> Result<(), WasapiError> {
    unsafe {
        CoInitializeEx(None, COINIT_MULTITHREADED).ok().call("CoInitializeEx")?;
        let _com_guard = CoUninitializeGuard;

        let device = DeviceEnumerator::new()?.capture_device(device_id.as_deref())?;
        let audio_client: IAudioClient = device.Activate(CLSCTX_ALL, None).call("IMMDevice::Activate")?;

        let mix_format_ptr = audio_client.GetMixFormat().call("GetMixFormat")?;
        let sample_rate = (*mix_format_ptr).nSamplesPerSec;
        let channels = (*mix_format_ptr).nChannels;

        // 100 ms shared-mode buffer, in 100-nanosecond units
        let initialized = audio_client.Initialize(
            AUDCLNT_SHAREMODE_SHARED,
            AUDCLNT_STREAMFLAGS_NOPERSIST,
            1_000_000,
            0,
            mix_format_ptr,
            None,
        );
        CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
        initialized.call("IAudioClient::Initialize")?;

        let capture_client: IAudioCaptureClient = audio_client.GetService().call("GetService")?;

        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        let _mmcss_handle = AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index);

        audio_client.Start().call("IAudioClient::Start")?;
        log::debug!("wasapi capture running: {} Hz, {} ch", sample_rate, channels);

        let result = (|| -> Result<(), WasapiError> {
            let mut silence = Vec::new();
            while running.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(10));

                let mut packet_length = capture_client.GetNextPacketSize().call("GetNextPacketSize")?;
                while packet_length > 0 {
                    let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                    let mut num_frames: u32 = 0;
                    let mut flags: u32 = 0;
                    capture_client
                        .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                        .call("GetBuffer")?;

                    if num_frames > 0 && !buffer_ptr.is_null() {
                        let total_samples = num_frames as usize * channels as usize;
                        // Shared mode delivers Float32.
                        if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                            silence.clear();
                            silence.resize(total_samples, 0.0f32);
                            callback(&silence, sample_rate, channels);
                        } else {
                            let samples = std::slice::from_raw_parts(buffer_ptr as *const f32, total_samples);
                            callback(samples, sample_rate, channels);
                        }
                    }

                    capture_client.ReleaseBuffer(num_frames).call("ReleaseBuffer")?;
                    packet_length = capture_client.GetNextPacketSize().call("GetNextPacketSize")?;
                }
            }
            Ok(())
        })();

        let _ = audio_client.Stop();
        result
    }
}

/// RAII guard to call CoUninitialize when dropped.
struct CoUninitializeGuard;

impl Drop for CoUninitializeGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
