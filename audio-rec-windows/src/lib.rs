//! # audio-rec-windows
//!
//! Windows WASAPI microphone backend for audio-rec.
//!
//! Provides:
//! - `WasapiMicProvider`: grants microphone streams from a WASAPI capture endpoint,
//!   reporting capture-thread failures back to the session
//! - `DeviceEnumerator`: capture device enumeration via MMDevice API
//! - `permissions`: Windows microphone privacy check
//!
//! ## Platform Requirements
//! - Windows 10 1803+ for the microphone privacy toggle
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use audio_rec_core::{CaptureConfiguration, CaptureSession, CancelToken, WavEncoder};
//! use audio_rec_windows::WasapiMicProvider;
//!
//! let provider = WasapiMicProvider::new();
//! let encoder = WavEncoder::new(Default::default())?;
//! let mut session = CaptureSession::new(provider, encoder, CaptureConfiguration::default())?;
//! session.start(&CancelToken::new())?;
//! ```

#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod error;
#[cfg(target_os = "windows")]
pub mod permissions;
#[cfg(target_os = "windows")]
pub mod wasapi_mic;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use permissions::MicrophoneAccess;
#[cfg(target_os = "windows")]
pub use wasapi_mic::{WasapiMicProvider, WasapiMicStream};
