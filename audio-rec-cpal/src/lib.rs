//! # audio-rec-cpal
//!
//! Microphone backend for audio-rec on any host cpal supports
//! (CoreAudio, ALSA, PulseAudio through ALSA, WASAPI).
//!
//! Provides:
//! - `CpalMicProvider`: grants input streams by device name, or the host's default input
//! - `CpalMicStream`: owns the cpal stream on its own thread and reports
//!   stream errors back to the session
//!
//! ## Usage
//! ```ignore
//! use audio_rec_core::{CaptureConfiguration, CaptureSession, CancelToken, WavEncoder};
//! use audio_rec_cpal::CpalMicProvider;
//!
//! let encoder = WavEncoder::new(Default::default())?;
//! let mut session = CaptureSession::new(CpalMicProvider::new(), encoder, CaptureConfiguration::default())?;
//! session.start(&CancelToken::new())?;
//! ```

pub mod error;
pub mod mic;

pub use error::CpalError;
pub use mic::{CpalMicProvider, CpalMicStream};
