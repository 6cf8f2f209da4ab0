use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::StreamFormat;
use crate::models::config::EncoderConfiguration;
use crate::models::error::CaptureError;
use crate::processing::wav_format;
use crate::traits::device_provider::AudioBufferCallback;
use crate::traits::encoder::{Encoder, EncoderEvents};

/// Media type of everything `WavEncoder` produces.
pub const WAV_MEDIA_TYPE: &str = "audio/wav";

/// Streaming mono PCM/WAV encoder.
///
/// The first chunk of every cycle starts with a 44-byte header whose size
/// fields hold the streaming sentinel, followed by mono PCM at the stream's
/// native rate. With a timeslice configured, a chunk is emitted each time
/// that much audio is staged; otherwise everything goes out on flush.
///
/// Samples arrive on the device's audio thread, so staging lives behind a
/// `parking_lot::Mutex` shared with the callback.
pub struct WavEncoder {
    config: EncoderConfiguration,
    staging: Arc<Mutex<Staging>>,
}

struct Staging {
    format: StreamFormat,
    events: Option<EncoderEvents>,
    accepting: bool,
    pending: Vec<u8>,
    chunk_threshold: Option<usize>,
    format_mismatch_logged: bool,
}

impl Staging {
    fn unbound() -> Self {
        Self {
            format: StreamFormat::new(0, 0),
            events: None,
            accepting: false,
            pending: Vec::new(),
            chunk_threshold: None,
            format_mismatch_logged: false,
        }
    }

    fn ingest(&mut self, samples: &[f32], sample_rate: u32, channels: u16, bit_depth: u16) {
        if !self.accepting {
            return;
        }

        if sample_rate != self.format.sample_rate && !self.format_mismatch_logged {
            log::warn!(
                "stream delivered {} Hz, header declares {} Hz",
                sample_rate,
                self.format.sample_rate
            );
            self.format_mismatch_logged = true;
        }

        let mono = wav_format::downmix_to_mono(samples, channels.max(1) as usize);
        self.pending
            .extend_from_slice(&wav_format::convert_to_pcm(&mono, bit_depth));

        if let Some(threshold) = self.chunk_threshold {
            if self.pending.len() >= threshold {
                let chunk = std::mem::take(&mut self.pending);
                if let Some(ref events) = self.events {
                    events.chunk(chunk);
                }
            }
        }
    }
}

impl WavEncoder {
    pub fn new(config: EncoderConfiguration) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(Self {
            config,
            staging: Arc::new(Mutex::new(Staging::unbound())),
        })
    }

    pub fn config(&self) -> &EncoderConfiguration {
        &self.config
    }

    fn chunk_threshold(&self, format: StreamFormat) -> Option<usize> {
        self.config.timeslice_ms.map(|ms| {
            let bytes = wav_format::byte_rate(format.sample_rate, self.config.bit_depth) * ms / 1000;
            bytes.max(1) as usize
        })
    }
}

impl Encoder for WavEncoder {
    fn media_type(&self) -> &str {
        WAV_MEDIA_TYPE
    }

    fn bind(
        &mut self,
        format: StreamFormat,
        events: EncoderEvents,
    ) -> Result<AudioBufferCallback, CaptureError> {
        if format.sample_rate == 0 || format.channels == 0 {
            return Err(CaptureError::EncoderFailure(format!(
                "unusable stream format: {} Hz, {} channels",
                format.sample_rate, format.channels
            )));
        }

        let chunk_threshold = self.chunk_threshold(format);
        {
            let mut staging = self.staging.lock();
            *staging = Staging::unbound();
            staging.format = format;
            staging.events = Some(events);
            staging.chunk_threshold = chunk_threshold;
        }
        log::debug!(
            "wav encoder bound: {} Hz, {} ch in, {}-bit mono out",
            format.sample_rate,
            format.channels,
            self.config.bit_depth
        );

        let staging = Arc::clone(&self.staging);
        let bit_depth = self.config.bit_depth;
        Ok(Arc::new(move |samples: &[f32], sample_rate: u32, channels: u16| {
            staging.lock().ingest(samples, sample_rate, channels, bit_depth);
        }))
    }

    fn begin(&mut self) -> Result<(), CaptureError> {
        let mut staging = self.staging.lock();
        if staging.events.is_none() {
            return Err(CaptureError::InvalidState("encoder is not bound".into()));
        }
        let header = wav_format::generate_wav_header(
            staging.format.sample_rate,
            self.config.bit_depth,
            1,
            None,
        );
        staging.pending = header.to_vec();
        staging.accepting = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CaptureError> {
        let mut staging = self.staging.lock();
        let events = staging
            .events
            .take()
            .ok_or_else(|| CaptureError::InvalidState("encoder is not bound".into()))?;
        staging.accepting = false;
        let remainder = std::mem::take(&mut staging.pending);
        drop(staging);

        events.chunk(remainder);
        events.done();
        Ok(())
    }
}
