use std::time::Duration;

/// Media type declared on every artifact unless overridden.
///
/// Declared independently of what the encoder actually produces.
pub const DEFAULT_MEDIA_TYPE: &str = "audio/mp3";

/// Configuration for a capture session.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfiguration {
    /// Media type stamped on assembled artifacts (default: `audio/mp3`).
    pub media_type: String,

    /// Maximum recording duration in seconds (None = unlimited).
    pub max_duration_secs: Option<f64>,

    /// How long `stop_and_finalize` waits for the encoder's final chunk.
    /// `Duration::MAX` waits indefinitely.
    pub finalize_timeout: Duration,

    /// Input device ID handed to the provider on every start, or None for
    /// the system default.
    pub device_id: Option<String>,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        let Some((kind, subtype)) = self.media_type.split_once('/') else {
            return Err(format!("invalid media type: {}", self.media_type));
        };
        if kind.is_empty() || subtype.is_empty() {
            return Err(format!("invalid media type: {}", self.media_type));
        }
        if let Some(max) = self.max_duration_secs {
            if !max.is_finite() || max <= 0.0 || Duration::try_from_secs_f64(max).is_err() {
                return Err(format!("max duration out of range: {}", max));
            }
        }
        if self.finalize_timeout.is_zero() {
            return Err("finalize timeout must be non-zero".into());
        }
        Ok(())
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
            max_duration_secs: None,
            finalize_timeout: Duration::from_secs(5),
            device_id: None,
        }
    }
}

/// Configuration for the PCM/WAV encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfiguration {
    /// Bit depth for PCM output (default: 16). Valid values: 16, 24.
    pub bit_depth: u16,

    /// Emit a chunk every time this much audio is staged. None keeps
    /// everything staged until flush, producing a single chunk.
    pub timeslice_ms: Option<u64>,
}

impl EncoderConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if ![16, 24].contains(&self.bit_depth) {
            return Err(format!("unsupported bit depth: {}", self.bit_depth));
        }
        if self.timeslice_ms == Some(0) {
            return Err("timeslice must be non-zero".into());
        }
        Ok(())
    }
}

impl Default for EncoderConfiguration {
    fn default() -> Self {
        Self {
            bit_depth: 16,
            timeslice_ms: None,
        }
    }
}
