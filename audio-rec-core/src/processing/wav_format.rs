//! WAV/PCM format utilities.
//!
//! Generates standard 44-byte RIFF WAV headers and converts float samples
//! to little-endian integer PCM.

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Size value written when the total length is not known up front.
pub const STREAMING_SIZE_SENTINEL: u32 = u32::MAX;

/// Generate a 44-byte WAV RIFF header.
///
/// Format: PCM (format code 1), little-endian. Pass `None` for `data_size`
/// when the length is unknown at the time the header goes out; both size
/// fields then carry `STREAMING_SIZE_SENTINEL`, which readers treat as
/// "read until end of data".
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8 (36 + data_size)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(
    sample_rate: u32,
    bit_depth: u16,
    channels: u16,
    data_size: Option<u32>,
) -> [u8; WAV_HEADER_SIZE] {
    match data_size {
        Some(size) => build_header(sample_rate, bit_depth, channels, size.saturating_add(36), size),
        None => build_header(
            sample_rate,
            bit_depth,
            channels,
            STREAMING_SIZE_SENTINEL,
            STREAMING_SIZE_SENTINEL,
        ),
    }
}

fn build_header(
    sample_rate: u32,
    bit_depth: u16,
    channels: u16,
    chunk_size: u32,
    data_size: u32,
) -> [u8; WAV_HEADER_SIZE] {
    let byte_rate = sample_rate * channels as u32 * bit_depth as u32 / 8;
    let block_align = channels * bit_depth / 8;

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Downmix interleaved multi-channel audio to mono by averaging channels per frame.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let frame_count = samples.len() / channels;
    let scale = 1.0 / channels as f32;
    let mut mono = Vec::with_capacity(frame_count);
    for frame in samples.chunks_exact(channels) {
        mono.push(frame.iter().sum::<f32>() * scale);
    }
    mono
}

/// Convert f32 samples `[-1.0, 1.0]` to little-endian integer PCM.
///
/// Clamps out-of-range values. Supports 16- and 24-bit output; any other
/// depth is treated as 16-bit.
pub fn convert_to_pcm(samples: &[f32], bit_depth: u16) -> Vec<u8> {
    match bit_depth {
        24 => {
            const MAX_24: f32 = 8_388_607.0;
            let mut data = Vec::with_capacity(samples.len() * 3);
            for &sample in samples {
                let value = (sample.clamp(-1.0, 1.0) * MAX_24) as i32;
                data.extend_from_slice(&value.to_le_bytes()[..3]);
            }
            data
        }
        _ => {
            let mut data = Vec::with_capacity(samples.len() * 2);
            for &sample in samples {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                data.extend_from_slice(&value.to_le_bytes());
            }
            data
        }
    }
}

/// Bytes of PCM produced per second of mono audio.
pub fn byte_rate(sample_rate: u32, bit_depth: u16) -> u64 {
    sample_rate as u64 * (bit_depth as u64 / 8)
}
