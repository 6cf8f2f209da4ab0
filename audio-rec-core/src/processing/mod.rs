pub mod chunk_buffer;
pub mod wav_encoder;
pub mod wav_format;
