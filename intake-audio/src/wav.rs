// PCM chunk helpers and a minimal WAV (RIFF) writer for finished recordings.

use crate::device::CaptureError;
use crate::resample::{UPLOAD_SAMPLE_RATE_HZ, resample_mono_f32};

pub const WAV_CONTENT_TYPE: &str = "audio/wav";

/// Mono f32 samples as little-endian bytes, the chunk format used on the wire
/// between a capture stream and `finalize`.
pub fn samples_to_f32le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 4);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Inverse of [`samples_to_f32le`]. A trailing partial sample is dropped.
pub fn f32le_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

pub fn encode_wav_mono_f32le(samples: &[f32], sample_rate_hz: u32) -> Vec<u8> {
    let num_channels: u16 = 1;
    let bits_per_sample: u16 = 32;
    let audio_format: u16 = 3; // IEEE float

    let byte_rate = sample_rate_hz * num_channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = num_channels * (bits_per_sample / 8);

    let data_bytes_len = samples.len() as u32 * 4;

    let mut out = Vec::with_capacity((44 + data_bytes_len) as usize);

    // RIFF header
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_bytes_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt chunk
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&audio_format.to_le_bytes());
    out.extend_from_slice(&num_channels.to_le_bytes());
    out.extend_from_slice(&sample_rate_hz.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_bytes_len.to_le_bytes());
    out.extend_from_slice(&samples_to_f32le(samples));

    out
}

/// Joins f32le chunks captured at `input_rate_hz` into a 16 kHz WAV file.
pub fn pcm_chunks_to_wav(chunks: Vec<Vec<u8>>, input_rate_hz: u32) -> Result<Vec<u8>, CaptureError> {
    let samples = f32le_to_samples(&chunks.concat());
    let samples = resample_mono_f32(&samples, input_rate_hz, UPLOAD_SAMPLE_RATE_HZ)
        .map_err(|e| CaptureError::Finalize(format!("{e:#}")))?;
    Ok(encode_wav_mono_f32le(&samples, UPLOAD_SAMPLE_RATE_HZ))
}
