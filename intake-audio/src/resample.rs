use anyhow::Context;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

/// Rate of PCM recordings as uploaded; the transcription backend expects 16 kHz.
pub const UPLOAD_SAMPLE_RATE_HZ: u32 = 16_000;

// Recordings run up to the hard cap (minutes of 48 kHz audio), so input is
// fed through the resampler in fixed blocks instead of one huge buffer.
const BLOCK_FRAMES: usize = 4_096;

fn sinc_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Resample a mono recording to `target_rate_hz`.
///
/// The output is delay-compensated and has exactly
/// `round(len * target / input)` samples.
pub fn resample_mono_f32(
    samples: &[f32],
    input_rate_hz: u32,
    target_rate_hz: u32,
) -> anyhow::Result<Vec<f32>> {
    if input_rate_hz == target_rate_hz || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if input_rate_hz == 0 || target_rate_hz == 0 {
        anyhow::bail!("invalid sample rate: {input_rate_hz} -> {target_rate_hz}");
    }

    let ratio = f64::from(target_rate_hz) / f64::from(input_rate_hz);
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, sinc_params(), BLOCK_FRAMES, 1)
        .context("create resampler")?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(expected + delay + BLOCK_FRAMES);

    let mut pos = 0;
    while samples.len() - pos >= resampler.input_frames_next() {
        let n = resampler.input_frames_next();
        let block = [&samples[pos..pos + n]];
        let mut res = resampler.process(&block[..], None).context("resample block")?;
        out.append(&mut res[0]);
        pos += n;
    }
    if pos < samples.len() {
        let tail = [&samples[pos..]];
        let mut res = resampler
            .process_partial(Some(&tail[..]), None)
            .context("resample tail")?;
        out.append(&mut res[0]);
    }

    // Flush until the delayed samples are out.
    while out.len() < expected + delay {
        let mut res = resampler
            .process_partial::<&[f32]>(None, None)
            .context("flush resampler")?;
        if res[0].is_empty() {
            break;
        }
        out.append(&mut res[0]);
    }

    out.drain(..delay.min(out.len()));
    out.resize(expected, 0.0);
    Ok(out)
}
