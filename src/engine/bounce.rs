//! Offline bounce — render a finite session to a WAV byte buffer.
//!
//! Runs the same session code the real-time path uses, just synchronously
//! and to completion: activation fade-in through duration fade-out. Used
//! for preset previews and for spectral assertions in tests.

use crate::dsp::mixer::BinauralMixer;
use crate::engine::EngineConfig;
use crate::engine::session::Session;
use crate::error::{EngineError, InvalidPresetReason, Result};
use crate::preset::Preset;

const BLOCK_FRAMES: usize = 256;

/// Render `preset` start-to-finish and encode 16-bit stereo PCM WAV bytes.
///
/// The preset must carry a `duration_seconds`; an open-ended session has
/// no bounce length.
pub fn bounce_wav(preset: &Preset, sample_rate: u32) -> Result<Vec<u8>> {
    preset.validate()?;
    let duration = preset.duration_seconds.ok_or_else(|| EngineError::InvalidPreset {
        id: preset.id.clone(),
        reason: InvalidPresetReason::MissingDuration,
    })?;

    let config = EngineConfig {
        sample_rate: sample_rate as f64,
        ..EngineConfig::default()
    };
    let mut session = Session::new(preset, &config);
    let mixer = BinauralMixer::new();

    let total_frames = (duration * sample_rate as f64).round() as usize;
    let mut samples = vec![0.0f32; total_frames * 2];
    for block in samples.chunks_mut(BLOCK_FRAMES * 2) {
        session.render_block(&mixer, block);
    }

    Ok(encode_wav(&samples, sample_rate))
}

/// Encode interleaved stereo f32 samples as a 16-bit PCM WAV buffer.
fn encode_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    const CHANNELS: u16 = 2;
    const BITS_PER_SAMPLE: u16 = 16;
    const BLOCK_ALIGN: u16 = CHANNELS * (BITS_PER_SAMPLE / 8);

    let data_size = (samples.len() * 2) as u32;
    let byte_rate = sample_rate * BLOCK_ALIGN as u32;

    let mut wav = Vec::with_capacity(44 + data_size as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&CHANNELS.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&BLOCK_ALIGN.to_le_bytes());
    wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        let pcm = (sample as f64 * 32767.0).round().clamp(-32768.0, 32767.0) as i16;
        wav.extend_from_slice(&pcm.to_le_bytes());
    }

    wav
}
