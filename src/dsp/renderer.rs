//! WAV renderer: plays the groove offline and encodes it as a WAV byte buffer.
//!
//! The scheduler and engine run in lock-step on audio time: the scheduler
//! ticks every `tickInterval` worth of rendered frames, exactly as the
//! transport thread would against a live clock.

use crate::config::{EngineConfig, Groove};
use crate::error::Result;

use super::engine::ShedEngine;
use super::params::ParamSnapshot;
use super::scheduler::LookaheadScheduler;

/// Render `seconds` of the groove at `bpm` to interleaved stereo f32.
pub fn render_groove(config: &EngineConfig, groove: Groove, bpm: f64, seconds: f64) -> Result<Vec<f32>> {
    let (mut engine, mut sender) = ShedEngine::new(config)?;
    let clock = engine.clock();
    let mut scheduler = LookaheadScheduler::new(clock.clone(), config);
    scheduler.set_groove(groove);
    scheduler.start(bpm);

    let total = (seconds.max(0.0) * config.sample_rate as f64) as usize;
    let tick_frames = ((config.tick_seconds() * config.sample_rate as f64) as u64).max(1);
    let params = ParamSnapshot::default().as_block();

    let mut out = Vec::with_capacity(total * 2);
    let mut left = vec![0.0f32; config.block_size];
    let mut right = vec![0.0f32; config.block_size];
    let mut next_tick = 0u64;
    let mut rendered = 0;

    while rendered < total {
        if clock.frames() >= next_tick {
            scheduler.tick(&mut sender);
            next_tick += tick_frames;
        }
        let frames = config.block_size.min(total - rendered);
        engine.process(&params, &mut left[..frames], &mut right[..frames]);
        for (&l, &r) in left[..frames].iter().zip(&right[..frames]) {
            out.push(l);
            out.push(r);
        }
        rendered += frames;
    }

    log::debug!("rendered {seconds:.2}s of groove at {bpm:.1} bpm ({rendered} frames)");
    Ok(out)
}

/// Render the groove to a WAV file as bytes (16-bit stereo PCM).
pub fn render_groove_wav(config: &EngineConfig, groove: Groove, bpm: f64, seconds: f64) -> Result<Vec<u8>> {
    let samples = render_groove(config, groove, bpm, seconds)?;
    let pcm: Vec<i16> = samples.iter().map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16).collect();
    Ok(encode_wav(&pcm, config.sample_rate as u32, 2))
}

/// Encode interleaved i16 PCM samples to a WAV byte buffer.
fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (samples.len() * 2) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_valid() {
        let wav = render_groove_wav(&EngineConfig::default(), Groove::default(), 110.0, 0.25).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 44100);
        let ch = u16::from_le_bytes([wav[22], wav[23]]);
        assert_eq!(ch, 2);
    }

    #[test]
    fn wav_size_correct() {
        let wav = render_groove_wav(&EngineConfig::default(), Groove::default(), 120.0, 0.5).unwrap();

        // 0.5s = 22050 frames * 2 channels * 2 bytes = 88200 data bytes
        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_size, 88200);
        assert_eq!(wav.len(), 44 + 88200);
    }

    #[test]
    fn groove_is_audible_and_bounded() {
        let samples = render_groove(&EngineConfig::default(), Groove::default(), 110.0, 2.0).unwrap();
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(samples.iter().all(|s| s.is_finite()));
        assert!(peak > 0.1, "groove should be audible, peak {peak}");
        assert!(peak < 4.0, "groove should not blow up, peak {peak}");
    }

    #[test]
    fn first_beat_lands_after_lookahead() {
        let config = EngineConfig::default();
        let samples = render_groove(&config, Groove::default(), 110.0, 0.5).unwrap();
        let first = samples.iter().position(|s| *s != 0.0).unwrap() / 2;
        let expected = (config.lookahead * config.sample_rate as f64).round() as usize;
        assert!(first >= expected && first <= expected + 2, "first sound at frame {first}, expected {expected}");
    }

    #[test]
    fn render_is_deterministic() {
        let config = EngineConfig { block_size: 64, ..EngineConfig::default() };
        let a = render_groove(&config, Groove::default(), 128.0, 1.0).unwrap();
        let b = render_groove(&config, Groove::default(), 128.0, 1.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn silent_groove_renders_silence() {
        let groove = Groove { kick: 0.0, snare: 0.0, hihat: 0.0, bass: 0.0, ..Groove::default() };
        let samples = render_groove(&EngineConfig::default(), groove, 110.0, 1.0).unwrap();
        assert!(samples.iter().all(|&s| s == 0.0));
    }
}
