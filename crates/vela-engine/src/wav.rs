//! Export post-processing & WAV container (§4.10, C2): normalize, TPDF
//! dither, and bit-exact PCM/float serialization.

use std::io::{self, Write};

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Output sample format requested for a render (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Pcm16,
    Pcm24,
    Float32,
}

impl BitDepth {
    fn bits(self) -> u16 {
        match self {
            BitDepth::Pcm16 => 16,
            BitDepth::Pcm24 => 24,
            BitDepth::Float32 => 32,
        }
    }

    fn format_code(self) -> u16 {
        match self {
            BitDepth::Pcm16 | BitDepth::Pcm24 => 1,
            BitDepth::Float32 => 3,
        }
    }

    fn bytes_per_sample(self) -> usize {
        self.bits() as usize / 8
    }
}

/// Scans the absolute peak across all channels and scales every sample so
/// the peak lands at `target_db` (default -0.1dB). A silent buffer (`P=0`)
/// is left untouched (§4.10).
pub fn normalize(channels: &mut [Vec<f32>], target_db: f32) {
    let peak = channels
        .iter()
        .flat_map(|c| c.iter())
        .fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= 0.0 {
        return;
    }
    let target_linear = 10f32.powf(target_db / 20.0);
    let scale = target_linear / peak;
    for channel in channels.iter_mut() {
        for sample in channel.iter_mut() {
            *sample *= scale;
        }
    }
}

/// Triangular-probability-density dither: the difference of two independent
/// uniform `[0,1)` draws, scaled to one quantization step `q = 2^-bit_depth`
/// (§4.10, GLOSSARY).
pub struct TpdfDither {
    rng: StdRng,
    step: f32,
}

impl TpdfDither {
    pub fn new(seed: u64, bit_depth: BitDepth) -> Self {
        let step = 2f32.powi(-(bit_depth.bits() as i32));
        Self {
            rng: StdRng::seed_from_u64(seed),
            step,
        }
    }

    #[inline]
    pub fn sample(&mut self) -> f32 {
        let a: f32 = self.rng.gen();
        let b: f32 = self.rng.gen();
        (a - b) * self.step
    }
}

fn quantize(sample: f32, depth: BitDepth, dither: Option<&mut TpdfDither>) -> QuantizedSample {
    match depth {
        BitDepth::Float32 => QuantizedSample::Float(sample.clamp(-1.0, 1.0)),
        BitDepth::Pcm16 => {
            let mut value = sample;
            if let Some(dither) = dither {
                value += dither.sample();
            }
            let value = value.clamp(-1.0, 1.0);
            let scaled = if value < 0.0 {
                value * 0x8000 as f32
            } else {
                value * 0x7FFF as f32
            };
            QuantizedSample::Int(scaled.round() as i32)
        }
        BitDepth::Pcm24 => {
            let mut value = sample;
            if let Some(dither) = dither {
                value += dither.sample();
            }
            let value = value.clamp(-1.0, 1.0);
            let scaled = if value < 0.0 {
                value * 0x800000 as f32
            } else {
                value * 0x7FFFFF as f32
            };
            QuantizedSample::Int(scaled.round() as i32)
        }
    }
}

enum QuantizedSample {
    Int(i32),
    Float(f32),
}

/// Encodes a standard 44-byte RIFF/WAVE header followed by interleaved
/// samples (§4.10). `dither` is ignored (and should be `None`) for
/// [`BitDepth::Float32`].
pub fn encode_wav<W: Write>(
    writer: &mut W,
    channels: &[Vec<f32>],
    sample_rate: u32,
    depth: BitDepth,
    mut dither: Option<TpdfDither>,
) -> io::Result<()> {
    let num_channels = channels.len().max(1) as u16;
    let frames = channels.iter().map(|c| c.len()).max().unwrap_or(0);
    let bytes_per_sample = depth.bytes_per_sample();
    let block_align = num_channels as usize * bytes_per_sample;
    let byte_rate = sample_rate as usize * block_align;
    let data_size = frames * block_align;

    writer.write_all(b"RIFF")?;
    writer.write_all(&((36 + data_size) as u32).to_le_bytes())?;
    writer.write_all(b"WAVE")?;

    writer.write_all(b"fmt ")?;
    writer.write_all(&16u32.to_le_bytes())?;
    writer.write_all(&depth.format_code().to_le_bytes())?;
    writer.write_all(&num_channels.to_le_bytes())?;
    writer.write_all(&sample_rate.to_le_bytes())?;
    writer.write_all(&(byte_rate as u32).to_le_bytes())?;
    writer.write_all(&(block_align as u16).to_le_bytes())?;
    writer.write_all(&depth.bits().to_le_bytes())?;

    writer.write_all(b"data")?;
    writer.write_all(&(data_size as u32).to_le_bytes())?;

    for frame in 0..frames {
        for channel in channels {
            let sample = channel.get(frame).copied().unwrap_or(0.0);
            match quantize(sample, depth, dither.as_mut()) {
                QuantizedSample::Float(value) => writer.write_all(&value.to_le_bytes())?,
                QuantizedSample::Int(value) => match depth {
                    BitDepth::Pcm16 => {
                        writer.write_all(&(value as i16).to_le_bytes())?;
                    }
                    BitDepth::Pcm24 => {
                        let bytes = value.to_le_bytes();
                        writer.write_all(&bytes[0..3])?;
                    }
                    BitDepth::Float32 => unreachable!(),
                },
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_scales_to_target_peak() {
        let mut channels = vec![vec![-0.5, 0.5, -0.25]];
        normalize(&mut channels, -0.1);
        let peak = channels[0].iter().fold(0.0f32, |a, s| a.max(s.abs()));
        let target = 10f32.powf(-0.1 / 20.0);
        assert!((peak - target).abs() < 1e-5);
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut channels = vec![vec![-0.5, 0.5, -0.25]];
        normalize(&mut channels, -0.1);
        let after_first: Vec<f32> = channels[0].clone();
        normalize(&mut channels, -0.1);
        let diff: f32 = after_first
            .iter()
            .zip(channels[0].iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        assert!(diff < 1e-3);
    }

    #[test]
    fn silent_buffer_is_left_untouched() {
        let mut channels = vec![vec![0.0; 8]];
        normalize(&mut channels, -0.1);
        assert!(channels[0].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn wav_header_matches_exact_layout() {
        let channels = vec![vec![0.0; 1000], vec![0.0; 1000]];
        let mut buffer = Vec::new();
        encode_wav(&mut buffer, &channels, 48_000, BitDepth::Pcm24, None).unwrap();
        let byte_rate = u32::from_le_bytes(buffer[28..32].try_into().unwrap());
        let block_align = u16::from_le_bytes(buffer[32..34].try_into().unwrap());
        let bits = u16::from_le_bytes(buffer[34..36].try_into().unwrap());
        let data_size = u32::from_le_bytes(buffer[40..44].try_into().unwrap());
        assert_eq!(byte_rate, 288_000);
        assert_eq!(block_align, 6);
        assert_eq!(bits, 24);
        assert_eq!(data_size, 6000);
    }

    #[test]
    fn dither_has_expected_standard_deviation() {
        let depth = BitDepth::Pcm16;
        let q = 2f32.powi(-16);
        let mut dither = TpdfDither::new(42, depth);
        let n = 200_000;
        let samples: Vec<f32> = (0..n).map(|_| dither.sample()).collect();
        let mean = samples.iter().sum::<f32>() / n as f32;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n as f32;
        let expected_std = q / 6f32.sqrt();
        assert!(mean.abs() < 1e-4);
        assert!((variance.sqrt() - expected_std).abs() < expected_std * 0.1);
    }
}
