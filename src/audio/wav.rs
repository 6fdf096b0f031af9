use std::fs;
use std::path::Path;

use crate::error::AppError;

/// Size of the canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

/// Sample layout written into the `fmt ` sub-chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl WavSpec {
    /// Layout the recognition service expects: 44.1kHz, mono, 16-bit.
    pub const RECOGNITION: WavSpec = WavSpec {
        sample_rate: 44_100,
        channels: 1,
        bits_per_sample: 16,
    };

    /// Bytes per second. Saturates at `u32::MAX` for layouts the header
    /// cannot describe; `validate` rejects those up front.
    pub fn byte_rate(&self) -> u32 {
        let rate = u64::from(self.sample_rate) * u64::from(self.frame_bits()) / 8;
        u32::try_from(rate).unwrap_or(u32::MAX)
    }

    /// Bytes per frame, saturating at `u16::MAX`.
    pub fn block_align(&self) -> u16 {
        u16::try_from(self.frame_bits() / 8).unwrap_or(u16::MAX)
    }

    fn frame_bits(&self) -> u32 {
        u32::from(self.channels) * u32::from(self.bits_per_sample)
    }

    /// Reject layouts whose derived header fields do not fit their 16/32-bit slots.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.channels == 0 || self.sample_rate == 0 {
            return Err(AppError::MalformedInput(
                "channels and sample rate must be non-zero".into(),
            ));
        }
        if self.bits_per_sample == 0 || self.bits_per_sample % 8 != 0 {
            return Err(AppError::MalformedInput(format!(
                "bits per sample must be a non-zero multiple of 8, got {}",
                self.bits_per_sample
            )));
        }
        let block_align = self.frame_bits() / 8;
        let byte_rate = u64::from(self.sample_rate) * u64::from(block_align);
        if block_align > u32::from(u16::MAX) || byte_rate > u64::from(u32::MAX) {
            return Err(AppError::MalformedInput(format!(
                "{} channels x {} bits at {} Hz does not fit a WAV header",
                self.channels, self.bits_per_sample, self.sample_rate
            )));
        }
        Ok(())
    }
}

impl Default for WavSpec {
    fn default() -> Self {
        Self::RECOGNITION
    }
}

/// Wrap raw little-endian PCM bytes in a 44-byte RIFF/WAVE header.
///
/// The buffer is not checked against the block alignment; a trailing
/// partial sample is copied into the data chunk unchanged.
pub fn encode_pcm(pcm: &[u8], spec: WavSpec) -> Vec<u8> {
    let data_size = pcm.len() as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt sub-chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // sub-chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&spec.channels.to_le_bytes());
    buf.extend_from_slice(&spec.sample_rate.to_le_bytes());
    buf.extend_from_slice(&spec.byte_rate().to_le_bytes());
    buf.extend_from_slice(&spec.block_align().to_le_bytes());
    buf.extend_from_slice(&spec.bits_per_sample.to_le_bytes());

    // data sub-chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    buf.extend_from_slice(pcm);

    buf
}

/// Encode i16 samples into a WAV file (mono, 16-bit, little-endian).
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let spec = WavSpec {
        sample_rate,
        ..WavSpec::RECOGNITION
    };
    encode_pcm(&samples_to_le_bytes(samples), spec)
}

pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

/// Reinterpret s16le bytes as samples. A trailing odd byte is dropped.
pub fn le_bytes_to_samples(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Write a PCM buffer to `path` as a WAV file, creating parent directories.
pub fn write_wav_file(path: &Path, pcm: &[u8], spec: WavSpec) -> Result<usize, AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let wav = encode_pcm(pcm, spec);
    fs::write(path, &wav)?;
    Ok(wav.len())
}

/// True when the bytes start with a RIFF/WAVE header.
pub fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Seconds of audio held in `pcm_len` bytes of PCM.
pub fn pcm_duration(pcm_len: usize, spec: WavSpec) -> f32 {
    let byte_rate = spec.byte_rate();
    if byte_rate == 0 {
        return 0.0;
    }
    pcm_len as f32 / byte_rate as f32
}

/// Seconds of audio in a complete WAV file, using the byte rate from its
/// own header (offset 28). `None` when the bytes are not a WAV file.
pub fn wav_duration(bytes: &[u8]) -> Option<f32> {
    if !is_wav(bytes) || bytes.len() < WAV_HEADER_LEN {
        return None;
    }
    let byte_rate = u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]);
    if byte_rate == 0 {
        return Some(0.0);
    }
    Some((bytes.len() - WAV_HEADER_LEN) as f32 / byte_rate as f32)
}

/// Calculate RMS level from a chunk of i16 samples, normalized to 0.0–1.0.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    (rms / i16::MAX as f64) as f32
}

/// Share of non-zero bytes in a PCM buffer. Near zero means the device
/// delivered silence.
pub fn nonzero_ratio(pcm: &[u8]) -> f32 {
    if pcm.is_empty() {
        return 0.0;
    }
    let nonzero = pcm.iter().filter(|&&b| b != 0).count();
    nonzero as f32 / pcm.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn read_u16(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn test_header_layout() {
        let pcm: Vec<u8> = (0..200u8).collect();
        let wav = encode_pcm(&pcm, WavSpec::RECOGNITION);

        assert_eq!(wav.len(), WAV_HEADER_LEN + pcm.len());
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(read_u32(&wav, 4), 36 + 200);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(read_u32(&wav, 16), 16);
        assert_eq!(read_u16(&wav, 20), 1);
        assert_eq!(read_u16(&wav, 22), 1);
        assert_eq!(read_u32(&wav, 24), 44_100);
        assert_eq!(read_u32(&wav, 28), 88_200);
        assert_eq!(read_u16(&wav, 32), 2);
        assert_eq!(read_u16(&wav, 34), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(read_u32(&wav, 40), 200);
        assert_eq!(&wav[44..], &pcm[..]);
    }

    #[test]
    fn test_data_size_tracks_buffer_length() {
        for len in [0usize, 1, 2, 3, 1023, 88_200] {
            let pcm = vec![0x5Au8; len];
            let wav = encode_pcm(&pcm, WavSpec::RECOGNITION);
            assert_eq!(wav.len(), 44 + len);
            assert_eq!(read_u32(&wav, 40) as usize, len);
            assert_eq!(read_u32(&wav, 4) as usize, 36 + len);
        }
    }

    #[test]
    fn test_odd_length_keeps_trailing_byte() {
        let wav = encode_pcm(&[1, 2, 3], WavSpec::RECOGNITION);
        assert_eq!(&wav[44..], &[1, 2, 3]);
    }

    #[test]
    fn test_deterministic() {
        let pcm = vec![7u8; 512];
        assert_eq!(
            encode_pcm(&pcm, WavSpec::RECOGNITION),
            encode_pcm(&pcm, WavSpec::RECOGNITION)
        );
    }

    #[test]
    fn test_stereo_rates() {
        let spec = WavSpec {
            sample_rate: 48_000,
            channels: 2,
            bits_per_sample: 16,
        };
        let wav = encode_pcm(&[0; 8], spec);
        assert_eq!(read_u16(&wav, 22), 2);
        assert_eq!(read_u32(&wav, 28), 192_000);
        assert_eq!(read_u16(&wav, 32), 4);
    }

    #[test]
    fn test_encode_wav_from_samples() {
        let wav = encode_wav(&[1, -1, i16::MAX], 16_000);
        assert_eq!(read_u32(&wav, 24), 16_000);
        assert_eq!(read_u32(&wav, 40), 6);
        assert_eq!(&wav[44..], &[0x01, 0x00, 0xFF, 0xFF, 0xFF, 0x7F]);
        assert_eq!(le_bytes_to_samples(&wav[44..]), vec![1, -1, i16::MAX]);
    }

    #[test]
    fn test_is_wav() {
        assert!(is_wav(&encode_pcm(&[], WavSpec::RECOGNITION)));
        assert!(!is_wav(b"RIFF"));
        assert!(!is_wav(&[0u8; 64]));
    }

    #[test]
    fn test_pcm_duration() {
        assert_eq!(pcm_duration(88_200 * 3, WavSpec::RECOGNITION), 3.0);
        assert_eq!(pcm_duration(0, WavSpec::RECOGNITION), 0.0);
    }

    #[test]
    fn test_oversized_layout_saturates_instead_of_panicking() {
        let spec = WavSpec {
            channels: 5000,
            ..WavSpec::RECOGNITION
        };
        let wav = encode_pcm(&[0; 4], spec);
        assert_eq!(wav.len(), 48);
        assert_eq!(read_u16(&wav, 22), 5000);
        assert_eq!(read_u16(&wav, 32), 10_000);
        assert_eq!(read_u32(&wav, 28), 441_000_000);
        assert!(spec.validate().is_ok());

        let wide = WavSpec {
            channels: 40_000,
            bits_per_sample: 32,
            ..WavSpec::RECOGNITION
        };
        let wav = encode_pcm(&[0; 4], wide);
        assert_eq!(read_u16(&wav, 32), u16::MAX);
        assert!(matches!(wide.validate(), Err(AppError::MalformedInput(_))));

        let huge = WavSpec {
            sample_rate: u32::MAX,
            channels: 8,
            bits_per_sample: 32,
        };
        assert_eq!(huge.byte_rate(), u32::MAX);
        assert!(huge.validate().is_err());
    }

    #[test]
    fn test_validate() {
        assert!(WavSpec::RECOGNITION.validate().is_ok());
        assert!(WavSpec {
            sample_rate: 48_000,
            channels: 2,
            bits_per_sample: 24,
        }
        .validate()
        .is_ok());
        assert!(WavSpec {
            channels: 0,
            ..WavSpec::RECOGNITION
        }
        .validate()
        .is_err());
        assert!(WavSpec {
            bits_per_sample: 12,
            ..WavSpec::RECOGNITION
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_wav_duration_reads_header_rate() {
        let stereo_48k = WavSpec {
            sample_rate: 48_000,
            channels: 2,
            bits_per_sample: 16,
        };
        let wav = encode_pcm(&vec![0u8; 192_000 * 2], stereo_48k);
        assert_eq!(wav_duration(&wav), Some(2.0));

        let mono = encode_pcm(&vec![0u8; 88_200], WavSpec::RECOGNITION);
        assert_eq!(wav_duration(&mono), Some(1.0));
        assert_eq!(wav_duration(b"not a wav file at all, just bytes"), None);
    }

    #[test]
    fn test_rms_and_nonzero_ratio() {
        assert_eq!(calculate_rms(&[]), 0.0);
        assert_eq!(calculate_rms(&[0, 0, 0]), 0.0);
        assert!((calculate_rms(&[i16::MAX, i16::MAX]) - 1.0).abs() < 1e-6);

        assert_eq!(nonzero_ratio(&[]), 0.0);
        assert_eq!(nonzero_ratio(&[0, 0, 1, 1]), 0.5);
    }

    #[test]
    fn test_write_wav_file_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("clip.wav");
        let written = write_wav_file(&path, &[0u8; 10], WavSpec::RECOGNITION).unwrap();
        assert_eq!(written, 54);
        let bytes = std::fs::read(&path).unwrap();
        assert!(is_wav(&bytes));
        assert_eq!(bytes.len(), 54);
    }
}
