/// Nearest-sample rate converter from a device rate to the recognition rate.
/// Downsampling drops samples, upsampling repeats them.
pub struct Resampler {
    from_hz: u32,
    to_hz: u32,
    /// Input samples consumed since the last emitted output sample.
    phase: f64,
}

impl Resampler {
    pub fn new(from_hz: u32, to_hz: u32) -> Self {
        Self {
            from_hz,
            to_hz,
            phase: 0.0,
        }
    }

    pub fn needs_resampling(&self) -> bool {
        self.from_hz != self.to_hz
    }

    /// Convert one chunk. Phase carries over, so a stream fed in pieces
    /// comes out the same as one fed whole.
    pub fn resample(&mut self, input: &[i16]) -> Vec<i16> {
        if !self.needs_resampling() || self.to_hz == 0 {
            return input.to_vec();
        }

        let step = f64::from(self.from_hz) / f64::from(self.to_hz);
        let mut output = Vec::with_capacity((input.len() as f64 / step) as usize + 1);

        for &sample in input {
            self.phase += 1.0;
            while self.phase >= step {
                self.phase -= step;
                output.push(sample);
            }
        }
        output
    }
}

/// Average interleaved frames down to a single channel.
pub fn mix_to_mono(data: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect()
}
