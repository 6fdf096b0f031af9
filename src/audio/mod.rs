#[cfg(feature = "mic-capture")]
pub mod capture;
pub mod recorder;
pub mod resampler;
pub mod source;
pub mod wav;
