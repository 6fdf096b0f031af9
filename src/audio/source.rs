use tracing::{debug, warn};

use crate::error::AppError;

/// Bytes read when probing whether an opened source actually delivers audio.
pub const PROBE_BYTES: usize = 1024;

/// An open capture stream producing s16le mono PCM at the recognition rate.
pub trait CaptureStream {
    /// Blocking read into `buf`. Returns the number of bytes written;
    /// `Ok(0)` means nothing arrived within the stream's poll window.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, AppError>;
}

/// A microphone input that may or may not work on this device.
pub trait InputSource: Send {
    fn name(&self) -> &str;

    fn open(&self) -> Result<Box<dyn CaptureStream>, AppError>;
}

/// A source that opened and passed the probe read.
pub struct SelectedSource {
    pub name: String,
    pub stream: Box<dyn CaptureStream>,
    /// Audio read during the probe; it belongs at the head of the recording.
    pub probe: Vec<u8>,
}

/// Try each source in priority order and return the first one that opens
/// and yields data on a probe read.
pub fn select_source(sources: &[Box<dyn InputSource>]) -> Result<SelectedSource, AppError> {
    if sources.is_empty() {
        return Err(AppError::Audio("No input sources available".into()));
    }

    let mut failures = Vec::new();
    for source in sources {
        let name = source.name().to_string();
        debug!("[recording] trying input source {name}");

        let mut stream = match source.open() {
            Ok(stream) => stream,
            Err(e) => {
                warn!("[recording] input source {name} failed to open: {e}");
                failures.push(format!("{name}: {e}"));
                continue;
            }
        };

        let mut probe = vec![0u8; PROBE_BYTES];
        match stream.read(&mut probe) {
            Ok(n) if n > 0 => {
                probe.truncate(n);
                debug!("[recording] input source {name} ready, probe read {n} bytes");
                return Ok(SelectedSource {
                    name,
                    stream,
                    probe,
                });
            }
            Ok(_) => {
                warn!("[recording] input source {name} delivered no data");
                failures.push(format!("{name}: probe read returned no data"));
            }
            Err(e) => {
                warn!("[recording] input source {name} probe failed: {e}");
                failures.push(format!("{name}: {e}"));
            }
        }
    }

    Err(AppError::Audio(format!(
        "No input source could be initialised:\n{}",
        failures.join("\n")
    )))
}
