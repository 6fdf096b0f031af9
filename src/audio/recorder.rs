use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::source::{select_source, CaptureStream, InputSource};
use super::wav::{self, WavSpec};
use crate::error::AppError;

/// Hard cap on a single recording.
pub const MAX_RECORDING: Duration = Duration::from_secs(30);

/// Read failures (or empty reads) in a row before the loop gives up.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;

const READ_CHUNK_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    Idle,
    Recording,
    Completed,
    Error,
}

/// Owns one microphone capture at a time.
///
/// The capture stream lives on a blocking task because device streams are
/// usually `!Send`; the recorder talks to it through an `AtomicBool` stop
/// signal and collects the buffer from the task's `JoinHandle`.
pub struct Recorder {
    status: RecordingStatus,
    max_duration: Duration,
    stop_signal: Option<Arc<AtomicBool>>,
    task: Option<JoinHandle<Vec<u8>>>,
    source_name: Option<String>,
    started_at: Option<Instant>,
    recording: Option<Vec<u8>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::with_max_duration(MAX_RECORDING)
    }

    pub fn with_max_duration(max_duration: Duration) -> Self {
        Self {
            status: RecordingStatus::Idle,
            max_duration,
            stop_signal: None,
            task: None,
            source_name: None,
            started_at: None,
            recording: None,
        }
    }

    pub fn status(&self) -> RecordingStatus {
        self.status
    }

    /// Name of the input source picked by the last `start`.
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    /// True while the capture loop is still running. The loop can end on
    /// its own (duration cap, device errors) before `stop` is called.
    pub fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Pick the first working source and start capturing from it.
    /// Returns the chosen source's name.
    pub async fn start(&mut self, sources: Vec<Box<dyn InputSource>>) -> Result<String, AppError> {
        if self.status == RecordingStatus::Recording {
            warn!("[recording] start requested while already recording");
            return Err(AppError::Audio("Already recording".into()));
        }

        self.recording = None;
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel::<Result<String, AppError>>();
        let max_duration = self.max_duration;
        let stop_flag = stop.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let selected = match select_source(&sources) {
                Ok(selected) => selected,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return Vec::new();
                }
            };
            let _ = ready_tx.send(Ok(selected.name.clone()));
            capture_loop(selected.stream, selected.probe, &stop_flag, max_duration)
        });

        let ready = ready_rx
            .await
            .map_err(|_| AppError::Audio("Capture task exited before reporting".into()))?;

        match ready {
            Ok(name) => {
                info!("[recording] started, input source: {name}");
                self.status = RecordingStatus::Recording;
                self.stop_signal = Some(stop);
                self.task = Some(handle);
                self.source_name = Some(name.clone());
                self.started_at = Some(Instant::now());
                Ok(name)
            }
            Err(e) => {
                warn!("[recording] failed to start: {e}");
                self.status = RecordingStatus::Error;
                Err(e)
            }
        }
    }

    /// Stop capturing and keep the buffer for `take_recording`.
    /// Returns the number of PCM bytes captured; a no-op when not recording.
    pub async fn stop(&mut self) -> Result<usize, AppError> {
        if self.status != RecordingStatus::Recording {
            warn!("[recording] stop requested while not recording ({:?})", self.status);
            return Ok(0);
        }

        if let Some(stop) = self.stop_signal.take() {
            stop.store(true, Ordering::Relaxed);
        }
        let Some(handle) = self.task.take() else {
            self.status = RecordingStatus::Error;
            return Err(AppError::Audio("Recording task missing".into()));
        };

        let buffer = match handle.await {
            Ok(buffer) => buffer,
            Err(e) => {
                self.status = RecordingStatus::Error;
                return Err(AppError::Audio(format!("Recording task failed: {e}")));
            }
        };

        if buffer.is_empty() {
            self.status = RecordingStatus::Error;
            return Err(AppError::Audio("No audio captured".into()));
        }

        if wav::nonzero_ratio(&buffer) == 0.0 {
            warn!("[recording] every captured byte is zero; the input device may be muted");
        }
        info!(
            "[recording] stopped: {} bytes ({:.1}s)",
            buffer.len(),
            wav::pcm_duration(buffer.len(), WavSpec::RECOGNITION)
        );

        let len = buffer.len();
        self.recording = Some(buffer);
        self.status = RecordingStatus::Completed;
        Ok(len)
    }

    /// The last finished recording. It stays available until `reset`,
    /// `take_recording` or the next `start`, so it can be uploaded again.
    pub fn recording(&self) -> Option<&[u8]> {
        self.recording.as_deref()
    }

    /// Hand the captured PCM to the caller. Only the first call gets it.
    pub fn take_recording(&mut self) -> Option<Vec<u8>> {
        self.recording.take()
    }

    /// Drop any captured audio and return to `Idle`, abandoning a running capture.
    pub fn reset(&mut self) {
        if let Some(stop) = self.stop_signal.take() {
            stop.store(true, Ordering::Relaxed);
        }
        self.task = None;
        self.recording = None;
        self.source_name = None;
        self.started_at = None;
        self.status = RecordingStatus::Idle;
        debug!("[recording] reset");
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(stop) = self.stop_signal.take() {
            stop.store(true, Ordering::Relaxed);
        }
    }
}

fn capture_loop(
    mut stream: Box<dyn CaptureStream>,
    probe: Vec<u8>,
    stop: &AtomicBool,
    max_duration: Duration,
) -> Vec<u8> {
    let started = Instant::now();
    let mut buffer = probe;
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    let mut consecutive_errors = 0u32;

    loop {
        if stop.load(Ordering::Relaxed) {
            debug!("[recording] stop signal detected");
            break;
        }
        if started.elapsed() >= max_duration {
            warn!("[recording] reached {}s limit, stopping", max_duration.as_secs());
            break;
        }

        match stream.read(&mut chunk) {
            Ok(n) if n > 0 => {
                buffer.extend_from_slice(&chunk[..n]);
                consecutive_errors = 0;
            }
            Ok(_) => consecutive_errors += 1,
            Err(e) => {
                warn!("[recording] read failed: {e}");
                consecutive_errors += 1;
            }
        }

        if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
            warn!("[recording] {consecutive_errors} failed reads in a row, stopping");
            break;
        }
    }

    debug!(
        "[recording] capture loop finished: {} bytes in {}ms",
        buffer.len(),
        started.elapsed().as_millis()
    );
    buffer
}

#[cfg(test)]
mod tests {
    use super::super::source::testing::{FakeSource, Read};
    use super::*;

    fn steady_source(name: &str) -> Box<dyn InputSource> {
        Box::new(FakeSource::new(
            name,
            vec![Read::Data(vec![1; 64])],
            Read::Data(vec![2; 64]),
        ))
    }

    #[tokio::test]
    async fn test_start_stop_take() {
        let mut recorder = Recorder::new();
        assert_eq!(recorder.status(), RecordingStatus::Idle);

        let name = recorder.start(vec![steady_source("mic")]).await.unwrap();
        assert_eq!(name, "mic");
        assert_eq!(recorder.status(), RecordingStatus::Recording);
        assert_eq!(recorder.source_name(), Some("mic"));

        tokio::time::sleep(Duration::from_millis(30)).await;
        let captured = recorder.stop().await.unwrap();
        assert_eq!(recorder.status(), RecordingStatus::Completed);
        assert!(captured > 64);

        assert_eq!(recorder.recording().map(<[u8]>::len), Some(captured));
        // borrowing leaves it in place
        assert!(recorder.recording().is_some());

        let pcm = recorder.take_recording().unwrap();
        assert_eq!(pcm.len(), captured);
        assert!(recorder.recording().is_none());
        assert_eq!(&pcm[..64], &[1u8; 64][..]);
        assert!(recorder.take_recording().is_none());
    }

    #[tokio::test]
    async fn test_falls_back_to_next_source() {
        let mut recorder = Recorder::new();
        let sources: Vec<Box<dyn InputSource>> = vec![
            Box::new(FakeSource::failing("voice_recognition")),
            steady_source("mic"),
        ];
        assert_eq!(recorder.start(sources).await.unwrap(), "mic");
        recorder.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_fails_when_no_source_works() {
        let mut recorder = Recorder::new();
        let err = recorder
            .start(vec![Box::new(FakeSource::failing("mic"))])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Audio(_)));
        assert_eq!(recorder.status(), RecordingStatus::Error);
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let mut recorder = Recorder::new();
        recorder.start(vec![steady_source("mic")]).await.unwrap();
        let err = recorder.start(vec![steady_source("mic")]).await.unwrap_err();
        assert!(err.to_string().contains("Already recording"));
        recorder.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let mut recorder = Recorder::new();
        assert_eq!(recorder.stop().await.unwrap(), 0);
        assert_eq!(recorder.status(), RecordingStatus::Idle);
    }

    #[tokio::test]
    async fn test_duration_cap_ends_loop() {
        let mut recorder = Recorder::with_max_duration(Duration::from_millis(20));
        recorder.start(vec![steady_source("mic")]).await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while recorder.is_capturing() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!recorder.is_capturing());
        assert!(recorder.stop().await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_consecutive_errors_end_loop() {
        let mut recorder = Recorder::new();
        let source = FakeSource::new("mic", vec![Read::Data(vec![3; 16])], Read::Fail);
        recorder.start(vec![Box::new(source)]).await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while recorder.is_capturing() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!recorder.is_capturing());
        // only the probe made it into the buffer
        assert_eq!(recorder.stop().await.unwrap(), 16);
    }

    #[tokio::test]
    async fn test_reset_clears_recording() {
        let mut recorder = Recorder::new();
        recorder.start(vec![steady_source("mic")]).await.unwrap();
        recorder.stop().await.unwrap();
        assert!(recorder.recording().is_some());
        recorder.reset();
        assert_eq!(recorder.status(), RecordingStatus::Idle);
        assert!(recorder.recording().is_none());
        assert!(recorder.take_recording().is_none());
        assert!(recorder.source_name().is_none());
    }
}
