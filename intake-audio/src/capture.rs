//
// MediaCapture: owns the microphone for at most one recording at a time.
//
// Each `start()` creates a fresh `RecordingSession` and spawns one task that
// drives the 1 s wall-clock tick and chunk collection on a single `select!`,
// so the two never run concurrently. The task is the only place that
// finalizes a recording; whoever takes the outcome first receives the blob.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use intake_core::config::IntakeConfig;
use intake_core::types::{AudioBlob, SessionId};
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::device::{AudioDevice, CaptureConstraints, CaptureError, InputStream};
use crate::session::{RecordingSession, RecordingState};

const TICK: Duration = Duration::from_secs(1);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub hard_cap_secs: u32,
    pub chunk_interval: Duration,
    pub constraints: CaptureConstraints,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from(&IntakeConfig::default())
    }
}

impl From<&IntakeConfig> for CaptureConfig {
    fn from(cfg: &IntakeConfig) -> Self {
        Self {
            hard_cap_secs: cfg.hard_cap_secs,
            chunk_interval: Duration::from_millis(cfg.chunk_interval_ms.max(1)),
            constraints: CaptureConstraints::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Manual,
    HardCap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Success {
        blob: AudioBlob,
        duration_secs: u32,
        reason: StopReason,
    },
    Failure {
        error: CaptureError,
    },
}

impl CaptureOutcome {
    pub fn into_result(self) -> Result<AudioBlob, CaptureError> {
        match self {
            CaptureOutcome::Success { blob, .. } => Ok(blob),
            CaptureOutcome::Failure { error } => Err(error),
        }
    }
}

struct Shared {
    session: Mutex<RecordingSession>,
    stop: CancellationToken,
    abort: CancellationToken,
    // Cancelled once the device is closed, whichever way the session ended.
    released: CancellationToken,
    outcome: Mutex<Option<oneshot::Receiver<CaptureOutcome>>>,
}

impl Shared {
    fn state(&self) -> RecordingState {
        lock(&self.session).state()
    }
}

struct CaptureInner {
    device: Arc<dyn AudioDevice>,
    cfg: CaptureConfig,
    active: Mutex<Option<Arc<Shared>>>,
}

impl Drop for CaptureInner {
    fn drop(&mut self) {
        // Tearing down the owner must never leave the microphone open.
        if let Some(shared) = lock(&self.active).take() {
            shared.abort.cancel();
        }
    }
}

#[derive(Clone)]
pub struct MediaCapture {
    inner: Arc<CaptureInner>,
}

impl std::fmt::Debug for MediaCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaCapture")
            .field("cfg", &self.inner.cfg)
            .field("state", &self.state())
            .finish()
    }
}

impl MediaCapture {
    pub fn new(device: Arc<dyn AudioDevice>, cfg: CaptureConfig) -> Self {
        Self {
            inner: Arc::new(CaptureInner {
                device,
                cfg,
                active: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.inner.cfg
    }

    /// State of the most recent session, `Idle` if there was none.
    pub fn state(&self) -> RecordingState {
        lock(&self.inner.active)
            .as_ref()
            .map(|s| s.state())
            .unwrap_or(RecordingState::Idle)
    }

    pub fn is_active(&self) -> bool {
        self.state().holds_device()
    }

    /// Acquires the microphone and begins recording.
    ///
    /// Fails fast with `AlreadyRecording` while another session holds the
    /// device. A session that was already aborted is waited out instead, so
    /// a start right after `teardown()` succeeds.
    pub async fn start(&self) -> Result<Recording, CaptureError> {
        let shared = loop {
            let releasing = {
                let mut active = lock(&self.inner.active);
                match active.as_ref() {
                    Some(prev) if prev.state().holds_device() => {
                        if !prev.abort.is_cancelled() {
                            return Err(CaptureError::AlreadyRecording);
                        }
                        prev.released.clone()
                    }
                    _ => {
                        let mut session = RecordingSession::new(self.inner.cfg.hard_cap_secs);
                        session.begin_permission();
                        let shared = Arc::new(Shared {
                            session: Mutex::new(session),
                            stop: CancellationToken::new(),
                            abort: CancellationToken::new(),
                            released: CancellationToken::new(),
                            outcome: Mutex::new(None),
                        });
                        *active = Some(shared.clone());
                        break shared;
                    }
                }
            };
            log::debug!("Waiting for the previous recording to release the device");
            releasing.cancelled().await;
        };
        let pending = PendingOpen(shared.clone());

        let mut stream = match self.inner.device.open(&self.inner.cfg.constraints).await {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Microphone open failed: {e}");
                return Err(e);
            }
        };

        if shared.abort.is_cancelled() {
            stream.close();
            return Err(CaptureError::Aborted);
        }

        let session_id = {
            let mut session = lock(&shared.session);
            session.begin_recording();
            session.id()
        };
        drop(pending);
        log::info!(
            "Recording started: session={:?} hard_cap={}s",
            session_id.0,
            self.inner.cfg.hard_cap_secs
        );

        let (tx, rx) = oneshot::channel();
        *lock(&shared.outcome) = Some(rx);
        tokio::spawn(drive_session(
            stream,
            shared.clone(),
            self.inner.cfg.chunk_interval,
            session_id,
            tx,
        ));

        Ok(Recording {
            _guard: Arc::new(shared.abort.clone().drop_guard()),
            shared,
        })
    }

    /// Discards any in-flight recording and releases the device.
    pub fn teardown(&self) {
        if let Some(shared) = lock(&self.inner.active).as_ref() {
            if shared.state().holds_device() {
                log::info!("Tearing down active recording");
            }
            shared.abort.cancel();
        }
    }
}

// Abandons a session whose device open failed, was aborted, or whose
// `start()` future was dropped while waiting on the permission prompt.
struct PendingOpen(Arc<Shared>);

impl Drop for PendingOpen {
    fn drop(&mut self) {
        let mut session = lock(&self.0.session);
        if session.state() == RecordingState::RequestingPermission {
            session.abandon();
            drop(session);
            self.0.released.cancel();
        }
    }
}

/// Handle to one recording. Dropping the last clone tears the recording down.
#[derive(Clone)]
pub struct Recording {
    shared: Arc<Shared>,
    _guard: Arc<DropGuard>,
}

impl std::fmt::Debug for Recording {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recording")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("elapsed_secs", &self.elapsed_secs())
            .finish()
    }
}

impl Recording {
    pub fn id(&self) -> SessionId {
        lock(&self.shared.session).id()
    }

    pub fn state(&self) -> RecordingState {
        self.shared.state()
    }

    pub fn elapsed_secs(&self) -> u32 {
        lock(&self.shared.session).elapsed_secs()
    }

    pub fn started_at(&self) -> Option<Instant> {
        lock(&self.shared.session).started_at()
    }

    /// Asks the session to stop without waiting. Returns false when it was
    /// not recording.
    pub fn request_stop(&self) -> bool {
        if self.state() != RecordingState::Recording {
            return false;
        }
        self.shared.stop.cancel();
        true
    }

    /// Stops a running recording and returns its outcome.
    ///
    /// A no-op (`None`) unless the session is currently recording.
    pub async fn stop(&self) -> Option<CaptureOutcome> {
        if !self.request_stop() {
            return None;
        }
        self.finished().await
    }

    /// Waits for the recording to end by any path (manual stop or hard cap).
    ///
    /// The outcome is handed out once; later callers get `None`.
    pub async fn finished(&self) -> Option<CaptureOutcome> {
        let rx = lock(&self.shared.outcome).take()?;
        rx.await.ok()
    }

    /// Discards the recording and releases the device.
    pub fn abort(&self) {
        self.shared.abort.cancel();
    }
}

async fn drive_session(
    mut stream: Box<dyn InputStream>,
    shared: Arc<Shared>,
    chunk_interval: Duration,
    session_id: SessionId,
    tx: oneshot::Sender<CaptureOutcome>,
) {
    let _released = shared.released.clone().drop_guard();
    let start = Instant::now();
    let mut tick = tokio::time::interval_at(start + TICK, TICK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut collect = tokio::time::interval_at(start + chunk_interval, chunk_interval);
    collect.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            biased;
            _ = shared.abort.cancelled() => {
                stream.close();
                lock(&shared.session).finish();
                log::info!("Recording discarded: session={:?}", session_id.0);
                return;
            }
            _ = shared.stop.cancelled() => break StopReason::Manual,
            _ = collect.tick() => {
                let chunk = stream.take_chunk();
                lock(&shared.session).push_chunk(chunk);
            }
            _ = tick.tick() => {
                if lock(&shared.session).tick() {
                    log::info!("Recording hit hard cap: session={:?}", session_id.0);
                    break StopReason::HardCap;
                }
            }
        }
    };

    let (chunks, duration_secs) = {
        let mut session = lock(&shared.session);
        session.begin_stopping();
        session.push_chunk(stream.take_chunk());
        (session.take_chunks(), session.elapsed_secs())
    };

    let result = stream.finalize(chunks);
    stream.close();
    let content_type = stream.content_type().to_string();
    let extension = stream.file_extension().to_string();
    drop(stream);
    lock(&shared.session).finish();

    let outcome = match result {
        Ok(bytes) => {
            log::info!(
                "Recording stopped: session={:?} reason={reason:?} secs={duration_secs} bytes={}",
                session_id.0,
                bytes.len()
            );
            let filename = format!("recording_{}.{extension}", session_id.0.simple());
            CaptureOutcome::Success {
                blob: AudioBlob::new(filename, content_type, bytes),
                duration_secs,
                reason,
            }
        }
        Err(error) => {
            log::error!("Recording finalize failed: {error}");
            CaptureOutcome::Failure { error }
        }
    };

    let _ = tx.send(outcome);
}
