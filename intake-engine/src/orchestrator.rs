//
// IntakeOrchestrator: record -> upload -> poll -> analyze -> create case.
//
// All mutable state sits behind one mutex and is republished on a watch
// channel after every change. Each session (a recording, a file submission,
// a retry) is tagged with a generation number; `reset()` bumps it, so late
// results from a cancelled session are dropped instead of clobbering the
// fresh state.

use std::sync::{Arc, Mutex, MutexGuard};

use intake_audio::{
    AudioDevice, CaptureConfig, CaptureOutcome, MediaCapture, Recording, StopReason,
};
use intake_core::analysis::AnalysisResult;
use intake_core::config::IntakeConfig;
use intake_core::error::{Failure, IntakeError};
use intake_core::job::TranscriptionJob;
use intake_core::payload::validate_payload;
use intake_core::text::{accept_transcript, clean_transcript};
use intake_core::types::{AudioBlob, CaseId, CaseRequest, ClientFields, JobId};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::poller::{JobPoller, PollOptions};
use crate::session::{IntakeSnapshot, IntakeStage};
use crate::submitter::JobSubmitter;
use crate::traits::{IntakeService, TranscriptionService};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct State {
    snap: IntakeSnapshot,
    generation: u64,
    cancel: CancellationToken,
    recording: Option<Recording>,
    blob: Option<AudioBlob>,
    last_error: Option<IntakeError>,
}

impl State {
    fn set_stage(&mut self, to: IntakeStage) {
        if self.snap.stage != to {
            log::info!("Intake stage: {} -> {}", self.snap.stage.label(), to.label());
            self.snap.stage = to;
        }
    }

    fn enter_error(&mut self, err: &IntakeError) {
        log::warn!("Intake failed: {err}");
        self.set_stage(IntakeStage::Error);
        self.snap.error = Some(Failure::from(err));
        self.snap.step_in_flight = false;
        self.last_error = Some(err.clone());
    }

    // Failure that is reported but does not move the stage.
    fn note_error(&mut self, err: &IntakeError) {
        log::warn!("Intake step failed: {err}");
        self.snap.error = Some(Failure::from(err));
        self.snap.step_in_flight = false;
        self.last_error = Some(err.clone());
    }

    fn clear_error(&mut self) {
        self.snap.error = None;
        self.last_error = None;
    }
}

struct Inner {
    cfg: IntakeConfig,
    capture: MediaCapture,
    submitter: JobSubmitter,
    poller: JobPoller,
    intake: Arc<dyn IntakeService>,
    state: Mutex<State>,
    tx: watch::Sender<IntakeSnapshot>,
}

impl Inner {
    // Cancels the current session: polling stops, the microphone is released,
    // and results still in flight become stale.
    fn abandon_session(&self, st: &mut State) {
        st.generation += 1;
        st.cancel.cancel();
        st.cancel = CancellationToken::new();
        if let Some(rec) = st.recording.take() {
            rec.abort();
        }
        // Also covers a start() still waiting on the permission prompt.
        self.capture.teardown();
    }
}

// Held only by caller-facing handles. Background tasks keep `Inner` alive
// but not this, so dropping the last handle ends the session.
struct Owner(Arc<Inner>);

impl Drop for Owner {
    fn drop(&mut self) {
        let mut st = lock(&self.0.state);
        if st.snap.stage != IntakeStage::Idle {
            log::info!("Intake dropped while {}", st.snap.stage.label());
        }
        self.0.abandon_session(&mut st);
    }
}

/// One intake flow. Cheap to clone; clones share state. Dropping the last
/// clone cancels whatever is in flight and releases the microphone.
#[derive(Clone)]
pub struct IntakeOrchestrator {
    inner: Arc<Inner>,
    _owner: Option<Arc<Owner>>,
}

impl std::fmt::Debug for IntakeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntakeOrchestrator")
            .field("cfg", &self.inner.cfg)
            .field("stage", &self.snapshot().stage)
            .finish()
    }
}

impl IntakeOrchestrator {
    pub fn new(
        cfg: IntakeConfig,
        device: Arc<dyn AudioDevice>,
        transcription: Arc<dyn TranscriptionService>,
        intake: Arc<dyn IntakeService>,
    ) -> Self {
        let capture = MediaCapture::new(device, CaptureConfig::from(&cfg));
        let (tx, _rx) = watch::channel(IntakeSnapshot::default());
        let inner = Arc::new(Inner {
            cfg,
            capture,
            submitter: JobSubmitter::new(transcription.clone()),
            poller: JobPoller::new(transcription),
            intake,
            state: Mutex::new(State::default()),
            tx,
        });
        Self {
            _owner: Some(Arc::new(Owner(inner.clone()))),
            inner,
        }
    }

    // Handle for background tasks; it does not keep the session owned.
    fn detached(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _owner: None,
        }
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.inner.cfg
    }

    pub fn snapshot(&self) -> IntakeSnapshot {
        lock(&self.inner.state).snap.clone()
    }

    pub fn stage(&self) -> IntakeStage {
        lock(&self.inner.state).snap.stage
    }

    /// Receives a fresh snapshot after every transition.
    pub fn subscribe(&self) -> watch::Receiver<IntakeSnapshot> {
        self.inner.tx.subscribe()
    }

    /// Seconds recorded so far, while a recording is live.
    pub fn recording_elapsed_secs(&self) -> Option<u32> {
        lock(&self.inner.state)
            .recording
            .as_ref()
            .map(Recording::elapsed_secs)
    }

    /// Applies `f` unless the session identified by `generation` was reset in
    /// the meantime, then publishes the new snapshot.
    fn update<R>(&self, generation: u64, f: impl FnOnce(&mut State) -> R) -> Option<R> {
        let mut st = lock(&self.inner.state);
        if st.generation != generation {
            log::debug!(
                "Dropping stale update (generation {generation}, current {})",
                st.generation
            );
            return None;
        }
        let out = f(&mut st);
        self.inner.tx.send_replace(st.snap.clone());
        Some(out)
    }

    /// Claims the flow for one step. Fails if the stage does not allow
    /// `action` or another step is still outstanding.
    fn begin_step(&self, allowed: &[IntakeStage], action: &str) -> Result<u64, IntakeError> {
        let mut st = lock(&self.inner.state);
        if !allowed.contains(&st.snap.stage) || st.snap.step_in_flight {
            return Err(IntakeError::invalid_transition(st.snap.stage, action));
        }
        st.snap.step_in_flight = true;
        self.inner.tx.send_replace(st.snap.clone());
        Ok(st.generation)
    }

    /// Acquires the microphone and starts recording. Valid only from `Idle`.
    ///
    /// The rest of the flow (upload, polling) starts on its own once the
    /// recording stops, manually or at the hard cap.
    ///
    /// Fails with `AlreadyRecording` while a recording holds the microphone or
    /// another start is still waiting for it.
    pub async fn start(&self) -> Result<(), IntakeError> {
        let generation = {
            let mut st = lock(&self.inner.state);
            match st.snap.stage {
                IntakeStage::Recording => return Err(IntakeError::AlreadyRecording),
                IntakeStage::Idle if st.snap.step_in_flight => {
                    return Err(IntakeError::AlreadyRecording);
                }
                IntakeStage::Idle => {}
                other => return Err(IntakeError::invalid_transition(other, "start recording")),
            }
            st.snap.step_in_flight = true;
            self.inner.tx.send_replace(st.snap.clone());
            st.generation
        };
        let _settle = SettleOnDrop {
            orchestrator: self.detached(),
            generation,
        };

        let rec = match self.inner.capture.start().await {
            Ok(rec) => rec,
            Err(e) => {
                let err = IntakeError::from(e);
                self.update(generation, |st| st.note_error(&err));
                return Err(err);
            }
        };

        let accepted = self.update(generation, |st| {
            st.clear_error();
            st.snap.step_in_flight = false;
            st.snap.has_audio = false;
            st.blob = None;
            st.recording = Some(rec.clone());
            st.set_stage(IntakeStage::Recording);
        });
        if accepted.is_none() {
            rec.abort();
            return Err(IntakeError::Cancelled);
        }

        tokio::spawn(self.detached().drive_recording(generation, rec));
        Ok(())
    }

    /// Requests the recording to stop. Returns false (and does nothing)
    /// unless a recording is live.
    pub fn stop(&self) -> bool {
        let st = lock(&self.inner.state);
        if st.snap.stage != IntakeStage::Recording {
            return false;
        }
        st.recording.as_ref().is_some_and(Recording::request_stop)
    }

    async fn drive_recording(self, generation: u64, rec: Recording) {
        let Some(outcome) = rec.finished().await else {
            return;
        };

        match outcome {
            CaptureOutcome::Success {
                blob,
                duration_secs,
                reason,
            } => {
                if reason == StopReason::HardCap {
                    log::info!("Recording reached the {duration_secs}s cap; submitting");
                }
                // The outcome is already in the snapshot; nobody awaits it here.
                if let Err(e) = self.run_pipeline(generation, blob).await {
                    log::debug!("Recorded intake ended without a transcript: {e}");
                }
            }
            CaptureOutcome::Failure { error } => {
                let err = IntakeError::from(error);
                self.update(generation, |st| {
                    st.recording = None;
                    st.enter_error(&err);
                });
            }
        }
    }

    /// Submits an existing audio/video payload. Valid only from `Idle`.
    ///
    /// Validation failures leave the stage at `Idle`; nothing is uploaded.
    /// Resolves once the transcript is ready or the job failed.
    pub async fn transcribe_file(&self, blob: AudioBlob) -> Result<TranscriptionJob, IntakeError> {
        let generation = {
            let mut st = lock(&self.inner.state);
            if st.snap.stage != IntakeStage::Idle || st.snap.step_in_flight {
                return Err(IntakeError::invalid_transition(
                    st.snap.stage,
                    "transcribe a file",
                ));
            }
            let cfg = &self.inner.cfg;
            if let Err(err) =
                validate_payload(&blob, cfg.size_limit_bytes, &cfg.allowed_type_prefixes)
            {
                st.note_error(&err);
                self.inner.tx.send_replace(st.snap.clone());
                return Err(err);
            }
            st.set_stage(IntakeStage::Uploading);
            st.generation
        };

        self.run_pipeline(generation, blob).await
    }

    /// Resubmits the payload kept from a failed upload or poll.
    pub async fn retry_upload(&self) -> Result<TranscriptionJob, IntakeError> {
        let (generation, blob) = {
            let mut st = lock(&self.inner.state);
            let blob = match (&st.blob, st.snap.stage) {
                (Some(blob), IntakeStage::Error) if !st.snap.step_in_flight => blob.clone(),
                _ => {
                    return Err(IntakeError::invalid_transition(
                        st.snap.stage,
                        "retry the upload",
                    ));
                }
            };
            st.set_stage(IntakeStage::Uploading);
            (st.generation, blob)
        };

        log::info!("Retrying upload of {}", blob.filename);
        self.run_pipeline(generation, blob).await
    }

    async fn run_pipeline(
        &self,
        generation: u64,
        blob: AudioBlob,
    ) -> Result<TranscriptionJob, IntakeError> {
        let _settle = SettleOnDrop {
            orchestrator: self.detached(),
            generation,
        };
        let inner = &self.inner;
        let cancel = self
            .update(generation, |st| {
                st.recording = None;
                st.blob = Some(blob.clone());
                st.clear_error();
                st.snap.has_audio = true;
                st.snap.job_id = None;
                st.snap.job = None;
                st.snap.poll_attempts = 0;
                st.set_stage(IntakeStage::Uploading);
                st.cancel.clone()
            })
            .ok_or(IntakeError::Cancelled)?;

        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IntakeError::Cancelled),
            res = inner.submitter.submit_with(&blob, &inner.cfg) => res,
        };
        let job_id: JobId = match submitted {
            Ok(id) => id,
            Err(err) => {
                self.update(generation, |st| st.enter_error(&err));
                return Err(err);
            }
        };

        self.update(generation, |st| {
            st.snap.job_id = Some(job_id.clone());
            st.set_stage(IntakeStage::Processing);
        })
        .ok_or(IntakeError::Cancelled)?;

        let polled = inner
            .poller
            .poll_with_hook(job_id, PollOptions::from(&inner.cfg), &cancel, |a| {
                self.update(generation, |st| st.snap.poll_attempts = a.attempt);
            })
            .await;

        match polled {
            Ok(job) => {
                let raw = job.text.clone().unwrap_or_default();
                self.update(generation, |st| {
                    st.snap.transcript = Some(clean_transcript(&raw));
                    st.snap.raw_transcript = Some(raw);
                    st.snap.job = Some(job.clone());
                    st.set_stage(IntakeStage::Completed);
                })
                .ok_or(IntakeError::Cancelled)?;
                Ok(job)
            }
            Err(IntakeError::Cancelled) => Err(IntakeError::Cancelled),
            Err(err) => {
                self.update(generation, |st| st.enter_error(&err));
                Err(err)
            }
        }
    }

    /// Waits until no recording/upload/poll is in flight and returns the
    /// snapshot at that point.
    pub async fn wait_until_settled(&self) -> IntakeSnapshot {
        let mut rx = self.subscribe();
        match rx
            .wait_for(|s| !s.stage.is_busy() && !s.step_in_flight)
            .await
        {
            Ok(snap) => snap.clone(),
            // The sender lives as long as `self`.
            Err(_) => self.snapshot(),
        }
    }

    /// Waits for the current session to produce a transcript.
    pub async fn wait_for_transcript(&self) -> Result<String, IntakeError> {
        let snap = self.wait_until_settled().await;
        if snap.stage.has_transcript() {
            return Ok(snap.transcript.unwrap_or_default());
        }
        Err(lock(&self.inner.state)
            .last_error
            .clone()
            .unwrap_or(IntakeError::Cancelled))
    }

    /// Classifies the current transcript. Best-effort: on failure the stage
    /// stays where it was and the transcript is untouched.
    pub async fn analyze(&self) -> Result<AnalysisResult, IntakeError> {
        self.run_analysis(None).await
    }

    /// Like [`analyze`](Self::analyze), with text the user edited.
    pub async fn analyze_text(&self, text: &str) -> Result<AnalysisResult, IntakeError> {
        self.run_analysis(Some(text)).await
    }

    async fn run_analysis(&self, text: Option<&str>) -> Result<AnalysisResult, IntakeError> {
        let generation = self.begin_step(
            &[IntakeStage::Completed, IntakeStage::Analyzed],
            "analyze",
        )?;
        let source = match text {
            Some(t) => t.to_string(),
            None => self.snapshot().transcript.unwrap_or_default(),
        };

        let Some(text) = accept_transcript(&source) else {
            let err = IntakeError::AnalysisFailed("no transcript text to analyze".into());
            self.update(generation, |st| st.note_error(&err));
            return Err(err);
        };

        match self.inner.intake.analyze(&text).await {
            Ok(analysis) => {
                log::info!(
                    "Analysis: category={:?} urgency={:?}",
                    analysis.category,
                    analysis.urgency
                );
                self.update(generation, |st| {
                    st.clear_error();
                    st.snap.step_in_flight = false;
                    st.snap.transcript = Some(text);
                    st.snap.analysis = Some(analysis.clone());
                    st.set_stage(IntakeStage::Analyzed);
                })
                .ok_or(IntakeError::Cancelled)?;
                Ok(analysis)
            }
            Err(e) => {
                let err = IntakeError::AnalysisFailed(format!("{e:#}"));
                self.update(generation, |st| st.note_error(&err));
                Err(err)
            }
        }
    }

    /// Creates a case from the transcript. On failure the stage is kept so
    /// the call can be retried.
    pub async fn create_case(
        &self,
        client: ClientFields,
        title: &str,
    ) -> Result<CaseId, IntakeError> {
        let generation = self.begin_step(
            &[IntakeStage::Completed, IntakeStage::Analyzed],
            "create a case",
        )?;
        let text = self.snapshot().transcript.unwrap_or_default();
        let req = CaseRequest::new(text, title, client);

        if req.text.trim().is_empty() {
            let err = IntakeError::CaseCreationFailed("no text provided".into());
            self.update(generation, |st| st.note_error(&err));
            return Err(err);
        }

        match self.inner.intake.create_case(&req).await {
            Ok(case_id) => {
                log::info!("Case created: id={case_id}");
                self.update(generation, |st| {
                    st.clear_error();
                    st.snap.step_in_flight = false;
                    st.snap.case_id = Some(case_id);
                    st.set_stage(IntakeStage::Done);
                })
                .ok_or(IntakeError::Cancelled)?;
                Ok(case_id)
            }
            Err(e) => {
                let err = IntakeError::CaseCreationFailed(format!("{e:#}"));
                self.update(generation, |st| st.note_error(&err));
                Err(err)
            }
        }
    }

    /// Returns to `Idle` from any stage: cancels polling, releases the
    /// microphone, and forgets the session.
    pub fn reset(&self) {
        let mut st = lock(&self.inner.state);
        self.inner.abandon_session(&mut st);

        st.blob = None;
        st.last_error = None;
        if st.snap.stage != IntakeStage::Idle {
            log::info!("Intake reset from {}", st.snap.stage.label());
        }
        st.snap = IntakeSnapshot::default();
        self.inner.tx.send_replace(st.snap.clone());
    }
}

// Runs when a start or a pipeline ends by any path, including its caller
// dropping the future at the permission prompt or mid-poll. Without it the
// flow would stay claimed, or in Uploading/Processing, forever.
struct SettleOnDrop {
    orchestrator: IntakeOrchestrator,
    generation: u64,
}

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        self.orchestrator.update(self.generation, |st| {
            if st.snap.stage == IntakeStage::Idle && st.snap.step_in_flight {
                st.snap.step_in_flight = false;
            } else if st.snap.stage.is_busy() && st.snap.stage != IntakeStage::Recording {
                st.enter_error(&IntakeError::Cancelled);
            }
        });
    }
}
