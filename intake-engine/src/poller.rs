use std::sync::Arc;
use std::time::Duration;

use intake_core::config::IntakeConfig;
use intake_core::error::IntakeError;
use intake_core::job::{JobState, JobStatus, TranscriptionJob};
use intake_core::types::JobId;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::traits::TranscriptionService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollOptions {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl From<&IntakeConfig> for PollOptions {
    fn from(cfg: &IntakeConfig) -> Self {
        Self::new(
            Duration::from_millis(cfg.poll_interval_ms),
            cfg.max_poll_attempts,
        )
    }
}

/// Progress report emitted after every status call.
#[derive(Debug, Clone, PartialEq)]
pub struct PollAttempt {
    /// 1-based.
    pub attempt: u32,
    pub max_attempts: u32,
    pub elapsed: Duration,

    // None when the status could not be fetched.
    pub status: Option<JobStatus>,
}

/// Fixed-interval status polling for one job at a time.
#[derive(Clone)]
pub struct JobPoller {
    service: Arc<dyn TranscriptionService>,
}

impl JobPoller {
    pub fn new(service: Arc<dyn TranscriptionService>) -> Self {
        Self { service }
    }

    pub async fn poll(
        &self,
        id: JobId,
        opts: PollOptions,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionJob, IntakeError> {
        self.poll_with_hook(id, opts, cancel, |_| {}).await
    }

    /// Polls until the job is terminal, attempts run out, or `cancel` fires.
    ///
    /// The first status call is immediate; later ones are `opts.interval`
    /// apart. Exactly `opts.max_attempts` calls are made at most, and there is
    /// no wait after the last one.
    pub async fn poll_with_hook<F>(
        &self,
        id: JobId,
        opts: PollOptions,
        cancel: &CancellationToken,
        mut on_attempt: F,
    ) -> Result<TranscriptionJob, IntakeError>
    where
        F: FnMut(&PollAttempt),
    {
        let started = Instant::now();
        let mut job = TranscriptionJob::submitted(id);
        let mut last_error: Option<String> = None;

        for attempt in 0..opts.max_attempts {
            if attempt > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled(&job)),
                    _ = tokio::time::sleep(opts.interval) => {}
                }
            }

            let res = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(&job)),
                res = self.service.status(&job.id) => res,
            };

            let status = match res {
                Ok(report) => {
                    log::debug!(
                        "Poll {}/{} job={} status={}",
                        attempt + 1,
                        opts.max_attempts,
                        job.id,
                        report.status.as_str()
                    );
                    if let JobStatus::Other(raw) = &report.status {
                        log::debug!("Unrecognized status {raw:?}, treating as pending");
                    }
                    job.apply(&report);
                    Some(report.status)
                }
                Err(e) => {
                    log::warn!(
                        "Poll {}/{} job={} failed: {e:#}",
                        attempt + 1,
                        opts.max_attempts,
                        job.id
                    );
                    job.record_missed_attempt();
                    last_error = Some(format!("{e:#}"));
                    None
                }
            };

            on_attempt(&PollAttempt {
                attempt: attempt + 1,
                max_attempts: opts.max_attempts,
                elapsed: started.elapsed(),
                status,
            });

            match job.state {
                JobState::Completed => {
                    log::info!("Transcription completed: job={} attempts={}", job.id, job.attempts);
                    return Ok(job);
                }
                JobState::Error => {
                    let msg = job.error_message.clone().unwrap_or_default();
                    log::warn!("Transcription failed: job={} error={msg}", job.id);
                    return Err(IntakeError::RemoteError(msg));
                }
                _ => {}
            }
        }

        let err = IntakeError::Timeout {
            attempts: opts.max_attempts,
            last_error,
        };
        job.time_out(err.to_string());
        log::warn!("Transcription timed out: job={} attempts={}", job.id, job.attempts);
        Err(err)
    }

    /// Runs [`poll`](Self::poll) in the background.
    ///
    /// `on_complete` runs once with the terminal result, unless the handle is
    /// cancelled first, in which case it never runs.
    pub fn spawn<C>(&self, id: JobId, opts: PollOptions, on_complete: C) -> PollHandle
    where
        C: FnOnce(Result<TranscriptionJob, IntakeError>) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let poller = self.clone();

        let task = tokio::spawn(async move {
            let res = poller.poll(id, opts, &token).await;
            if token.is_cancelled() {
                return;
            }
            on_complete(res);
        });

        PollHandle {
            cancel,
            task: Some(task),
        }
    }
}

fn cancelled(job: &TranscriptionJob) -> IntakeError {
    log::info!("Polling cancelled: job={} attempts={}", job.id, job.attempts);
    IntakeError::Cancelled
}

#[derive(Debug)]
pub struct PollHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Stops scheduling status calls. Takes effect at the next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        // A dropped handle means nobody is left to observe the result.
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use intake_core::job::StatusReport;
    use intake_core::types::AudioBlob;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    enum Step {
        Report(StatusReport),
        Fail(&'static str),
    }

    struct Scripted {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
        call_times: Mutex<Vec<Instant>>,
    }

    impl Scripted {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                calls: AtomicUsize::new(0),
                call_times: Mutex::new(Vec::new()),
            })
        }

        fn statuses(list: &[&str]) -> Arc<Self> {
            Self::new(
                list.iter()
                    .map(|s| Step::Report(StatusReport::new(JobStatus::parse(s))))
                    .collect(),
            )
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TranscriptionService for Scripted {
        async fn upload(&self, _blob: &AudioBlob) -> anyhow::Result<JobId> {
            unreachable!()
        }

        async fn status(&self, _job: &JobId) -> anyhow::Result<StatusReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.call_times.lock().unwrap().push(Instant::now());
            // Past the end of the script the job stays in processing.
            match self.steps.lock().unwrap().pop_front() {
                Some(Step::Report(r)) => Ok(r),
                Some(Step::Fail(msg)) => Err(anyhow::anyhow!(msg)),
                None => Ok(StatusReport::new(JobStatus::Processing)),
            }
        }
    }

    fn opts(max: u32) -> PollOptions {
        PollOptions::new(Duration::from_millis(1_500), max)
    }

    #[tokio::test(start_paused = true)]
    async fn completes_after_exactly_three_attempts() {
        let svc = Scripted::new(vec![
            Step::Report(StatusReport::new(JobStatus::Queued)),
            Step::Report(StatusReport::new(JobStatus::Processing)),
            Step::Report(StatusReport::completed("client slipped at store")),
        ]);
        let poller = JobPoller::new(svc.clone());

        let t0 = Instant::now();
        let job = poller
            .poll(JobId::new("job-123"), opts(10), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.text.as_deref(), Some("client slipped at store"));
        assert_eq!(job.attempts, 3);
        assert_eq!(svc.calls(), 3);

        let times = svc.call_times.lock().unwrap().clone();
        assert_eq!(times[0], t0);
        assert_eq!(times[1] - times[0], Duration::from_millis(1_500));
        assert_eq!(times[2] - times[1], Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_without_an_extra_call() {
        let svc = Scripted::statuses(&[]);
        let poller = JobPoller::new(svc.clone());

        let t0 = Instant::now();
        let err = poller
            .poll(JobId::new("j"), opts(4), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            IntakeError::Timeout {
                attempts: 4,
                last_error: None
            }
        );
        assert_eq!(svc.calls(), 4);
        // Three waits between four calls, none after the last.
        assert_eq!(t0.elapsed(), Duration::from_millis(4_500));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(svc.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_error_is_terminal() {
        let svc = Scripted::new(vec![
            Step::Report(StatusReport::new(JobStatus::Processing)),
            Step::Report(StatusReport::failed("audio could not be decoded")),
        ]);
        let poller = JobPoller::new(svc.clone());
        let err = poller
            .poll(JobId::new("j"), opts(10), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, IntakeError::RemoteError("audio could not be decoded".into()));
        assert_eq!(svc.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_and_fetch_errors_count_as_pending() {
        let svc = Scripted::new(vec![
            Step::Report(StatusReport::new(JobStatus::parse("transcoding"))),
            Step::Fail("HTTP 500: provider down"),
            Step::Report(StatusReport::completed("ok")),
        ]);
        let poller = JobPoller::new(svc.clone());

        let mut seen = Vec::new();
        let job = poller
            .poll_with_hook(JobId::new("j"), opts(5), &CancellationToken::new(), |a| {
                seen.push((a.attempt, a.status.clone()))
            })
            .await
            .unwrap();

        assert_eq!(job.attempts, 3);
        assert_eq!(
            seen,
            vec![
                (1, Some(JobStatus::Other("transcoding".into()))),
                (2, None),
                (3, Some(JobStatus::Completed)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_names_last_fetch_error() {
        let svc = Scripted::new(vec![Step::Fail("connection refused"), Step::Fail("HTTP 502")]);
        let poller = JobPoller::new(svc);
        let err = poller
            .poll(JobId::new("j"), opts(2), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            IntakeError::Timeout {
                attempts: 2,
                last_error: Some("HTTP 502".into())
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_calls_and_skips_completion() {
        let svc = Scripted::statuses(&["queued", "processing"]);
        let poller = JobPoller::new(svc.clone());
        let completed = Arc::new(AtomicBool::new(false));
        let flag = completed.clone();

        let handle = poller.spawn(JobId::new("j"), opts(10), move |_| {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(1_600)).await;
        assert_eq!(svc.calls(), 2);

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(handle.is_finished());
        handle.join().await;

        assert_eq!(svc.calls(), 2);
        assert!(!completed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_poll_reports_completion() {
        let svc = Scripted::statuses(&["processing", "completed"]);
        let poller = JobPoller::new(svc);
        let (tx, rx) = tokio::sync::oneshot::channel();

        let _handle = poller.spawn(JobId::new("j"), opts(10), move |res| {
            let _ = tx.send(res);
        });

        let job = rx.await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.text.as_deref(), Some(""));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_times_out_immediately() {
        let svc = Scripted::statuses(&["completed"]);
        let poller = JobPoller::new(svc.clone());
        let err = poller
            .poll(JobId::new("j"), opts(0), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), intake_core::error::ErrorKind::Timeout);
        assert_eq!(svc.calls(), 0);
    }
}
