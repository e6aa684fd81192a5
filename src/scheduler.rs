use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam_channel::Sender;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::emitter::InputEventEmitter;
use crate::encode::code_units;
use crate::grapheme;
use crate::model::{EventKind, InputEvent, KeyState, TypingConfig, VK_RETURN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    CountingDown,
    Typing,
    Completed,
    Stopped,
}

/// Status tags sent over the notification channel. Consumers decide how to
/// render them; the scheduler only defines the tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Preparing { seconds_left: u64 },
    Typing,
    Stopped,
    Finished,
}

/// One-way, fire-and-forget notification from the scheduler to its caller.
/// Delivery order matches emission order; the scheduler never blocks on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Status(Status),
    Progress(u8),
}

/// The unit of work: an immutable cluster sequence plus resumable progress.
#[derive(Debug, Clone)]
pub struct TypingJob {
    clusters: Arc<[String]>,
    offset: usize,
    config: TypingConfig,
    status: JobStatus,
}

impl TypingJob {
    /// Segment `text` once; the cluster sequence is fixed for the job's life.
    pub fn new(text: &str, config: TypingConfig) -> Self {
        Self {
            clusters: grapheme::segment(text).into(),
            offset: 0,
            config,
            status: JobStatus::Idle,
        }
    }

    /// A new run over the same clusters, starting at `start_offset`.
    ///
    /// `start_offset > total` is accepted here and declined by the scheduler
    /// as "nothing pending".
    pub fn resume(&self, start_offset: usize) -> Self {
        Self {
            clusters: Arc::clone(&self.clusters),
            offset: start_offset,
            config: self.config,
            status: JobStatus::Idle,
        }
    }

    pub fn clusters(&self) -> &[String] {
        &self.clusters
    }

    pub fn total(&self) -> usize {
        self.clusters.len()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn config(&self) -> TypingConfig {
        self.config
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Offset short of total on a stopped job signals an incomplete run.
    pub fn is_incomplete(&self) -> bool {
        self.status == JobStatus::Stopped && self.offset < self.total()
    }
}

/// Build the event batch for one cluster: all downs in unit order, then all
/// ups in the same order, so multi-unit clusters (surrogate pairs, ZWJ
/// sequences) are perceived as simultaneous input. A literal newline becomes
/// a Return virtual-key pair instead of Unicode units.
pub fn events_for_cluster(cluster: &str) -> Vec<InputEvent> {
    if cluster == "\n" {
        return vec![
            InputEvent::virtual_key(VK_RETURN, KeyState::Pressed),
            InputEvent::virtual_key(VK_RETURN, KeyState::Released),
        ];
    }

    let units = code_units(cluster);
    let mut events = Vec::with_capacity(units.len() * 2);
    for &unit in &units {
        events.push(InputEvent::code_unit(unit, KeyState::Pressed));
    }
    for &unit in &units {
        events.push(InputEvent::code_unit(unit, KeyState::Released));
    }
    events
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JobStats {
    pub clusters: usize,
    pub code_units: usize,
    pub input_events: usize,
    pub est_wait_ms: u64,
}

/// Size and duration estimate for the pending part of a job.
pub fn stats(job: &TypingJob) -> JobStats {
    let mut out = JobStats::default();
    let pending = job.clusters().iter().skip(job.offset());
    for cluster in pending {
        out.clusters += 1;
        let events = events_for_cluster(cluster);
        out.input_events += events.len();
        out.code_units += events
            .iter()
            .filter(|e| e.kind == EventKind::CodeUnit && e.state == KeyState::Pressed)
            .count();
    }

    let cfg = job.config();
    let per_cluster = cfg.base_delay_ms + cfg.jitter_max_ms / 2;
    out.est_wait_ms = cfg.countdown_secs * 1000 + out.clusters as u64 * per_cluster;
    out
}

/// Sleep for up to `ms`, returning early if `stop` is set.
///
/// Sleeps in bounded chunks and re-checks the flag before each one, so
/// cancellation latency is at most one chunk and no CPU is burned spinning.
pub fn sleep_cancelable(stop: &AtomicBool, ms: u64) {
    const CHUNK_MS: u64 = 10;

    let mut remaining = ms;
    while remaining > 0 {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let step = remaining.min(CHUNK_MS);
        thread::sleep(Duration::from_millis(step));
        remaining -= step;
    }
}

/// Drives one run of a [`TypingJob`]: countdown, paced emission, terminal
/// state. All failures surface through the notice channel plus the returned
/// job's status and offset; nothing is thrown across the thread boundary.
pub struct TypingScheduler<E> {
    emitter: E,
    notices: Sender<Notice>,
    stop: Arc<AtomicBool>,
    rng: StdRng,
}

/// Handle to a run executing on its own worker thread.
pub struct RunHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<TypingJob>,
}

impl RunHandle {
    /// Request cooperative cancellation; the run stops within one wait chunk.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Shared stop flag, e.g. for a Ctrl+C handler.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the run and hand back the job in its terminal state.
    pub fn join(self) -> Result<TypingJob> {
        self.thread
            .join()
            .map_err(|_| anyhow!("typing worker panicked"))
    }
}

impl<E: InputEventEmitter> TypingScheduler<E> {
    pub fn new(emitter: E, notices: Sender<Notice>) -> Self {
        Self::with_rng(emitter, notices, StdRng::from_entropy())
    }

    /// Seeded variant for deterministic pacing in tests.
    pub fn with_rng(emitter: E, notices: Sender<Notice>, rng: StdRng) -> Self {
        Self {
            emitter,
            notices,
            stop: Arc::new(AtomicBool::new(false)),
            rng,
        }
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Substitute an externally created stop flag, e.g. one already wired to
    /// a signal handler.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn notify(&self, notice: Notice) {
        // Fire-and-forget: a caller that dropped its receiver just stops
        // listening, it does not stop the run.
        let _ = self.notices.send(notice);
    }

    /// Run the state machine to a terminal state on the current thread.
    pub fn run(mut self, mut job: TypingJob) -> TypingJob {
        job.status = JobStatus::CountingDown;
        for remaining in (1..=job.config.countdown_secs).rev() {
            if self.stopped() {
                job.status = JobStatus::Stopped;
                self.notify(Notice::Status(Status::Stopped));
                return job;
            }
            self.notify(Notice::Status(Status::Preparing {
                seconds_left: remaining,
            }));
            sleep_cancelable(&self.stop, 1000);
        }
        if self.stopped() {
            job.status = JobStatus::Stopped;
            self.notify(Notice::Status(Status::Stopped));
            return job;
        }

        let total = job.total();

        // Empty text and an out-of-range resume offset both mean "nothing
        // pending"; neither counts as a successful completion.
        if total == 0 || job.offset > total {
            job.status = JobStatus::Stopped;
            self.notify(Notice::Progress(0));
            self.notify(Notice::Status(Status::Stopped));
            return job;
        }

        // Resuming a job that already reached the end is already done.
        if job.offset == total {
            job.status = JobStatus::Completed;
            self.notify(Notice::Progress(100));
            self.notify(Notice::Status(Status::Finished));
            return job;
        }

        job.status = JobStatus::Typing;
        self.notify(Notice::Status(Status::Typing));

        for idx in job.offset..total {
            if self.stopped() {
                job.offset = idx;
                job.status = JobStatus::Stopped;
                self.notify(Notice::Status(Status::Stopped));
                return job;
            }

            let events = events_for_cluster(&job.clusters[idx]);
            let accepted = self.emitter.emit(&events);
            if accepted < events.len() {
                // No retry: re-sending risks duplicate keystrokes landing in
                // the focused application. The offset stays at the failed
                // cluster so the caller can resume later.
                job.offset = idx;
                job.status = JobStatus::Stopped;
                self.notify(Notice::Status(Status::Stopped));
                return job;
            }

            job.offset = idx + 1;

            let mut delay = job.config.base_delay_ms;
            if job.config.jitter_max_ms > 0 {
                delay += self.rng.gen_range(0..job.config.jitter_max_ms);
            }
            if delay > 0 {
                sleep_cancelable(&self.stop, delay);
            }

            let progress = ((job.offset as f64 / total as f64) * 100.0).round() as u8;
            self.notify(Notice::Progress(progress));
        }

        job.status = JobStatus::Completed;
        self.notify(Notice::Status(Status::Finished));
        job
    }

    /// Run on a dedicated worker thread so emission and pacing never block
    /// the caller.
    pub fn spawn(self, job: TypingJob) -> RunHandle
    where
        E: Send + 'static,
    {
        let stop = Arc::clone(&self.stop);
        let thread = thread::spawn(move || self.run(job));
        RunHandle { stop, thread }
    }
}
