use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use retype::emitter::{DiscardEmitter, InputEventEmitter, RecordingEmitter};
use retype::model::{InputEvent, TypingConfig};
use retype::scheduler::{
    events_for_cluster, JobStatus, Notice, Status, TypingJob, TypingScheduler,
};

fn quick_config() -> TypingConfig {
    TypingConfig {
        base_delay_ms: 0,
        jitter_max_ms: 0,
        countdown_secs: 0,
    }
}

fn scheduler<E: InputEventEmitter>(emitter: E) -> (TypingScheduler<E>, Receiver<Notice>) {
    let (tx, rx) = unbounded();
    let sched = TypingScheduler::with_rng(emitter, tx, StdRng::seed_from_u64(7));
    (sched, rx)
}

fn progress_values(notices: &[Notice]) -> Vec<u8> {
    notices
        .iter()
        .filter_map(|n| match n {
            Notice::Progress(p) => Some(*p),
            _ => None,
        })
        .collect()
}

#[test]
fn types_every_cluster_and_completes() {
    let text = "h\u{e9}\u{1F600}\n";
    let job = TypingJob::new(text, quick_config());
    let total = job.total();
    assert_eq!(total, 4);

    let mut rec = RecordingEmitter::new();
    let (sched, rx) = scheduler(&mut rec);
    let job = sched.run(job);

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.offset(), total);
    assert_eq!(rec.batches.len(), total);

    let notices: Vec<Notice> = rx.iter().collect();
    assert_eq!(notices.first(), Some(&Notice::Status(Status::Typing)));
    assert_eq!(notices.last(), Some(&Notice::Status(Status::Finished)));
}

#[test]
fn progress_is_monotonic_and_ends_at_100() {
    let job = TypingJob::new("abcdefghij", quick_config());

    let (sched, rx) = scheduler(DiscardEmitter);
    let job = sched.run(job);
    assert_eq!(job.status(), JobStatus::Completed);

    let notices: Vec<Notice> = rx.iter().collect();
    let progress = progress_values(&notices);
    assert_eq!(progress.len(), 10);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    assert_eq!(progress.last(), Some(&100));
}

#[test]
fn empty_text_stops_with_zero_progress() {
    let job = TypingJob::new("", quick_config());
    assert_eq!(job.total(), 0);

    let mut rec = RecordingEmitter::new();
    let (sched, rx) = scheduler(&mut rec);
    let job = sched.run(job);

    assert_eq!(job.status(), JobStatus::Stopped);
    assert_eq!(job.offset(), 0);
    assert!(rec.batches.is_empty());

    let notices: Vec<Notice> = rx.iter().collect();
    assert_eq!(
        notices,
        vec![Notice::Progress(0), Notice::Status(Status::Stopped)]
    );
}

#[test]
fn resume_past_the_end_is_declined() {
    let job = TypingJob::new("abc", quick_config()).resume(5);

    let mut rec = RecordingEmitter::new();
    let (sched, rx) = scheduler(&mut rec);
    let job = sched.run(job);

    assert_eq!(job.status(), JobStatus::Stopped);
    assert!(rec.batches.is_empty());

    let notices: Vec<Notice> = rx.iter().collect();
    assert_eq!(
        notices,
        vec![Notice::Progress(0), Notice::Status(Status::Stopped)]
    );
}

#[test]
fn resume_at_the_end_reports_finished() {
    let job = TypingJob::new("abc", quick_config()).resume(3);

    let mut rec = RecordingEmitter::new();
    let (sched, rx) = scheduler(&mut rec);
    let job = sched.run(job);

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.offset(), 3);
    assert!(rec.batches.is_empty());

    let notices: Vec<Notice> = rx.iter().collect();
    assert_eq!(
        notices,
        vec![Notice::Progress(100), Notice::Status(Status::Finished)]
    );
}

#[test]
fn emitter_shortfall_stops_the_run_immediately() {
    let job = TypingJob::new("abc", quick_config());

    let mut rec = RecordingEmitter::failing_from(0);
    let (sched, rx) = scheduler(&mut rec);
    let job = sched.run(job);

    assert_eq!(job.status(), JobStatus::Stopped);
    assert_eq!(job.offset(), 0);
    // One attempted batch, nothing after the failure.
    assert_eq!(rec.batches.len(), 1);

    let notices: Vec<Notice> = rx.iter().collect();
    assert_eq!(notices.last(), Some(&Notice::Status(Status::Stopped)));
    assert!(!notices.contains(&Notice::Status(Status::Finished)));
}

#[test]
fn emitter_shortfall_preserves_completed_offset() {
    let job = TypingJob::new("abcd", quick_config());

    let mut rec = RecordingEmitter::failing_from(2);
    let (sched, _rx) = scheduler(&mut rec);
    let job = sched.run(job);

    assert_eq!(job.status(), JobStatus::Stopped);
    // Two clusters landed; the third failed and was not advanced past.
    assert_eq!(job.offset(), 2);
    assert_eq!(rec.batches.len(), 3);
    assert!(job.is_incomplete());
}

/// Records batches and requests cancellation once `after` batches landed.
struct StopAfter {
    inner: RecordingEmitter,
    stop: Arc<AtomicBool>,
    after: usize,
}

impl InputEventEmitter for StopAfter {
    fn emit(&mut self, events: &[InputEvent]) -> usize {
        let accepted = self.inner.emit(events);
        if self.inner.batches.len() == self.after {
            self.stop.store(true, Ordering::SeqCst);
        }
        accepted
    }
}

#[test]
fn cancel_preserves_offset_and_resume_types_the_rest() {
    let text = "ab\u{1F600}de\n";
    let job = TypingJob::new(text, quick_config());
    let total = job.total();
    assert_eq!(total, 6);

    let stop = Arc::new(AtomicBool::new(false));
    let emitter = StopAfter {
        inner: RecordingEmitter::new(),
        stop: Arc::clone(&stop),
        after: 2,
    };

    let (tx, _rx) = unbounded();
    let sched = TypingScheduler::with_rng(emitter, tx, StdRng::seed_from_u64(7))
        .with_stop_flag(stop);
    let job = sched.run(job);

    assert_eq!(job.status(), JobStatus::Stopped);
    assert_eq!(job.offset(), 2);
    assert!(job.is_incomplete());

    // A new run over the same clusters picks up at the interruption point.
    let resumed = job.resume(job.offset());
    let mut rec = RecordingEmitter::new();
    let (sched, _rx) = scheduler(&mut rec);
    let resumed = sched.run(resumed);

    assert_eq!(resumed.status(), JobStatus::Completed);
    assert_eq!(resumed.offset(), total);

    let expected: Vec<Vec<InputEvent>> = job.clusters()[2..]
        .iter()
        .map(|c| events_for_cluster(c))
        .collect();
    assert_eq!(rec.batches, expected);
}

#[test]
fn cancellation_during_countdown_types_nothing() {
    let config = TypingConfig {
        base_delay_ms: 0,
        jitter_max_ms: 0,
        countdown_secs: 3,
    };
    let job = TypingJob::new("abc", config);

    let mut rec = RecordingEmitter::new();
    let (sched, rx) = scheduler(&mut rec);
    sched.stop_flag().store(true, Ordering::SeqCst);
    let job = sched.run(job);

    assert_eq!(job.status(), JobStatus::Stopped);
    assert_eq!(job.offset(), 0);
    assert!(rec.batches.is_empty());

    let notices: Vec<Notice> = rx.iter().collect();
    assert_eq!(notices, vec![Notice::Status(Status::Stopped)]);
}

#[test]
fn countdown_ticks_report_remaining_seconds() {
    let config = TypingConfig {
        base_delay_ms: 0,
        jitter_max_ms: 0,
        countdown_secs: 1,
    };
    let job = TypingJob::new("a", config);

    let (sched, rx) = scheduler(DiscardEmitter);
    let job = sched.run(job);
    assert_eq!(job.status(), JobStatus::Completed);

    let notices: Vec<Notice> = rx.iter().collect();
    assert_eq!(
        notices.first(),
        Some(&Notice::Status(Status::Preparing { seconds_left: 1 }))
    );
}

#[test]
fn worker_thread_run_cancels_via_handle() {
    let text: String = "x".repeat(200);
    let config = TypingConfig {
        base_delay_ms: 10,
        jitter_max_ms: 0,
        countdown_secs: 0,
    };
    let job = TypingJob::new(&text, config);

    let (tx, _rx) = unbounded();
    let handle = TypingScheduler::with_rng(DiscardEmitter, tx, StdRng::seed_from_u64(7)).spawn(job);

    std::thread::sleep(Duration::from_millis(50));
    handle.cancel();
    let job = handle.join().expect("worker should not panic");

    assert_eq!(job.status(), JobStatus::Stopped);
    assert!(job.offset() < job.total());
}
