pub mod backends;

use crate::model::InputEvent;

/// Boundary to the OS synthetic-input layer.
///
/// `emit` injects an ordered batch atomically and returns how many events the
/// input layer accepted. Any count short of `events.len()` is a hard failure
/// for the whole batch: the scheduler never retries, since a retry risks
/// duplicate or out-of-order keystrokes reaching the focused application.
pub trait InputEventEmitter {
    fn emit(&mut self, events: &[InputEvent]) -> usize;
}

impl<E: InputEventEmitter + ?Sized> InputEventEmitter for &mut E {
    fn emit(&mut self, events: &[InputEvent]) -> usize {
        (**self).emit(events)
    }
}

/// Emitter that records submitted batches instead of touching real OS input.
///
/// This is intended for tests/debugging. `fail_from` makes `emit` report zero
/// accepted events from that batch index onward, to exercise failure paths.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    pub batches: Vec<Vec<InputEvent>>,
    pub fail_from: Option<usize>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_from(batch: usize) -> Self {
        Self {
            batches: Vec::new(),
            fail_from: Some(batch),
        }
    }

    pub fn event_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }
}

impl InputEventEmitter for RecordingEmitter {
    fn emit(&mut self, events: &[InputEvent]) -> usize {
        let index = self.batches.len();
        self.batches.push(events.to_vec());
        match self.fail_from {
            Some(from) if index >= from => 0,
            _ => events.len(),
        }
    }
}

/// Emitter that accepts everything and drops it, for dry runs.
#[derive(Debug, Default)]
pub struct DiscardEmitter;

impl InputEventEmitter for DiscardEmitter {
    fn emit(&mut self, events: &[InputEvent]) -> usize {
        events.len()
    }
}
