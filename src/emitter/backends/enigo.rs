use anyhow::{Context, Result};
use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use crate::emitter::InputEventEmitter;
use crate::model::{EventKind, InputEvent, KeyState, VK_RETURN};

/// Injection backend built on `enigo`.
///
/// enigo's API is one level above raw code units: it takes whole text and
/// named keys. A batch is therefore collapsed back into its pressed content:
/// code-unit downs are reassembled into the cluster string and injected in
/// one `text` call (so surrogate pairs land as a single perceived keystroke),
/// and a Return virtual key becomes a key click. The matching releases carry
/// no extra information and are counted as accepted alongside their downs.
pub struct EnigoEmitter {
    enigo: Enigo,
}

impl EnigoEmitter {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .context("failed to initialize the enigo input backend")?;
        Ok(Self { enigo })
    }
}

impl InputEventEmitter for EnigoEmitter {
    fn emit(&mut self, events: &[InputEvent]) -> usize {
        let mut units: Vec<u16> = Vec::new();
        let mut press_return = false;

        for event in events {
            if event.state != KeyState::Pressed {
                continue;
            }
            match event.kind {
                EventKind::CodeUnit => units.push(event.value),
                EventKind::VirtualKey if event.value == VK_RETURN => press_return = true,
                EventKind::VirtualKey => return 0,
            }
        }

        if press_return && self.enigo.key(Key::Return, Direction::Click).is_err() {
            return 0;
        }

        if !units.is_empty() {
            let text = String::from_utf16_lossy(&units);
            if self.enigo.text(&text).is_err() {
                return 0;
            }
        }

        events.len()
    }
}
