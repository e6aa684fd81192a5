use serde::{Deserialize, Serialize};

/// Win32 virtual-key code for Return, the one key submitted as a key event
/// rather than as Unicode code units.
pub const VK_RETURN: u16 = 0x0D;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    VirtualKey,
    CodeUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Pressed,
    Released,
}

/// One synthetic key event handed to the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    pub kind: EventKind,
    pub value: u16,
    pub state: KeyState,
}

impl InputEvent {
    pub fn code_unit(unit: u16, state: KeyState) -> Self {
        Self {
            kind: EventKind::CodeUnit,
            value: unit,
            state,
        }
    }

    pub fn virtual_key(code: u16, state: KeyState) -> Self {
        Self {
            kind: EventKind::VirtualKey,
            value: code,
            state,
        }
    }
}

/// Pacing parameters for a typing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingConfig {
    /// Fixed delay after every cluster, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound of the additive uniform jitter, in milliseconds.
    pub jitter_max_ms: u64,
    /// Seconds to wait before the first keystroke, for focus switching.
    pub countdown_secs: u64,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 10,
            jitter_max_ms: 5,
            countdown_secs: 3,
        }
    }
}

pub const SESSION_VERSION: u32 = 1;

/// Persisted state of an interrupted run, enough to resume it later.
///
/// The caller owns persistence; the scheduler never touches files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub version: u32,
    pub text: String,
    pub offset: usize,
    pub config: TypingConfig,
}

impl Session {
    pub fn new(text: String, offset: usize, config: TypingConfig) -> Self {
        Self {
            version: SESSION_VERSION,
            text,
            offset,
            config,
        }
    }
}
