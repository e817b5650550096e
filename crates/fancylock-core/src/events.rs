//! Events delivered to the lock session

use tokio::sync::mpsc;

use crate::auth::AuthResult;

/// Keys the session distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    /// Submit
    Enter,
    /// Erase the last character
    Backspace,
    /// Clear the buffer (or debug exit)
    Escape,
    /// Printable character
    Char(char),
    /// Anything else (function keys, modifiers)
    Other,
}

/// A key transition reported by the display adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    /// True on press, false on release. Releases are ignored.
    pub pressed: bool,
}

impl KeyEvent {
    /// Key press
    pub fn press(code: KeyCode) -> Self {
        Self { code, pressed: true }
    }

    /// Key release
    pub fn release(code: KeyCode) -> Self {
        Self {
            code,
            pressed: false,
        }
    }
}

/// Everything that mutates session state arrives through this enum
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Keyboard input from the display adapter
    Key(KeyEvent),
    /// A verification finished on the blocking worker. `attempt` identifies
    /// the submission it answers; results for any other attempt are dropped.
    AuthCompleted { attempt: u64, result: AuthResult },
}

/// Sender half handed to the display adapter
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Receiver half owned by the controller
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Create the serialized session event channel
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
