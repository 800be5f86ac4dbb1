//! Shared-password visibility gate.
//!
//! This hides the chat surface from casual visitors. It is a capability flag
//! on the session, nothing more: the comparison is a plain string equality
//! against a single shared value, and it protects no data.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    /// No attempt made yet.
    Locked,
    /// Last attempt did not match.
    Rejected,
    /// Matched once; stays open for the rest of the session.
    Unlocked,
}

#[derive(Debug, Clone)]
pub struct AccessGate {
    state: GateState,
}

pub const REJECTED_MESSAGE: &str = "Password incorrect";

impl AccessGate {
    /// Gate that needs the shared password before the chat is shown.
    pub fn locked() -> Self {
        Self {
            state: GateState::Locked,
        }
    }

    /// Gate for sessions that have nothing to hide behind.
    pub fn open() -> Self {
        Self {
            state: GateState::Unlocked,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == GateState::Unlocked
    }

    /// Error text to show next to the password box, if any.
    pub fn error(&self) -> Option<&'static str> {
        match self.state {
            GateState::Rejected => Some(REJECTED_MESSAGE),
            _ => None,
        }
    }

    /// Compare `input` against the shared value. The input is not retained.
    ///
    /// Once unlocked, further attempts are ignored and report success.
    pub fn attempt(&mut self, input: &str, shared: &str) -> bool {
        if self.is_unlocked() {
            return true;
        }
        self.state = if input == shared {
            GateState::Unlocked
        } else {
            GateState::Rejected
        };
        self.is_unlocked()
    }
}
