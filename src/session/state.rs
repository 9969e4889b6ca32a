// SPDX-License-Identifier: GPL-3.0-only

//! Capture session state machine

use crate::errors::{SessionError, SessionResult};
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Lifecycle state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Configuring,
    Committed,
    Started,
    Released,
}

impl SessionState {
    /// States reachable from this one
    pub fn allowed_targets(self) -> &'static [SessionState] {
        use SessionState::*;
        match self {
            Idle => &[Configuring, Released],
            Configuring => &[Committed, Released],
            Committed => &[Configuring, Started, Released],
            Started => &[Committed, Released],
            Released => &[],
        }
    }

    pub fn can_transfer_to(self, target: SessionState) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Committed or Started
    pub fn is_committed(self) -> bool {
        matches!(self, SessionState::Committed | SessionState::Started)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Configuring => "configuring",
            SessionState::Committed => "committed",
            SessionState::Started => "started",
            SessionState::Released => "released",
        };
        write!(f, "{}", name)
    }
}

/// Current state behind one lock
#[derive(Debug, Default)]
pub struct StateMachine {
    current: Mutex<SessionState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> SessionState {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hold the state lock for a check-then-transfer sequence
    pub fn guard(&self) -> StateGuard<'_> {
        StateGuard {
            state: self.current.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }
}

/// Exclusive view of the session state
pub struct StateGuard<'a> {
    state: MutexGuard<'a, SessionState>,
}

impl StateGuard<'_> {
    pub fn state(&self) -> SessionState {
        *self.state
    }

    pub fn can_transfer_to(&self, target: SessionState) -> bool {
        self.state.can_transfer_to(target)
    }

    /// Move to `target` if the transition table allows it
    pub fn transfer(&mut self, target: SessionState) -> SessionResult<()> {
        let from = *self.state;
        if !from.can_transfer_to(target) {
            debug!(%from, to = %target, "Rejected session state transfer");
            return Err(SessionError::not_allowed(format!(
                "cannot move session from {from} to {target}"
            )));
        }
        debug!(%from, to = %target, "Session state transfer");
        *self.state = target;
        Ok(())
    }
}
