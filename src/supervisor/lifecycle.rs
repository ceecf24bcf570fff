use std::{fmt, sync::Arc};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// Coarse-grained process state owned by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Starting,
    Listening,
    ShuttingDown,
    Stopped,
}

impl LifecycleState {
    /// `Starting -> Stopped` is the startup-abort edge; every other edge moves one step forward.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Starting, Listening) | (Starting, Stopped) | (Listening, ShuttingDown) | (ShuttingDown, Stopped)
        )
    }

    pub fn accepts_connections(self) -> bool {
        self == LifecycleState::Listening
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Listening => "listening",
            LifecycleState::ShuttingDown => "shutting_down",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal lifecycle transition from {from} to {to}")]
pub struct TransitionError {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// Shared handle to the server lifecycle state machine.
#[derive(Clone)]
pub struct Lifecycle {
    state: Arc<watch::Sender<LifecycleState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn transition(&self, next: LifecycleState) -> Result<(), TransitionError> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                info!("Server lifecycle: {} -> {}", current, next);
                *current = next;
                true
            } else {
                outcome = Err(TransitionError {
                    from: *current,
                    to: next,
                });
                false
            }
        });
        outcome
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
