//! Actor lifecycle state machine.
//!
//! Mirrors `airssys-rt`'s `ActorLifecycle`/`ActorState`, narrowed to the
//! states a single dynamically-dispatched actor actually passes through:
//! bind its reply socket, run `init`, serve requests, then on stop request
//! a grace period elapses before the worker-instance host force-kills it
//! and runs `deinit` (§4 C3, `actor.py`'s `_serve`/`stop` methods).

use std::fmt;

/// Where in its life an actor currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Created,
    Binding,
    Initializing,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl fmt::Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActorState::Created => "created",
            ActorState::Binding => "binding",
            ActorState::Initializing => "initializing",
            ActorState::Running => "running",
            ActorState::Stopping => "stopping",
            ActorState::Stopped => "stopped",
            ActorState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Error returned when an illegal state transition is attempted.
#[derive(Debug, thiserror::Error)]
#[error("cannot transition actor from {from} to {to}")]
pub struct InvalidTransition {
    from: ActorState,
    to: ActorState,
}

/// Tracks and validates an actor's current lifecycle state.
#[derive(Debug, Clone)]
pub struct ActorLifecycle {
    state: ActorState,
}

impl ActorLifecycle {
    pub fn new() -> Self {
        Self {
            state: ActorState::Created,
        }
    }

    pub fn state(&self) -> ActorState {
        self.state
    }

    /// Attempt to move to `next`, validating against the allowed edges.
    pub fn transition(&mut self, next: ActorState) -> Result<(), InvalidTransition> {
        use ActorState::*;
        let allowed = matches!(
            (self.state, next),
            (Created, Binding)
                | (Binding, Initializing)
                | (Initializing, Running)
                | (Running, Stopping)
                | (Stopping, Stopped)
                | (Binding, Failed)
                | (Initializing, Failed)
                | (Running, Failed)
                | (Stopping, Failed)
        );
        if !allowed {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

impl Default for ActorLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_the_happy_path() {
        let mut lc = ActorLifecycle::new();
        lc.transition(ActorState::Binding).unwrap();
        lc.transition(ActorState::Initializing).unwrap();
        lc.transition(ActorState::Running).unwrap();
        lc.transition(ActorState::Stopping).unwrap();
        lc.transition(ActorState::Stopped).unwrap();
        assert_eq!(lc.state(), ActorState::Stopped);
    }

    #[test]
    fn rejects_skipping_states() {
        let mut lc = ActorLifecycle::new();
        assert!(lc.transition(ActorState::Running).is_err());
    }

    #[test]
    fn rejects_transitions_out_of_a_terminal_state() {
        let mut lc = ActorLifecycle::new();
        lc.transition(ActorState::Binding).unwrap();
        lc.transition(ActorState::Initializing).unwrap();
        lc.transition(ActorState::Running).unwrap();
        lc.transition(ActorState::Stopping).unwrap();
        lc.transition(ActorState::Stopped).unwrap();
        assert!(lc.transition(ActorState::Running).is_err());
    }
}
