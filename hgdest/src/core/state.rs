//! Write state machine.
//!
//! `Init → Pulled → Clean → Reconciled → Committed → Pushed → Done`, with
//! `Aborted` reachable from any non-terminal state. States are never re-entered.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Init,
    Pulled,
    Clean,
    Reconciled,
    Committed,
    Pushed,
    Done,
    Aborted,
}

impl WriteState {
    /// The state that follows `self` on success, if any.
    pub fn next(self) -> Option<WriteState> {
        match self {
            Self::Init => Some(Self::Pulled),
            Self::Pulled => Some(Self::Clean),
            Self::Clean => Some(Self::Reconciled),
            Self::Reconciled => Some(Self::Committed),
            Self::Committed => Some(Self::Pushed),
            Self::Pushed => Some(Self::Done),
            Self::Done | Self::Aborted => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// True once a local commit exists that may not have reached the remote.
    pub fn has_local_commit(self) -> bool {
        matches!(self, Self::Committed | Self::Pushed | Self::Done)
    }
}

impl fmt::Display for WriteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Pulled => "pulled",
            Self::Clean => "clean",
            Self::Reconciled => "reconciled",
            Self::Committed => "committed",
            Self::Pushed => "pushed",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Error returned when a transition is not allowed from the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: WriteState,
    pub to: WriteState,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid write transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// Tracks one write through the state machine.
#[derive(Debug, Clone)]
pub struct WriteProgress {
    state: WriteState,
    /// Last non-aborted state reached.
    reached: WriteState,
}

impl Default for WriteProgress {
    fn default() -> Self {
        Self {
            state: WriteState::Init,
            reached: WriteState::Init,
        }
    }
}

impl WriteProgress {
    pub fn state(&self) -> WriteState {
        self.state
    }

    /// The furthest state reached before an abort (or the current state).
    pub fn reached(&self) -> WriteState {
        self.reached
    }

    /// Move to `to`, which must be the immediate successor of the current state.
    pub fn advance(&mut self, to: WriteState) -> Result<(), InvalidTransition> {
        if self.state.next() != Some(to) {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        self.reached = to;
        Ok(())
    }

    pub fn abort(&mut self) -> Result<(), InvalidTransition> {
        if self.state.is_terminal() {
            return Err(InvalidTransition {
                from: self.state,
                to: WriteState::Aborted,
            });
        }
        self.state = WriteState::Aborted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_happy_path_to_done() {
        let mut progress = WriteProgress::default();
        for state in [
            WriteState::Pulled,
            WriteState::Clean,
            WriteState::Reconciled,
            WriteState::Committed,
            WriteState::Pushed,
            WriteState::Done,
        ] {
            progress.advance(state).expect("advance");
        }
        assert_eq!(progress.state(), WriteState::Done);
        assert!(progress.state().is_terminal());
    }

    #[test]
    fn rejects_skipping_states() {
        let mut progress = WriteProgress::default();
        let err = progress.advance(WriteState::Committed).expect_err("skip");
        assert_eq!(err.from, WriteState::Init);
        assert_eq!(err.to, WriteState::Committed);
    }

    #[test]
    fn rejects_reentering_a_state() {
        let mut progress = WriteProgress::default();
        progress.advance(WriteState::Pulled).expect("pulled");
        assert!(progress.advance(WriteState::Pulled).is_err());
    }

    #[test]
    fn abort_remembers_furthest_state() {
        let mut progress = WriteProgress::default();
        progress.advance(WriteState::Pulled).expect("pulled");
        progress.advance(WriteState::Clean).expect("clean");
        progress.abort().expect("abort");
        assert_eq!(progress.state(), WriteState::Aborted);
        assert_eq!(progress.reached(), WriteState::Clean);
        assert!(progress.abort().is_err(), "aborted is terminal");
    }

    #[test]
    fn local_commit_flag_starts_at_committed() {
        assert!(!WriteState::Reconciled.has_local_commit());
        assert!(WriteState::Committed.has_local_commit());
    }
}
