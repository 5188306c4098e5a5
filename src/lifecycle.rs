use parking_lot::{RwLock, RwLockReadGuard};

/// Lifecycle of a processor instance.
///
/// `Created -> Running -> Draining -> Stopped`. `Stopped` is terminal: the
/// queues are closed and a stopped processor cannot be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Built but not yet started; submissions are rejected
    Created,
    /// Accepting and processing submissions
    Running,
    /// Shutdown requested; submissions are rejected while buffered work drains
    Draining,
    /// Drained and torn down
    Stopped,
}

impl State {
    /// Whether external submissions may be admitted
    pub fn accepts_submissions(self) -> bool {
        self == State::Running
    }
}

/// Outcome of a lifecycle transition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The caller performed the transition and owns the follow-up work
    Applied,
    /// Already in (or past) the requested state; nothing to do
    Unchanged(State),
}

/// Lock-guarded state machine: many concurrent readers, one writer
#[derive(Debug)]
pub struct Lifecycle {
    state: RwLock<State>,
}

impl Lifecycle {
    /// Create a lifecycle in the `Created` state
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::Created),
        }
    }

    /// Get the current state
    pub fn current(&self) -> State {
        *self.state.read()
    }

    /// Hold a shared lock on the state.
    ///
    /// While the guard lives no transition can happen, so a submission that
    /// observed `Running` finishes enqueueing before shutdown begins.
    pub fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read()
    }

    /// `Created -> Running`
    pub fn begin_running(&self) -> Transition {
        self.transition(State::Created, State::Running)
    }

    /// `Running -> Draining`
    pub fn begin_draining(&self) -> Transition {
        self.transition(State::Running, State::Draining)
    }

    /// `Draining -> Stopped`
    pub fn finish_stopping(&self) -> Transition {
        self.transition(State::Draining, State::Stopped)
    }

    /// `Created -> Stopped`, for a start that could not spawn its threads
    pub fn abandon(&self) -> Transition {
        self.transition(State::Created, State::Stopped)
    }

    fn transition(&self, from: State, to: State) -> Transition {
        let mut state = self.state.write();
        if *state == from {
            *state = to;
            Transition::Applied
        } else {
            Transition::Unchanged(*state)
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
