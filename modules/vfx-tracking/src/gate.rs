use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    /// Script requested, init call not issued yet.
    Initializing,
    Initialized,
}

/// One-time initialization gate for a gateway.
///
/// Whoever moves the gate to `Initialized` runs the init call; every later
/// attempt is a no-op. The mutex keeps that true across threads.
#[derive(Debug)]
pub struct InitGate {
    state: Mutex<InitState>,
}

impl InitGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InitState::Uninitialized),
        }
    }

    pub fn state(&self) -> InitState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == InitState::Initialized
    }

    /// `Uninitialized -> Initializing`. True only for the caller that made
    /// the transition, so the script is requested once.
    pub fn begin(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == InitState::Uninitialized {
            *state = InitState::Initializing;
            true
        } else {
            false
        }
    }

    /// Move to `Initialized`, running `init` if and only if this call made the
    /// transition. A script that reports loading without a prior `begin` is
    /// accepted.
    pub fn complete(&self, init: impl FnOnce()) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == InitState::Initialized {
            return false;
        }
        init();
        *state = InitState::Initialized;
        true
    }
}

impl Default for InitGate {
    fn default() -> Self {
        Self::new()
    }
}
