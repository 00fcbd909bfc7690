use std::collections::VecDeque;

use parking_lot::RwLock;

use crate::models::{
    command::Command,
    command_update::{CommandSource, CommandUpdate},
};

/// How many updates the arbiter keeps around for status reporting.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// A point-in-time view of the arbiter for the status endpoint.
#[derive(Debug, Clone)]
pub struct ArbiterStatus {
    pub current: Command,
    pub last_source: Option<CommandSource>,
    pub total_updates: u64,
}

struct ArbiterState {
    current: Command,
    last_source: Option<CommandSource>,
    total_updates: u64,
    history: VecDeque<CommandUpdate>,
}

/// Holder of the single authoritative command.
///
/// Every input source funnels through `apply` and the newest writer always
/// wins, whatever its source. The streamer only ever `read`s. Starts at
/// `Stop` and only leaves it when a source says so.
pub struct CommandArbiter {
    state: RwLock<ArbiterState>,
    history_capacity: usize,
}

impl CommandArbiter {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            state: RwLock::new(ArbiterState {
                current: Command::default(),
                last_source: None,
                total_updates: 0,
                history: VecDeque::with_capacity(history_capacity),
            }),
            history_capacity,
        }
    }

    /// Record an update unconditionally. Also counts updates that repeat
    /// the current command; the history is a log of decisions, not changes.
    pub fn apply(&self, update: CommandUpdate) {
        let mut state = self.state.write();
        state.current = update.command;
        state.last_source = Some(update.source);
        state.total_updates += 1;
        if self.history_capacity > 0 {
            while state.history.len() >= self.history_capacity {
                state.history.pop_front();
            }
            state.history.push_back(update);
        }
    }

    /// The command the streamer should be sending right now.
    pub fn read(&self) -> Command {
        self.state.read().current
    }

    /// Up to `n` of the most recent updates, oldest first. Asking for more
    /// than the retained history simply returns everything retained.
    pub fn history(&self, n: usize) -> Vec<CommandUpdate> {
        let state = self.state.read();
        let skip = state.history.len().saturating_sub(n);
        state.history.iter().skip(skip).cloned().collect()
    }

    pub fn status(&self) -> ArbiterStatus {
        let state = self.state.read();
        ArbiterStatus {
            current: state.current,
            last_source: state.last_source,
            total_updates: state.total_updates,
        }
    }
}

impl Default for CommandArbiter {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
