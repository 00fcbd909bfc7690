use std::fmt::Display;
use std::time::Instant;

use crate::models::command::Command;

/// Which input surface produced a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    Gesture,
    Keyboard,
    Voice,
    Http,
    Manual,
}

impl Display for CommandSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CommandSource::Gesture => "gesture",
            CommandSource::Keyboard => "keyboard",
            CommandSource::Voice => "voice",
            CommandSource::Http => "http",
            CommandSource::Manual => "manual",
        };
        write!(f, "{}", name)
    }
}

/// One command decision from one source, stamped with a monotonic instant
/// so history ages never go backwards when the wall clock moves.
#[derive(Debug, Clone, Copy)]
pub struct CommandUpdate {
    pub command: Command,
    pub source: CommandSource,
    pub at: Instant,
}

impl CommandUpdate {
    pub fn new(command: Command, source: CommandSource) -> Self {
        Self {
            command,
            source,
            at: Instant::now(),
        }
    }
}

impl Display for CommandUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<CommandUpdate | {} from {}>", self.command, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stamps_the_source() {
        let update = CommandUpdate::new(Command::Left, CommandSource::Keyboard);
        assert_eq!(update.command, Command::Left);
        assert_eq!(update.source, CommandSource::Keyboard);
    }

    #[test]
    fn test_source_names_are_stable() {
        assert_eq!(CommandSource::Gesture.to_string(), "gesture");
        assert_eq!(CommandSource::Manual.to_string(), "manual");
        assert_eq!(CommandSource::Http.to_string(), "http");
    }
}
