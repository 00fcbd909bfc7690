use std::fmt::Display;

use crate::models::command::Command;

/// The outcome of classifying one frame: the command to drive with plus a
/// short explanation for the log.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureResult {
    pub command: Command,
    pub rationale: String,
}

impl GestureResult {
    pub fn new(command: Command, rationale: impl Into<String>) -> Self {
        Self {
            command,
            rationale: rationale.into(),
        }
    }
}

impl Display for GestureResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<GestureResult | {}: {}>", self.command, self.rationale)
    }
}
