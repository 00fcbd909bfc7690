use std::fmt::Display;

use thiserror::Error;

/// A drive command for the vehicle.
///
/// `Stop` is the safe default: it is what the system sends before any source
/// has spoken and what it falls back to whenever input is ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    Forward,
    Backward,
    Left,
    Right,
    #[default]
    Stop,
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("'{0}' is not a command symbol.")]
    UnknownSymbol(char),
}

impl Command {
    /// Every command, in declaration order. Keyword resolution scans in
    /// this order, so it also fixes match precedence.
    pub const ALL: [Command; 5] = [
        Command::Forward,
        Command::Backward,
        Command::Left,
        Command::Right,
        Command::Stop,
    ];

    /// The single ASCII character the vehicle firmware understands.
    pub fn wire_char(&self) -> char {
        match self {
            Command::Forward => 'W',
            Command::Backward => 'S',
            Command::Left => 'A',
            Command::Right => 'D',
            Command::Stop => 'X',
        }
    }

    /// The byte actually written to the serial port.
    pub fn wire_byte(&self) -> u8 {
        self.wire_char() as u8
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}('{}')", self, self.wire_char())
    }
}

impl TryFrom<char> for Command {
    type Error = CommandError;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value {
            'W' => Ok(Command::Forward),
            'S' => Ok(Command::Backward),
            'A' => Ok(Command::Left),
            'D' => Ok(Command::Right),
            'X' => Ok(Command::Stop),
            other => Err(CommandError::UnknownSymbol(other)),
        }
    }
}
