use thiserror::Error;

use crate::models::{
    command::Command,
    command_update::{CommandSource, CommandUpdate},
    gesture::GestureResult,
};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("'{0}' is not a command symbol.")]
    InvalidSymbol(String),

    #[error("Key '{0}' is not bound to a command.")]
    UnknownKey(char),
}

/// Phrases that resolve to a command, Vietnamese first to match the
/// operator vocabulary this grew up with. Matching is substring containment
/// on lowercased input.
fn keywords(command: Command) -> &'static [&'static str] {
    match command {
        Command::Forward => &["tiến", "đi thẳng", "đi tới", "về phía trước", "forward"],
        Command::Backward => &["lùi", "đi lùi", "quay lại", "về sau", "backward"],
        Command::Left => &["trái", "rẽ trái", "queo trái", "sang trái", "left"],
        Command::Right => &["phải", "rẽ phải", "queo phải", "sang phải", "right"],
        Command::Stop => &["dừng", "stop", "đứng lại", "ngừng", "thôi"],
    }
}

/// Wrap a classifier decision as a gesture-sourced update.
pub fn update_from_gesture(result: &GestureResult) -> CommandUpdate {
    CommandUpdate::new(result.command, CommandSource::Gesture)
}

/// Map a pressed key to an update. Space is the emergency stop.
pub fn update_from_key(key: char) -> Result<CommandUpdate, SourceError> {
    let command = match key {
        'w' | 'W' => Command::Forward,
        's' | 'S' => Command::Backward,
        'a' | 'A' => Command::Left,
        'd' | 'D' => Command::Right,
        'x' | 'X' | ' ' => Command::Stop,
        other => return Err(SourceError::UnknownKey(other)),
    };
    Ok(CommandUpdate::new(command, CommandSource::Keyboard))
}

/// Resolve the `{symbol}` segment of a `/cmd/{symbol}` request. Accepts the
/// wire alphabet in either case and nothing else; rejected symbols must not
/// reach the arbiter.
pub fn update_from_http_path(segment: &str) -> Result<CommandUpdate, SourceError> {
    let mut chars = segment.chars();
    let symbol = match (chars.next(), chars.next()) {
        (Some(symbol), None) => symbol,
        _ => return Err(SourceError::InvalidSymbol(segment.to_string())),
    };
    let command = match Command::try_from(symbol.to_ascii_uppercase()) {
        Err(_) => return Err(SourceError::InvalidSymbol(segment.to_string())),
        Ok(command) => command,
    };
    Ok(CommandUpdate::new(command, CommandSource::Manual))
}

/// Resolve free text against the keyword table. Commands are scanned in
/// declaration order and the first containment match wins; `None` means
/// nothing matched and nothing should be applied. Returns the keyword that
/// matched so callers can echo it back.
pub fn update_from_phrase(text: &str) -> Option<(CommandUpdate, &'static str)> {
    let lowered = text.to_lowercase();
    for command in Command::ALL {
        for keyword in keywords(command).iter().copied() {
            if lowered.contains(keyword) {
                return Some((CommandUpdate::new(command, CommandSource::Voice), keyword));
            }
        }
    }
    None
}

/// Wrap a command mirrored from a remote controller.
pub fn update_from_remote(command: Command) -> CommandUpdate {
    CommandUpdate::new(command, CommandSource::Http)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_map_to_commands() {
        let update = update_from_key('w').expect("Failed to map 'w'.");
        assert_eq!(update.command, Command::Forward);
        assert_eq!(update.source, CommandSource::Keyboard);

        let update = update_from_key('A').expect("Failed to map 'A'.");
        assert_eq!(update.command, Command::Left);

        let update = update_from_key(' ').expect("Failed to map space.");
        assert_eq!(update.command, Command::Stop);
    }

    #[test]
    fn test_unbound_keys_are_rejected() {
        assert!(update_from_key('q').is_err());
        assert!(update_from_key('1').is_err());
    }

    #[test]
    fn test_http_path_accepts_either_case() {
        let update = update_from_http_path("W").expect("Failed to map 'W'.");
        assert_eq!(update.command, Command::Forward);
        assert_eq!(update.source, CommandSource::Manual);

        let update = update_from_http_path("x").expect("Failed to map 'x'.");
        assert_eq!(update.command, Command::Stop);
    }

    #[test]
    fn test_http_path_rejects_everything_else() {
        assert!(update_from_http_path("F").is_err());
        assert!(update_from_http_path("").is_err());
        assert!(update_from_http_path("WW").is_err());
        assert!(update_from_http_path("forward").is_err());
    }

    #[test]
    fn test_phrases_resolve_in_both_languages() {
        let (update, keyword) = update_from_phrase("đi thẳng nào").expect("Failed to match.");
        assert_eq!(update.command, Command::Forward);
        assert_eq!(update.source, CommandSource::Voice);
        assert_eq!(keyword, "đi thẳng");

        let (update, _) = update_from_phrase("Please turn LEFT now").expect("Failed to match.");
        assert_eq!(update.command, Command::Left);

        let (update, keyword) = update_from_phrase("xe rẽ trái đi").expect("Failed to match.");
        assert_eq!(update.command, Command::Left);
        assert_eq!(keyword, "trái");
    }

    #[test]
    fn test_phrase_scan_order_fixes_precedence() {
        // Both "stop" and "forward" appear; Forward is scanned first.
        let (update, _) = update_from_phrase("stop going forward").expect("Failed to match.");
        assert_eq!(update.command, Command::Forward);
    }

    #[test]
    fn test_unmatched_phrases_resolve_to_nothing() {
        assert!(update_from_phrase("xin chào").is_none());
        assert!(update_from_phrase("").is_none());
    }

    #[test]
    fn test_gesture_and_remote_updates_carry_their_source() {
        let result = GestureResult::new(Command::Backward, "two open hands");
        assert_eq!(update_from_gesture(&result).source, CommandSource::Gesture);
        assert_eq!(update_from_gesture(&result).command, Command::Backward);

        let update = update_from_remote(Command::Right);
        assert_eq!(update.source, CommandSource::Http);
        assert_eq!(update.command, Command::Right);
    }
}
