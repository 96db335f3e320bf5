use shared_types::ValidationResult;

/// Messages longer than this (in characters) get a warning.
pub const MAX_MESSAGE_CHARS: usize = 1000;

const SPECIAL_CHARACTERS: [char; 2] = ['@', '#'];

pub const REASON_EMPTY: &str = "empty message";
pub const WARNING_LONG: &str = "message is long";
pub const WARNING_SPECIAL_CHARACTERS: &str = "message contains special characters";

/// Checks a message before a batch send. Only blank content is invalid;
/// length and mention/hashtag characters produce warnings.
pub fn validate_message(text: &str) -> ValidationResult {
    if text.trim().is_empty() {
        return ValidationResult::invalid(REASON_EMPTY);
    }

    let mut result = ValidationResult::ok();

    if text.chars().count() > MAX_MESSAGE_CHARS {
        result.warnings.push(WARNING_LONG.to_string());
    }

    if text.contains(SPECIAL_CHARACTERS) {
        result.warnings.push(WARNING_SPECIAL_CHARACTERS.to_string());
    }

    result
}
