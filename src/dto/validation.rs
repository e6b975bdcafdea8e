//! Validation helpers for inbound payloads.

use validator::ValidationError;

/// Longest accepted display name, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 24;
/// Shortest and longest accepted session code.
pub const SESSION_CODE_CHARS: std::ops::RangeInclusive<usize> = 4..=8;
/// Longest accepted track search query.
pub const MAX_QUERY_CHARS: usize = 100;
/// Longest accepted statement or negotiation message.
pub const MAX_TEXT_CHARS: usize = 200;

/// Validates a display name: 1 to 24 characters after trimming, no control characters.
///
/// # Examples
///
/// ```ignore
/// validate_display_name("Alice")   // Ok
/// validate_display_name("   ")     // Err - empty after trim
/// validate_display_name("a\u{7}b") // Err - control character
/// ```
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();
    if length == 0 || length > MAX_DISPLAY_NAME_CHARS {
        let mut err = ValidationError::new("display_name_length");
        err.message = Some(
            format!("Display name must be 1 to {MAX_DISPLAY_NAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("display_name_format");
        err.message = Some("Display name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a session code typed by a user (case-insensitive, alphanumeric).
pub fn validate_session_code(code: &str) -> Result<(), ValidationError> {
    let trimmed = code.trim();
    if !SESSION_CODE_CHARS.contains(&trimmed.len()) {
        let mut err = ValidationError::new("session_code_length");
        err.message = Some(
            format!(
                "Session code must be {} to {} characters (got {})",
                SESSION_CODE_CHARS.start(),
                SESSION_CODE_CHARS.end(),
                trimmed.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        let mut err = ValidationError::new("session_code_format");
        err.message = Some("Session code must contain only letters and digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates free text (statements, negotiation messages): non-blank, bounded length.
pub fn validate_text(text: &str) -> Result<(), ValidationError> {
    let length = text.trim().chars().count();
    if length == 0 || length > MAX_TEXT_CHARS {
        let mut err = ValidationError::new("text_length");
        err.message =
            Some(format!("Text must be 1 to {MAX_TEXT_CHARS} characters (got {length})").into());
        return Err(err);
    }
    Ok(())
}

/// Validates a track search query.
pub fn validate_query(query: &str) -> Result<(), ValidationError> {
    let length = query.trim().chars().count();
    if length == 0 || length > MAX_QUERY_CHARS {
        let mut err = ValidationError::new("query_length");
        err.message =
            Some(format!("Query must be 1 to {MAX_QUERY_CHARS} characters (got {length})").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_display_name_valid() {
        assert!(validate_display_name("Alice").is_ok());
        assert!(validate_display_name("  Bob  ").is_ok());
        assert!(validate_display_name("Zoë the 2nd").is_ok());
    }

    #[test]
    fn test_validate_display_name_invalid() {
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("    ").is_err());
        assert!(validate_display_name(&"x".repeat(25)).is_err());
        assert!(validate_display_name("a\u{7}b").is_err());
    }

    #[test]
    fn test_validate_session_code() {
        assert!(validate_session_code("ABCDE").is_ok());
        assert!(validate_session_code(" abcd ").is_ok());
        assert!(validate_session_code("ABC").is_err());
        assert!(validate_session_code("AB-DE").is_err());
    }

    #[test]
    fn test_validate_text_and_query() {
        assert!(validate_text("I once met a bear").is_ok());
        assert!(validate_text(" ").is_err());
        assert!(validate_text(&"y".repeat(201)).is_err());
        assert!(validate_query("daft punk").is_ok());
        assert!(validate_query("").is_err());
    }
}
