//! Validation helpers for relay payloads.

use validator::ValidationError;

/// Number of characters in a game code.
pub const GAME_CODE_LEN: usize = 4;

/// Validates a stored game code: exactly four uppercase ASCII letters or digits.
///
/// Codes typed by players are normalized (trimmed, uppercased) before they
/// reach this check.
///
/// ```ignore
/// validate_game_code("AB12") // Ok
/// validate_game_code("ab12") // Err - lowercase
/// validate_game_code("AB1")  // Err - too short
/// ```
pub fn validate_game_code(code: &str) -> Result<(), ValidationError> {
    if code.chars().count() != GAME_CODE_LEN {
        let mut err = ValidationError::new("game_code_length");
        err.message = Some(
            format!(
                "Game code must be exactly {GAME_CODE_LEN} characters (got {})",
                code.chars().count()
            )
            .into(),
        );
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
    {
        let mut err = ValidationError::new("game_code_format");
        err.message = Some("Game code must contain only uppercase letters and digits".into());
        return Err(err);
    }

    Ok(())
}
