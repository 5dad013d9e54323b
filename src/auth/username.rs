//! Public username rules applied before a profile row is created.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

const MIN_LEN: usize = 3;
const MAX_LEN: usize = 15;

/// Reserved and offensive words (English and Spanish). Matched as substrings of the normalized name.
const BLOCKED_WORDS: &[&str] = &[
    "admin",
    "administrator",
    "kynetics",
    "kyneticssports",
    "moderator",
    "mod",
    "support",
    "official",
    "staff",
    "system",
    "root",
    "superuser",
    "helpdesk",
    "nba",
    "espn",
    "sports",
    "fuck",
    "shit",
    "ass",
    "bitch",
    "dick",
    "cock",
    "pussy",
    "cunt",
    "nigger",
    "nigga",
    "faggot",
    "fag",
    "retard",
    "whore",
    "slut",
    "puta",
    "puto",
    "mierda",
    "verga",
    "coño",
    "pendejo",
    "pendeja",
    "cabron",
    "cabrón",
    "marica",
    "maricon",
    "maricón",
    "joder",
    "culo",
    "chinga",
    "pinche",
    "malparido",
    "hijueputa",
    "gonorrea",
];

/// First rule a candidate username broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UsernameRejection {
    /// Empty after trimming.
    #[error("username is required")]
    Required,
    /// Fewer than 3 characters.
    #[error("username must be at least 3 characters")]
    TooShort,
    /// More than 15 characters.
    #[error("username must be at most 15 characters")]
    TooLong,
    /// Contains something other than ASCII letters, digits and `_`.
    #[error("username may only contain letters, digits and underscores")]
    InvalidChars,
    /// First character is not a letter.
    #[error("username must start with a letter")]
    MustStartLetter,
    /// Contains `__`.
    #[error("username may not contain consecutive underscores")]
    NoDoubleUnderscore,
    /// Contains a blocked word once separators and digits are ignored.
    #[error("username is not allowed")]
    Blocked,
}

impl UsernameRejection {
    /// Stable reason code surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            UsernameRejection::Required => "username_required",
            UsernameRejection::TooShort => "username_too_short",
            UsernameRejection::TooLong => "username_too_long",
            UsernameRejection::InvalidChars => "username_invalid_chars",
            UsernameRejection::MustStartLetter => "username_must_start_letter",
            UsernameRejection::NoDoubleUnderscore => "username_no_double_underscore",
            UsernameRejection::Blocked => "username_blocked",
        }
    }
}

/// Validate a candidate username and return its trimmed form.
pub fn validate_username(raw: &str) -> Result<String, UsernameRejection> {
    let name = raw.trim();
    let len = name.chars().count();

    if name.is_empty() {
        return Err(UsernameRejection::Required);
    }
    if len < MIN_LEN {
        return Err(UsernameRejection::TooShort);
    }
    if len > MAX_LEN {
        return Err(UsernameRejection::TooLong);
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(UsernameRejection::InvalidChars);
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(UsernameRejection::MustStartLetter);
    }
    if name.contains("__") {
        return Err(UsernameRejection::NoDoubleUnderscore);
    }
    if is_blocked(name) {
        return Err(UsernameRejection::Blocked);
    }

    Ok(name.to_owned())
}

fn is_blocked(name: &str) -> bool {
    let normalized: String = name
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | '.') && !c.is_ascii_digit())
        .collect();

    BLOCKED_WORDS.iter().any(|word| normalized.contains(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_regular_names() {
        assert_eq!(validate_username("Jordan_23"), Ok("Jordan_23".to_owned()));
        assert_eq!(validate_username("  luka77 "), Ok("luka77".to_owned()));
    }

    #[test]
    fn rules_apply_in_order() {
        assert_eq!(validate_username("   "), Err(UsernameRejection::Required));
        assert_eq!(validate_username("ab"), Err(UsernameRejection::TooShort));
        assert_eq!(
            validate_username("abcdefghijklmnop"),
            Err(UsernameRejection::TooLong)
        );
        assert_eq!(
            validate_username("jo-dan"),
            Err(UsernameRejection::InvalidChars)
        );
        assert_eq!(
            validate_username("1abc"),
            Err(UsernameRejection::MustStartLetter)
        );
        assert_eq!(
            validate_username("_abc"),
            Err(UsernameRejection::MustStartLetter)
        );
        assert_eq!(
            validate_username("ad__min"),
            Err(UsernameRejection::NoDoubleUnderscore)
        );
    }

    #[test]
    fn blocklist_ignores_digits_and_separators() {
        assert_eq!(validate_username("admin99"), Err(UsernameRejection::Blocked));
        assert_eq!(validate_username("A_d_M_i_N"), Err(UsernameRejection::Blocked));
        assert_eq!(validate_username("n1b2a3"), Err(UsernameRejection::Blocked));
    }

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(UsernameRejection::TooShort.code(), "username_too_short");
        assert_eq!(UsernameRejection::Blocked.code(), "username_blocked");
    }
}
