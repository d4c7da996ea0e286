//! SQL identifier validator.
//!
//! Database, table and column names reach SQL text only after passing through
//! here. Values never do; they are always bound.

use validator::ValidationError;

use crate::errors::AppError;

/// MySQL caps identifiers at 64 characters.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Validates and quotes SQL identifiers.
pub struct SqlValidator;

impl SqlValidator {
    /// Checks that `name` is an acceptable database or table name.
    ///
    /// Accepts letters, digits, `_`, `$` and `-`, up to 64 characters.
    ///
    /// # Errors
    /// Returns `AppError::InvalidIdentifier` describing the offending name.
    pub fn validate_identifier(kind: &str, name: &str) -> Result<(), AppError> {
        if name.is_empty() {
            return Err(AppError::InvalidIdentifier(format!("{kind} name is empty")));
        }
        if name.chars().count() > MAX_IDENTIFIER_LEN {
            return Err(AppError::InvalidIdentifier(format!(
                "{kind} name exceeds {MAX_IDENTIFIER_LEN} characters"
            )));
        }
        if let Some(c) = name.chars().find(|c| !Self::is_identifier_char(*c)) {
            return Err(AppError::InvalidIdentifier(format!(
                "{kind} name `{name}` contains forbidden character {c:?}"
            )));
        }
        Ok(())
    }

    /// Wraps `name` in backticks, doubling any embedded backtick.
    pub fn quote_identifier(name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn is_identifier_char(c: char) -> bool {
        c.is_alphanumeric() || matches!(c, '_' | '$' | '-')
    }
}

/// `validator` hook for query parameters carrying a database name.
pub fn validate_database_name(name: &str) -> Result<(), ValidationError> {
    SqlValidator::validate_identifier("database", name).map_err(|e| {
        ValidationError::new("identifier").with_message(e.to_string().into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_are_allowed() {
        assert!(SqlValidator::validate_identifier("table", "users").is_ok());
        assert!(SqlValidator::validate_identifier("table", "order_items_2024").is_ok());
        assert!(SqlValidator::validate_identifier("database", "shop-prod").is_ok());
    }

    #[test]
    fn test_injection_is_rejected() {
        assert!(SqlValidator::validate_identifier("table", "users; DROP TABLE x").is_err());
        assert!(SqlValidator::validate_identifier("table", "users`").is_err());
        assert!(SqlValidator::validate_identifier("table", "a.b").is_err());
        assert!(SqlValidator::validate_identifier("table", "").is_err());
    }

    #[test]
    fn test_length_limit() {
        let long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(SqlValidator::validate_identifier("table", &long).is_err());
        assert!(SqlValidator::validate_identifier("table", &long[1..]).is_ok());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(SqlValidator::quote_identifier("users"), "`users`");
        assert_eq!(SqlValidator::quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_validator_hook_carries_message() {
        let err = validate_database_name("bad name").unwrap_err();
        assert!(err.message.unwrap().contains("bad name"));
    }
}
