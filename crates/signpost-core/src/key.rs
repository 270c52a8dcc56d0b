use crate::error::CoreError;
use std::fmt::Display;

/// Longest key accepted, in bytes.
pub const MAX_KEY_LENGTH: usize = 250;

/// A validated lookup key (a username).
///
/// Keys are opaque to the lookup engine apart from their bounds: they must be
/// 1-250 bytes long and contain no whitespace or control characters, which
/// keeps them safe to use verbatim as cache keys and query parameters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key(String);

impl Key {
    /// Creates a new `Key` after validating the input.
    pub fn new(key: impl Into<String>) -> std::result::Result<Self, CoreError> {
        let key = key.into();
        Self::validate(&key)?;
        Ok(Self(key))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(key: &str) -> std::result::Result<(), CoreError> {
        if key.is_empty() || key.len() > MAX_KEY_LENGTH {
            return Err(CoreError::InvalidKey(format!(
                "length must be between 1 and {}, got {}",
                MAX_KEY_LENGTH,
                key.len()
            )));
        }

        if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(CoreError::InvalidKey(format!(
                "must not contain whitespace or control characters: {:?}",
                key
            )));
        }

        Ok(())
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_keys() {
        assert!(Key::new("alice").is_ok());
        assert!(Key::new("a").is_ok());
        assert!(Key::new("Bob.Smith-42_x@example").is_ok());
        assert!(Key::new("a".repeat(MAX_KEY_LENGTH)).is_ok());
    }

    #[test]
    fn empty_or_too_long() {
        assert!(Key::new("").is_err());
        assert!(Key::new("a".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }

    #[test]
    fn rejects_whitespace_and_control() {
        assert!(Key::new("al ice").is_err());
        assert!(Key::new("alice\n").is_err());
        assert!(Key::new("ali\u{7}ce").is_err());
    }

    #[test]
    fn display_is_verbatim() {
        let key = Key::new("carol").unwrap();
        assert_eq!(key.to_string(), "carol");
        assert_eq!(key.as_str(), "carol");
    }
}
