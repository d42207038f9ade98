use thiserror::Error;

/// Rejected feed names.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("Feed name must not be empty.")]
    Empty,
    #[error("Only A-Z, a-z, and 0-9 permitted in names.")]
    InvalidCharacter,
}

/// Feed names are non-empty runs of ASCII letters and digits.
///
/// # Examples
///
/// ```
/// use feedmark::util::validate_feed_name;
///
/// assert!(validate_feed_name("HackerNews2").is_ok());
/// assert!(validate_feed_name("hacker-news").is_err());
/// ```
pub fn validate_feed_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(NameError::InvalidCharacter);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_alphanumeric() {
        assert_eq!(validate_feed_name("Foo"), Ok(()));
        assert_eq!(validate_feed_name("lwn2"), Ok(()));
        assert_eq!(validate_feed_name("123"), Ok(()));
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(validate_feed_name(""), Err(NameError::Empty));
    }

    #[test]
    fn test_rejects_punctuation_and_spaces() {
        for name in ["foo bar", "foo-bar", "foo.bar", "foo;bar", "foo_bar"] {
            assert_eq!(validate_feed_name(name), Err(NameError::InvalidCharacter), "{name}");
        }
    }

    #[test]
    fn test_rejects_non_ascii_letters() {
        assert_eq!(validate_feed_name("café"), Err(NameError::InvalidCharacter));
    }
}
