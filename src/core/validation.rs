//! Request validation
//!
//! Turns raw user text (or a pre-split command argument list) into a
//! normalized search query. Pure functions, no side effects.

use thiserror::Error;

use crate::core::error::PipelineError;

/// Validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Nothing left after trimming
    #[error("query is empty")]
    EmptyQuery,
}

impl From<ValidationError> for PipelineError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::EmptyQuery => PipelineError::EmptyQuery,
        }
    }
}

/// Validates free text and returns the normalized query.
///
/// Leading and trailing whitespace is removed and inner whitespace runs
/// (tabs, newlines, repeated spaces) collapse to a single space.
///
/// # Examples
/// ```
/// use tunefetch::core::validation::validate_query;
///
/// assert_eq!(validate_query("  Tarkan   Kuzu\tKuzu \n").unwrap(), "Tarkan Kuzu Kuzu");
/// assert!(validate_query("   ").is_err());
/// assert!(validate_query("").is_err());
/// ```
pub fn validate_query(raw: &str) -> Result<String, ValidationError> {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return Err(ValidationError::EmptyQuery);
    }
    Ok(normalized)
}

/// Validates a command-style invocation (`/song a b c`) given its arguments.
///
/// The arguments are joined with single spaces before the same rules as
/// [`validate_query`] apply.
pub fn validate_command_args<S: AsRef<str>>(args: &[S]) -> Result<String, ValidationError> {
    let joined = args.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
    validate_query(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_query_trims_and_collapses() {
        assert_eq!(validate_query("Tarkan Kuzu Kuzu").unwrap(), "Tarkan Kuzu Kuzu");
        assert_eq!(validate_query("\n  Sezen Aksu  -  Firuze ").unwrap(), "Sezen Aksu - Firuze");
    }

    #[test]
    fn test_validate_query_empty() {
        assert_eq!(validate_query(""), Err(ValidationError::EmptyQuery));
        assert_eq!(validate_query(" \t\n "), Err(ValidationError::EmptyQuery));
    }

    #[test]
    fn test_validate_command_args() {
        assert_eq!(
            validate_command_args(&["Tarkan", "-", "Kuzu", "Kuzu"]).unwrap(),
            "Tarkan - Kuzu Kuzu"
        );
        assert_eq!(validate_command_args::<&str>(&[]), Err(ValidationError::EmptyQuery));
        assert_eq!(validate_command_args(&["", "  "]), Err(ValidationError::EmptyQuery));
    }

    #[test]
    fn test_validation_error_maps_to_empty_query() {
        let err: PipelineError = ValidationError::EmptyQuery.into();
        assert!(matches!(err, PipelineError::EmptyQuery));
    }
}
