//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The stored value is not of the type the caller asked for
    #[error("Type mismatch for key {key}: stored value is not a {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
    },
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_message() {
        let err = CacheError::TypeMismatch {
            key: "users".to_string(),
            expected: "u32",
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch for key users: stored value is not a u32"
        );
    }
}
