//! Natlog Error - Unified Error Types
//!
//! Error handling for all natlog operations. Separates caller mistakes
//! (bad types, bad selectors, unknown or duplicate series, out-of-order
//! writes) from infrastructure failures beneath the point store.
//!
//! Key Features:
//! - One variant per core failure kind, surfaced to callers unchanged
//! - User vs infrastructure error classification
//! - Seamless integration with std::io::Error
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Unified error type for all natlog operations.
#[derive(Error, Debug)]
pub enum NatlogError {
    // Caller errors
    #[error("type error: {0}")]
    Type(String),

    #[error("selector error: {0}")]
    Selector(String),

    #[error("series {0} already exists")]
    SeriesCreation(String),

    #[error("series {0} does not exist")]
    SeriesNotFound(String),

    #[error("time order error: {0}")]
    SeriesTimeOrder(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("store closed")]
    StoreClosed,

    // Storage errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("corruption detected: {0}")]
    Corruption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

// =============================================================================
// Type Aliases
// =============================================================================

/// Result type alias for natlog operations.
pub type Result<T> = std::result::Result<T, NatlogError>;

// =============================================================================
// Error Classification
// =============================================================================

impl NatlogError {
    /// Returns true if the error reflects an invariant the caller violated.
    ///
    /// None of these are retried internally; resubmitting the same request
    /// fails the same way.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            NatlogError::Type(_)
                | NatlogError::Selector(_)
                | NatlogError::SeriesCreation(_)
                | NatlogError::SeriesNotFound(_)
                | NatlogError::SeriesTimeOrder(_)
                | NatlogError::InvalidQuery(_)
        )
    }

    /// Returns true if the durability layer failed underneath the store.
    pub fn is_infrastructure_error(&self) -> bool {
        matches!(
            self,
            NatlogError::Storage(_)
                | NatlogError::Corruption(_)
                | NatlogError::Io(_)
                | NatlogError::Serialization(_)
                | NatlogError::StoreClosed
        )
    }
}

impl From<serde_json::Error> for NatlogError {
    fn from(err: serde_json::Error) -> Self {
        NatlogError::Serialization(err.to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(NatlogError::Type("bad".into()).is_user_error());
        assert!(NatlogError::SeriesTimeOrder("late".into()).is_user_error());
        assert!(!NatlogError::Type("bad".into()).is_infrastructure_error());

        let io = NatlogError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(io.is_infrastructure_error());
        assert!(!io.is_user_error());
        assert!(!NatlogError::Configuration("x".into()).is_user_error());
    }

    #[test]
    fn test_error_display() {
        let err = NatlogError::SeriesNotFound("node01.cpu".into());
        assert_eq!(err.to_string(), "series node01.cpu does not exist");

        let err = NatlogError::SeriesCreation("node01.cpu".into());
        assert_eq!(err.to_string(), "series node01.cpu already exists");
    }
}
