//! Error types for bistro-core.

use thiserror::Error;

/// Result type alias using bistro-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for bistro operations
#[derive(Error, Debug)]
pub enum Error {
    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    // Input validation errors
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    // Lookup errors
    #[error("Promotion not found: {0}")]
    PromotionNotFound(String),

    #[error("Coupon not found: {0}")]
    CouponNotFound(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// A coupon that failed validation at redemption time.
    ///
    /// Carries the same human-readable reason string that
    /// `CouponGate::validate` surfaces to API callers.
    #[error("Coupon rejected: {0}")]
    CouponRejected(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
