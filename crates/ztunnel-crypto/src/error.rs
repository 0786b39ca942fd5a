// ============================================
// File: crates/ztunnel-crypto/src/error.rs
// ============================================
//! # Crypto Error Types
//!
//! ## Creation Reason
//! Defines error types for the cryptographic operations in the
//! ZTunnel crypto crate.
//!
//! ## Main Functionality
//! - `CryptoError`: Primary error enum for crypto operations
//! - Convenience constructors for common cases
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material in error messages
//! - Authentication failures carry no detail on purpose: the error
//!   must not distinguish which part of the check failed
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

// ============================================
// CryptoError
// ============================================

/// Error types for cryptographic operations.
///
/// # Security Note
/// Error values are deliberately coarse. An attacker observing error
/// returns must learn nothing beyond "the ciphertext was rejected".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Authenticated decryption failed.
    ///
    /// The plaintext buffer contents are undefined after this error
    /// and must not be used.
    #[error("Authentication failed: ciphertext rejected")]
    Authentication,

    /// Requested key derivation output exceeds the HKDF-SHA256 limit.
    #[error("HKDF output too long: requested {requested} bytes, max {max}")]
    OutputTooLong {
        /// Bytes requested by the caller
        requested: usize,
        /// Maximum derivable bytes (255 * 32)
        max: usize,
    },

    /// An output buffer does not match the required length.
    #[error("Buffer length mismatch: expected {expected} bytes, got {actual}")]
    BufferMismatch {
        /// Length the operation requires
        expected: usize,
        /// Length the caller provided
        actual: usize,
    },
}

impl CryptoError {
    /// Creates a `BufferMismatch` error.
    #[must_use]
    pub const fn buffer_mismatch(expected: usize, actual: usize) -> Self {
        Self::BufferMismatch { expected, actual }
    }

    /// Creates an `OutputTooLong` error.
    #[must_use]
    pub const fn output_too_long(requested: usize, max: usize) -> Self {
        Self::OutputTooLong { requested, max }
    }

    /// Returns `true` if this error might indicate tampering.
    ///
    /// Authentication failures warrant additional logging/monitoring
    /// by the caller; the other variants are caller bugs.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(self, Self::Authentication)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CryptoError::Authentication;
        assert!(err.to_string().contains("rejected"));

        let err = CryptoError::output_too_long(9000, 8160);
        assert!(err.to_string().contains("9000"));
        assert!(err.to_string().contains("8160"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CryptoError::Authentication.is_suspicious());
        assert!(!CryptoError::buffer_mismatch(32, 16).is_suspicious());
    }
}
