// ============================================
// File: crates/ztunnel-net/src/error.rs
// ============================================
//! # Network Error Types
//!
//! ## Creation Reason
//! Defines error types for the ZTunnel network crate: socket setup,
//! batched I/O, and connection pooling.
//!
//! ## Main Functionality
//! - `NetError`: Primary error enum for network operations
//! - `io` helper wrapping `std::io::Error` with an operation context
//!
//! ## Error Categories
//! 1. **Setup Errors**: bind and connect failures
//! 2. **I/O Errors**: hard send/receive failures (would-block is NOT
//!    an error; batch calls report it as zero progress)
//! 3. **Caller Errors**: oversized payloads
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddrV4;

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Result type for network operations.
pub type Result<T> = std::result::Result<T, NetError>;

// ============================================
// NetError
// ============================================

/// Network layer error types.
#[derive(Error, Debug)]
pub enum NetError {
    // ========================================
    // Setup Errors
    // ========================================

    /// Failed to bind the UDP socket.
    #[error("Failed to bind UDP port {port}: {reason}")]
    BindFailed {
        /// Port we tried to bind (0 = ephemeral)
        port: u16,
        /// Why binding failed
        reason: String,
    },

    /// Failed to connect to the pool target.
    #[error("Failed to connect to {target}: {reason}")]
    ConnectFailed {
        /// Target endpoint
        target: SocketAddrV4,
        /// Why connecting failed
        reason: String,
    },

    // ========================================
    // I/O Errors
    // ========================================

    /// A system call failed hard (not a would-block condition).
    #[error("I/O error during {context}: {source}")]
    Io {
        /// What operation was in flight
        context: String,
        /// The underlying OS error
        #[source]
        source: io::Error,
    },

    // ========================================
    // Caller Errors
    // ========================================

    /// A payload does not fit the packet buffer.
    #[error("Payload of {len} bytes exceeds packet capacity {capacity}")]
    PayloadTooLarge {
        /// Payload length offered
        len: usize,
        /// Buffer capacity
        capacity: usize,
    },
}

impl NetError {
    /// Creates an `Io` error with operation context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a `BindFailed` error.
    pub fn bind_failed(port: u16, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            port,
            reason: reason.into(),
        }
    }

    /// Creates a `ConnectFailed` error.
    pub fn connect_failed(target: SocketAddrV4, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            target,
            reason: reason.into(),
        }
    }
}

// ============================================
// Tests
// ============================================
