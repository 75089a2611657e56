//! Error types for quadframe
//!
//! This module defines the error type shared by the frame pipeline and
//! every graphics backend: device bring-up, resource creation, uploads
//! and submission.

use std::fmt;

/// Result type for quadframe operations
pub type Result<T> = std::result::Result<T, Error>;

/// quadframe errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock, ...)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (wrong kind, bad handle, malformed input data)
    InvalidResource(String),

    /// A startup object (device, factory, queue, heap, swap chain, fence) could not be created
    InitializationFailed(String),

    /// Capability tier or feature not supported by the backend
    UnsupportedCapability(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::UnsupportedCapability(msg) => write!(f, "Unsupported capability: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
