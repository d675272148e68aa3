//! Error types for the GPU command service
//!
//! Crate-level errors cover initialization, driver and resource failures.
//! Per-command outcomes live in the decoder (`CommandError`) and GL errors are
//! sticky bits in the decoder's error state; neither unwinds past `execute()`.

use std::fmt;

/// Result type for service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a lost context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextLostReason {
    /// This client caused the loss (driver reported a guilty reset)
    Guilty,

    /// Another client caused the loss
    Innocent,

    /// The cause could not be determined
    Unknown,
}

/// GPU command service errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Driver-level failure
    BackendError(String),

    /// Host or driver allocation failed
    OutOfMemory,

    /// Invalid resource (unknown handle, wrong kind, bad state)
    InvalidResource(String),

    /// Initialization failed (feature negotiation, limits, surface)
    InitializationFailed(String),

    /// The context is lost and cannot execute further work
    ContextLost(ContextLostReason),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ContextLost(reason) => write!(f, "Context lost ({:?})", reason),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an error with file:line and evaluate to an `Error::BackendError`
///
/// # Example
///
/// ```no_run
/// # use gpu_command_service::gpu_err;
/// let err = gpu_err!("gpu::Decoder", "unexpected state {}", 3);
/// ```
#[macro_export]
macro_rules! gpu_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::gpu::Service::log_detailed(
            $crate::gpu::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::gpu::Error::BackendError(message)
    }};
}

/// Log an error with file:line and return it from the enclosing function
///
/// # Example
///
/// ```no_run
/// # use gpu_command_service::{gpu::Result, gpu_bail};
/// fn check(size: i32) -> Result<()> {
///     if size < 0 {
///         gpu_bail!("gpu::TextureManager", "negative size {}", size);
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! gpu_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::gpu_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
