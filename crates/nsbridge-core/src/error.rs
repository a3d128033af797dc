//! Error types for isolation operations

use nix::errno::Errno;
use std::io;
use thiserror::Error;

/// Result type for isolation operations
pub type Result<T> = std::result::Result<T, IsolationError>;

/// Errors that can occur while the process isolates itself
#[derive(Error, Debug)]
pub enum IsolationError {
    #[error("{context}: {source}")]
    Syscall {
        context: String,
        #[source]
        source: Errno,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Namespace error: {0}")]
    Namespace(String),

    #[error("Seccomp error: {0}")]
    Seccomp(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Feature not available: {0}")]
    FeatureNotAvailable(String),
}

impl IsolationError {
    /// Wrap a failed kernel call, keeping the originating errno
    pub fn syscall(context: impl Into<String>, source: Errno) -> Self {
        IsolationError::Syscall {
            context: context.into(),
            source,
        }
    }

    /// Build a syscall error from the calling thread's current errno
    pub fn last_os_error(context: impl Into<String>) -> Self {
        Self::syscall(context, Errno::last())
    }

    /// The kernel error behind this failure, if there is one
    pub fn errno(&self) -> Option<Errno> {
        match self {
            IsolationError::Syscall { source, .. } => Some(*source),
            IsolationError::Io(e) => e.raw_os_error().map(Errno::from_raw),
            _ => None,
        }
    }
}
