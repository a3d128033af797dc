//! Errno policies: which kernel failures a call site may tolerate
//!
//! Isolation is fatal by default. A call site that can legitimately fail
//! without leaving the process in an unknown privilege state lists the
//! exact errno values it accepts; anything else becomes an error.

use crate::error::{IsolationError, Result};
use log::warn;
use nix::errno::Errno;

/// What happened when a privilege primitive was invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The call took effect
    Applied,
    /// The call failed with an errno this call site accepts
    Tolerated(Errno),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// Errno values a single call site accepts as non-fatal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrnoPolicy {
    tolerated: &'static [Errno],
}

impl ErrnoPolicy {
    /// Every failure is fatal
    pub const FATAL: ErrnoPolicy = ErrnoPolicy { tolerated: &[] };

    pub const fn tolerating(tolerated: &'static [Errno]) -> Self {
        Self { tolerated }
    }

    pub fn tolerates(&self, errno: Errno) -> bool {
        self.tolerated.contains(&errno)
    }

    /// Classify the result of a kernel call under this policy.
    ///
    /// `context` is only evaluated on failure and names the operation in
    /// the resulting diagnostic.
    pub fn check<T>(
        &self,
        result: nix::Result<T>,
        context: impl FnOnce() -> String,
    ) -> Result<Outcome> {
        match result {
            Ok(_) => Ok(Outcome::Applied),
            Err(errno) if self.tolerates(errno) => Ok(Outcome::Tolerated(errno)),
            Err(errno) => Err(IsolationError::syscall(context(), errno)),
        }
    }

    /// Like [`ErrnoPolicy::check`], logging tolerated failures
    pub fn check_logged<T>(
        &self,
        result: nix::Result<T>,
        context: impl Fn() -> String,
    ) -> Result<Outcome> {
        let outcome = self.check(result, &context)?;
        if let Outcome::Tolerated(errno) = outcome {
            warn!("{} (tolerated): {}", context(), errno);
        }
        Ok(outcome)
    }
}

impl Default for ErrnoPolicy {
    fn default() -> Self {
        Self::FATAL
    }
}
