//! Disabling core dumps
//!
//! A core dump of the daemon would contain guest traffic and could be
//! written wherever the kernel's core pattern points.

use nix::sys::prctl;
use nix::sys::resource::{Resource, getrlimit, setrlimit};
use nsbridge_core::{IsolationError, Result};

/// Disable core dumps of the calling process: clear the dumpable flag and
/// set RLIMIT_CORE to zero.
pub fn disable_core_dumps() -> Result<()> {
    prctl::set_dumpable(false)
        .map_err(|e| IsolationError::syscall("Failed to clear dumpable flag", e))?;

    setrlimit(Resource::RLIMIT_CORE, 0, 0)
        .map_err(|e| IsolationError::syscall("setrlimit(RLIMIT_CORE) failed", e))
}

/// Whether the process is currently dumpable
pub fn is_dumpable() -> Result<bool> {
    prctl::get_dumpable().map_err(|e| IsolationError::syscall("Failed to read dumpable flag", e))
}

/// Current soft and hard RLIMIT_CORE
pub fn core_limit() -> Result<(u64, u64)> {
    let (soft, hard) = getrlimit(Resource::RLIMIT_CORE)
        .map_err(|e| IsolationError::syscall("getrlimit(RLIMIT_CORE) failed", e))?;
    Ok((soft as u64, hard as u64))
}
