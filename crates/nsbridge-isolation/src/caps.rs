//! Narrowing the capability sets

use crate::kernel::Kernel;
use crate::policy;
use crate::state::PrivilegeState;
use log::{debug, warn};
use nix::errno::Errno;
use nsbridge_caps::{CapSet, Capability};
use nsbridge_core::{IsolationError, OperatingMode, Outcome, Result};

/// Intersect the effective and permitted sets with `keep`.
///
/// Inheritable and bounding sets are left alone. Failing to read or
/// write the sets is always fatal.
pub fn drop_effective_permitted<K: Kernel>(
    kernel: &mut K,
    state: &mut PrivilegeState,
    keep: CapSet,
) -> Result<()> {
    let current = kernel
        .read_caps()
        .map_err(|e| IsolationError::syscall("Couldn't get current capabilities", e))?;

    let narrowed = current.restrict_ep(keep);
    kernel
        .write_caps(&narrowed)
        .map_err(|e| IsolationError::syscall("Couldn't drop capabilities", e))?;

    debug!("Kept capabilities: {}", narrowed.effective);
    state.record_caps(narrowed);
    Ok(())
}

/// Drop every bit from the bounding set, then clear the inheritable set.
///
/// This doesn't reduce our own privilege; it stops anything we might
/// exec from gaining capabilities through file capabilities.
pub fn clamp_bounding_and_inheritable<K: Kernel>(
    kernel: &mut K,
    state: &mut PrivilegeState,
    mode: &OperatingMode,
) -> Result<()> {
    let drop_policy = policy::bounding_drop(mode);
    let before = kernel.bounding_set();
    state.record_bounding(before);

    let mut denied = 0;
    for bit in 0..Capability::MAX_BITS {
        let outcome = drop_policy.check(kernel.drop_bounding(bit), || {
            format!("Couldn't drop cap {} from bounding set", bit)
        })?;
        if outcome == Outcome::Tolerated(Errno::EPERM) {
            denied += 1;
        }
    }
    if denied > 0 {
        warn!("No CAP_SETPCAP, bounding set left as is for {} capabilities", denied);
    }

    let bounding = kernel.bounding_set();
    debug!("Bounding set now: {}", bounding);
    state.record_bounding(bounding);

    let current = kernel
        .read_caps()
        .map_err(|e| IsolationError::syscall("Couldn't get current capabilities", e))?;
    let cleared = current.clear_inheritable();
    kernel
        .write_caps(&cleared)
        .map_err(|e| IsolationError::syscall("Couldn't drop inheritable capabilities", e))?;

    state.record_caps(cleared);
    Ok(())
}
