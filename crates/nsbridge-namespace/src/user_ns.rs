//! Entering the final user namespace
//!
//! Either join an existing namespace given by path, or create a new one
//! and map the current (already final) UID/GID to root inside it.

use log::{debug, warn};
use nix::sched::{CloneFlags, setns, unshare};
use nsbridge_core::{IsolationError, Result};
use std::fs::{self, File};
use std::path::Path;

/// One-line ID map entry: map `outside` to `inside`, range of one
pub fn id_map_line(inside: u32, outside: u32) -> String {
    format!("{} {} 1", inside, outside)
}

/// Join the user namespace referenced by `path` (e.g. /proc/<pid>/ns/user)
pub fn join_user_namespace(path: &Path) -> Result<()> {
    let ns = File::open(path).map_err(|e| {
        IsolationError::Namespace(format!(
            "Couldn't open user namespace {}: {}",
            path.display(),
            e
        ))
    })?;

    setns(&ns, CloneFlags::CLONE_NEWUSER).map_err(|e| {
        IsolationError::syscall(
            format!("Couldn't enter user namespace {}", path.display()),
            e,
        )
    })?;

    debug!("Joined user namespace {}", path.display());
    Ok(())
}

/// Create and enter a new user namespace, mapping `uid`/`gid` to 0.
///
/// Creating the namespace must succeed. Writing the mappings is best
/// effort: without them the process still runs, as the overflow user.
pub fn create_user_namespace(uid: u32, gid: u32) -> Result<()> {
    unshare(CloneFlags::CLONE_NEWUSER)
        .map_err(|e| IsolationError::syscall("Couldn't create user namespace", e))?;

    let maps = [
        ("/proc/self/uid_map", id_map_line(0, uid)),
        ("/proc/self/setgroups", "deny".to_string()),
        ("/proc/self/gid_map", id_map_line(0, gid)),
    ];

    for (file, content) in &maps {
        if let Err(e) = fs::write(file, content) {
            warn!("Couldn't configure user mappings ({}): {}", file, e);
            return Ok(());
        }
    }

    debug!("Created user namespace with uid {} gid {} mapped to root", uid, gid);
    Ok(())
}
