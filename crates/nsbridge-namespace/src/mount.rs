//! Removing filesystem access with an empty root
//!
//! Must run inside a mount namespace the process owns. Afterwards the
//! whole visible filesystem is one empty, read-only tmpfs.

use log::debug;
use nix::mount::{MntFlags, MsFlags, mount, umount2};
use nix::unistd::{chdir, pivot_root};
use nsbridge_core::{IsolationError, Result};
use std::path::{Path, PathBuf};

/// tmpfs options leaving room for the root inode only, and no data
const EMPTY_TMPFS_OPTIONS: &str = "nr_inodes=2,nr_blocks=0";

/// Pivot into an empty read-only tmpfs mounted over `scratch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyRoot {
    scratch: PathBuf,
}

impl Default for EmptyRoot {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SCRATCH)
    }
}

impl EmptyRoot {
    pub const DEFAULT_SCRATCH: &'static str = "/tmp";

    pub fn new(scratch: impl AsRef<Path>) -> Self {
        Self {
            scratch: scratch.as_ref().to_path_buf(),
        }
    }

    pub fn scratch(&self) -> &Path {
        &self.scratch
    }

    pub fn mount_flags() -> MsFlags {
        MsFlags::MS_NODEV | MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_RDONLY
    }

    /// Replace the root of the current mount namespace.
    ///
    /// WARNING: irreversible; no path of the old filesystem stays
    /// reachable.
    pub fn apply(&self) -> Result<()> {
        if !self.scratch.is_dir() {
            return Err(IsolationError::InvalidConfig(format!(
                "Scratch directory {} does not exist",
                self.scratch.display()
            )));
        }

        // Keep mount events from propagating back to the parent namespace
        mount(
            None::<&str>,
            "/",
            None::<&str>,
            MsFlags::MS_UNBINDABLE | MsFlags::MS_REC,
            None::<&str>,
        )
        .map_err(|e| IsolationError::syscall("Failed to make / unbindable", e))?;

        mount(
            Some(""),
            &self.scratch,
            Some("tmpfs"),
            Self::mount_flags(),
            Some(EMPTY_TMPFS_OPTIONS),
        )
        .map_err(|e| {
            IsolationError::syscall(
                format!("Failed to mount empty tmpfs on {}", self.scratch.display()),
                e,
            )
        })?;

        chdir(&self.scratch).map_err(|e| {
            IsolationError::syscall(format!("Failed to chdir to {}", self.scratch.display()), e)
        })?;

        pivot_root(".", ".").map_err(|e| IsolationError::syscall("pivot_root() failed", e))?;

        umount2(".", MntFlags::MNT_DETACH | MntFlags::UMOUNT_NOFOLLOW)
            .map_err(|e| IsolationError::syscall("Failed to detach old root", e))?;

        debug!("Filesystem reduced to empty root");
        Ok(())
    }
}
