//! Kernel primitives the isolation stages are built from
//!
//! Privilege primitives return the raw `nix::Result` so each call site
//! can apply its own errno policy. Composite operations (namespaces,
//! mounts, filters) return the crate error directly: every failure of
//! theirs is fatal.

use nsbridge_caps::{CapSet, CapabilitySets};
use nsbridge_core::Result;
use nsbridge_namespace::{EmptyRoot, NamespaceSet};
use nsbridge_seccomp::SeccompFilter;
use std::os::unix::io::RawFd;
use std::path::Path;

/// Operations the isolation lifecycle needs from the kernel
pub trait Kernel {
    /// Read effective, permitted and inheritable sets
    fn read_caps(&mut self) -> nix::Result<CapabilitySets>;

    /// Replace effective, permitted and inheritable sets
    fn write_caps(&mut self, sets: &CapabilitySets) -> nix::Result<()>;

    /// Drop one bit position from the bounding set
    fn drop_bounding(&mut self, bit: u8) -> nix::Result<()>;

    /// Current bounding set
    fn bounding_set(&mut self) -> CapSet;

    /// Close every descriptor except stdio and `keep`
    fn close_inherited_fds(&mut self, keep: Option<RawFd>) -> Result<()>;

    /// Drop all supplementary groups
    fn clear_groups(&mut self) -> nix::Result<()>;

    fn set_gid(&mut self, gid: u32) -> nix::Result<()>;

    fn set_uid(&mut self, uid: u32) -> nix::Result<()>;

    fn join_user_ns(&mut self, path: &Path) -> Result<()>;

    /// Create a user namespace mapping `uid`/`gid` to root inside it
    fn create_user_ns(&mut self, uid: u32, gid: u32) -> Result<()>;

    fn unshare(&mut self, set: NamespaceSet) -> Result<()>;

    /// Replace the visible filesystem with an empty read-only root
    fn isolate_filesystem(&mut self, root: &EmptyRoot) -> Result<()>;

    fn disable_core_dumps(&mut self) -> Result<()>;

    /// Install the runtime syscall filter. Irreversible.
    fn install_seccomp(&mut self, filter: &SeccompFilter) -> Result<()>;

    fn effective_uid(&self) -> u32;

    fn in_initial_user_ns(&self) -> bool;
}

impl<K: Kernel + ?Sized> Kernel for &mut K {
    fn read_caps(&mut self) -> nix::Result<CapabilitySets> {
        (**self).read_caps()
    }

    fn write_caps(&mut self, sets: &CapabilitySets) -> nix::Result<()> {
        (**self).write_caps(sets)
    }

    fn drop_bounding(&mut self, bit: u8) -> nix::Result<()> {
        (**self).drop_bounding(bit)
    }

    fn bounding_set(&mut self) -> CapSet {
        (**self).bounding_set()
    }

    fn close_inherited_fds(&mut self, keep: Option<RawFd>) -> Result<()> {
        (**self).close_inherited_fds(keep)
    }

    fn clear_groups(&mut self) -> nix::Result<()> {
        (**self).clear_groups()
    }

    fn set_gid(&mut self, gid: u32) -> nix::Result<()> {
        (**self).set_gid(gid)
    }

    fn set_uid(&mut self, uid: u32) -> nix::Result<()> {
        (**self).set_uid(uid)
    }

    fn join_user_ns(&mut self, path: &Path) -> Result<()> {
        (**self).join_user_ns(path)
    }

    fn create_user_ns(&mut self, uid: u32, gid: u32) -> Result<()> {
        (**self).create_user_ns(uid, gid)
    }

    fn unshare(&mut self, set: NamespaceSet) -> Result<()> {
        (**self).unshare(set)
    }

    fn isolate_filesystem(&mut self, root: &EmptyRoot) -> Result<()> {
        (**self).isolate_filesystem(root)
    }

    fn disable_core_dumps(&mut self) -> Result<()> {
        (**self).disable_core_dumps()
    }

    fn install_seccomp(&mut self, filter: &SeccompFilter) -> Result<()> {
        (**self).install_seccomp(filter)
    }

    fn effective_uid(&self) -> u32 {
        (**self).effective_uid()
    }

    fn in_initial_user_ns(&self) -> bool {
        (**self).in_initial_user_ns()
    }
}
