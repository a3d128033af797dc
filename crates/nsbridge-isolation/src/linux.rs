//! The real kernel

use crate::coredump;
use crate::fds;
use crate::kernel::Kernel;
use nix::unistd::{Gid, Uid, geteuid, setgid, setgroups, setuid};
use nsbridge_caps::{CapSet, CapabilitySets, sys};
use nsbridge_core::Result;
use nsbridge_core::features::in_initial_user_namespace;
use nsbridge_namespace::{EmptyRoot, NamespaceSet, create_user_namespace, join_user_namespace};
use nsbridge_seccomp::{SeccompBpf, SeccompFilter};
use std::os::unix::io::RawFd;
use std::path::Path;

/// Kernel operations on the calling process
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxKernel;

impl LinuxKernel {
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for LinuxKernel {
    fn read_caps(&mut self) -> nix::Result<CapabilitySets> {
        sys::capget()
    }

    fn write_caps(&mut self, sets: &CapabilitySets) -> nix::Result<()> {
        sys::capset(sets)
    }

    fn drop_bounding(&mut self, bit: u8) -> nix::Result<()> {
        sys::bounding_drop(bit)
    }

    fn bounding_set(&mut self) -> CapSet {
        sys::bounding_set()
    }

    fn close_inherited_fds(&mut self, keep: Option<RawFd>) -> Result<()> {
        fds::close_open_files(keep)
    }

    fn clear_groups(&mut self) -> nix::Result<()> {
        setgroups(&[])
    }

    fn set_gid(&mut self, gid: u32) -> nix::Result<()> {
        setgid(Gid::from_raw(gid))
    }

    fn set_uid(&mut self, uid: u32) -> nix::Result<()> {
        setuid(Uid::from_raw(uid))
    }

    fn join_user_ns(&mut self, path: &Path) -> Result<()> {
        join_user_namespace(path)
    }

    fn create_user_ns(&mut self, uid: u32, gid: u32) -> Result<()> {
        create_user_namespace(uid, gid)
    }

    fn unshare(&mut self, set: NamespaceSet) -> Result<()> {
        set.unshare()
    }

    fn isolate_filesystem(&mut self, root: &EmptyRoot) -> Result<()> {
        root.apply()
    }

    fn disable_core_dumps(&mut self) -> Result<()> {
        coredump::disable_core_dumps()
    }

    fn install_seccomp(&mut self, filter: &SeccompFilter) -> Result<()> {
        SeccompBpf::load(filter)
    }

    fn effective_uid(&self) -> u32 {
        geteuid().as_raw()
    }

    fn in_initial_user_ns(&self) -> bool {
        in_initial_user_namespace()
    }
}
