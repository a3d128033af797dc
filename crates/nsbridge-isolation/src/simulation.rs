//! In-memory kernel
//!
//! Models the privilege rules the lifecycle depends on closely enough to
//! drive every stage without touching the real process: capability sets
//! only narrow without a new user namespace, identity changes need
//! CAP_SETUID/CAP_SETGID, bounding-set drops need CAP_SETPCAP. Every
//! call is journaled and any operation can be made to fail with a chosen
//! errno.

use crate::kernel::Kernel;
use nix::errno::Errno;
use nsbridge_caps::{CapSet, Capability, CapabilitySets};
use nsbridge_core::{IsolationError, Result};
use nsbridge_namespace::{EmptyRoot, NamespaceSet};
use nsbridge_seccomp::{SeccompBpf, SeccompFilter, SeccompProfile};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

/// Kind of kernel operation, used to inject failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelOp {
    ReadCaps,
    WriteCaps,
    DropBounding,
    CloseFds,
    ClearGroups,
    SetGid,
    SetUid,
    JoinUserNs,
    CreateUserNs,
    Unshare,
    IsolateFilesystem,
    DisableCoreDumps,
    InstallSeccomp,
}

impl KernelOp {
    pub fn name(&self) -> &'static str {
        match self {
            KernelOp::ReadCaps => "capget",
            KernelOp::WriteCaps => "capset",
            KernelOp::DropBounding => "PR_CAPBSET_DROP",
            KernelOp::CloseFds => "close_range",
            KernelOp::ClearGroups => "setgroups",
            KernelOp::SetGid => "setgid",
            KernelOp::SetUid => "setuid",
            KernelOp::JoinUserNs => "setns",
            KernelOp::CreateUserNs => "unshare(CLONE_NEWUSER)",
            KernelOp::Unshare => "unshare",
            KernelOp::IsolateFilesystem => "pivot_root",
            KernelOp::DisableCoreDumps => "PR_SET_DUMPABLE",
            KernelOp::InstallSeccomp => "seccomp",
        }
    }
}

/// One journaled call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelCall {
    ReadCaps,
    WriteCaps(CapabilitySets),
    DropBounding(u8),
    CloseFds { keep: Option<RawFd> },
    ClearGroups,
    SetGid(u32),
    SetUid(u32),
    JoinUserNs(PathBuf),
    CreateUserNs { uid: u32, gid: u32 },
    Unshare(NamespaceSet),
    IsolateFilesystem(PathBuf),
    DisableCoreDumps,
    InstallSeccomp(SeccompProfile),
}

impl KernelCall {
    pub fn op(&self) -> KernelOp {
        match self {
            KernelCall::ReadCaps => KernelOp::ReadCaps,
            KernelCall::WriteCaps(_) => KernelOp::WriteCaps,
            KernelCall::DropBounding(_) => KernelOp::DropBounding,
            KernelCall::CloseFds { .. } => KernelOp::CloseFds,
            KernelCall::ClearGroups => KernelOp::ClearGroups,
            KernelCall::SetGid(_) => KernelOp::SetGid,
            KernelCall::SetUid(_) => KernelOp::SetUid,
            KernelCall::JoinUserNs(_) => KernelOp::JoinUserNs,
            KernelCall::CreateUserNs { .. } => KernelOp::CreateUserNs,
            KernelCall::Unshare(_) => KernelOp::Unshare,
            KernelCall::IsolateFilesystem(_) => KernelOp::IsolateFilesystem,
            KernelCall::DisableCoreDumps => KernelOp::DisableCoreDumps,
            KernelCall::InstallSeccomp(_) => KernelOp::InstallSeccomp,
        }
    }
}

impl fmt::Display for KernelCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelCall::WriteCaps(sets) => write!(
                f,
                "capset(effective={}, permitted={}, inheritable={})",
                sets.effective, sets.permitted, sets.inheritable
            ),
            KernelCall::DropBounding(bit) => write!(f, "PR_CAPBSET_DROP({})", bit),
            KernelCall::CloseFds { keep: Some(fd) } => write!(f, "close_range(keep={})", fd),
            KernelCall::CloseFds { keep: None } => write!(f, "close_range(3, ~0)"),
            KernelCall::SetGid(gid) => write!(f, "setgid({})", gid),
            KernelCall::SetUid(uid) => write!(f, "setuid({})", uid),
            KernelCall::JoinUserNs(path) => write!(f, "setns({}, CLONE_NEWUSER)", path.display()),
            KernelCall::CreateUserNs { uid, gid } => {
                write!(f, "unshare(CLONE_NEWUSER) uid_map=0 {} 1 gid_map=0 {} 1", uid, gid)
            }
            KernelCall::Unshare(set) => write!(f, "unshare({:?})", set.to_clone_flags()),
            KernelCall::IsolateFilesystem(scratch) => {
                write!(f, "pivot_root(empty tmpfs on {})", scratch.display())
            }
            KernelCall::InstallSeccomp(profile) => write!(f, "seccomp({:?})", profile),
            other => f.write_str(other.op().name()),
        }
    }
}

/// Capability bits this simulated kernel allocates
fn allocated() -> CapSet {
    Capability::ALL
        .iter()
        .fold(CapSet::EMPTY, |set, &cap| set.with(cap))
}

/// A process as the simulated kernel sees it
#[derive(Debug, Clone)]
pub struct SimulatedKernel {
    pub caps: CapabilitySets,
    pub bounding: CapSet,
    pub uid: u32,
    pub gid: u32,
    pub euid: u32,
    pub groups: Vec<u32>,
    pub initial_user_ns: bool,
    pub open_fds: BTreeSet<RawFd>,
    pub unshared: NamespaceSet,
    pub user_ns: Option<PathBuf>,
    pub filesystem_visible: bool,
    pub dumpable: bool,
    pub seccomp: Option<SeccompProfile>,
    journal: Vec<KernelCall>,
    failures: HashMap<KernelOp, Errno>,
}

impl SimulatedKernel {
    /// Root in the initial user namespace with every capability
    pub fn root() -> Self {
        let all = allocated();
        Self {
            caps: CapabilitySets {
                effective: all,
                permitted: all,
                inheritable: CapSet::EMPTY,
            },
            bounding: all,
            uid: 0,
            gid: 0,
            euid: 0,
            groups: vec![0],
            initial_user_ns: true,
            open_fds: (0..8).collect(),
            unshared: NamespaceSet::default(),
            user_ns: None,
            filesystem_visible: true,
            dumpable: true,
            seccomp: None,
            journal: Vec::new(),
            failures: HashMap::new(),
        }
    }

    /// Regular user without capabilities
    pub fn unprivileged(uid: u32, gid: u32) -> Self {
        Self {
            caps: CapabilitySets::default(),
            uid,
            gid,
            euid: uid,
            groups: vec![gid],
            ..Self::root()
        }
    }

    /// Make every later call of `op` fail with `errno`
    pub fn fail(&mut self, op: KernelOp, errno: Errno) -> &mut Self {
        self.failures.insert(op, errno);
        self
    }

    pub fn clear_failure(&mut self, op: KernelOp) -> &mut Self {
        self.failures.remove(&op);
        self
    }

    pub fn journal(&self) -> &[KernelCall] {
        &self.journal
    }

    pub fn take_journal(&mut self) -> Vec<KernelCall> {
        std::mem::take(&mut self.journal)
    }

    /// How many times `op` was called
    pub fn count(&self, op: KernelOp) -> usize {
        self.journal.iter().filter(|call| call.op() == op).count()
    }

    fn has(&self, cap: Capability) -> bool {
        self.caps.effective.contains(cap)
    }

    /// Journal `call` and return the injected failure, if any
    fn enter(&mut self, call: KernelCall) -> nix::Result<()> {
        let op = call.op();
        self.journal.push(call);
        match self.failures.get(&op) {
            Some(&errno) => Err(errno),
            None => Ok(()),
        }
    }

    fn enter_checked(&mut self, call: KernelCall) -> Result<()> {
        let op = call.op();
        self.enter(call)
            .map_err(|e| IsolationError::syscall(format!("simulated {}", op.name()), e))
    }

    fn require(&self, cap: Capability, op: KernelOp) -> Result<()> {
        if self.has(cap) {
            Ok(())
        } else {
            Err(IsolationError::syscall(
                format!("simulated {} without {}", op.name(), cap),
                Errno::EPERM,
            ))
        }
    }

    /// Entering a user namespace grants every capability inside it
    fn enter_user_namespace(&mut self, path: Option<PathBuf>) {
        let all = allocated();
        self.caps.effective = all;
        self.caps.permitted = all;
        self.initial_user_ns = false;
        self.user_ns = path;
    }
}

impl Default for SimulatedKernel {
    fn default() -> Self {
        Self::root()
    }
}

impl Kernel for SimulatedKernel {
    fn read_caps(&mut self) -> nix::Result<CapabilitySets> {
        self.enter(KernelCall::ReadCaps)?;
        Ok(self.caps)
    }

    fn write_caps(&mut self, sets: &CapabilitySets) -> nix::Result<()> {
        self.enter(KernelCall::WriteCaps(*sets))?;

        let old = self.caps;
        let inheritable_limit = old.inheritable | (old.permitted & self.bounding);
        if !sets.permitted.is_subset_of(old.permitted)
            || !sets.effective.is_subset_of(sets.permitted)
            || !sets.inheritable.is_subset_of(inheritable_limit)
        {
            return Err(Errno::EPERM);
        }

        self.caps = *sets;
        Ok(())
    }

    fn drop_bounding(&mut self, bit: u8) -> nix::Result<()> {
        self.enter(KernelCall::DropBounding(bit))?;

        let cap = Capability::from_bit(bit).ok_or(Errno::EINVAL)?;
        if !self.has(Capability::Setpcap) {
            return Err(Errno::EPERM);
        }
        self.bounding = self.bounding.without(cap);
        Ok(())
    }

    fn bounding_set(&mut self) -> CapSet {
        self.bounding
    }

    fn close_inherited_fds(&mut self, keep: Option<RawFd>) -> Result<()> {
        self.enter_checked(KernelCall::CloseFds { keep })?;
        self.open_fds.retain(|&fd| fd <= 2 || Some(fd) == keep);
        Ok(())
    }

    fn clear_groups(&mut self) -> nix::Result<()> {
        self.enter(KernelCall::ClearGroups)?;
        if !self.has(Capability::Setgid) {
            return Err(Errno::EPERM);
        }
        self.groups.clear();
        Ok(())
    }

    fn set_gid(&mut self, gid: u32) -> nix::Result<()> {
        self.enter(KernelCall::SetGid(gid))?;
        if gid != self.gid && !self.has(Capability::Setgid) {
            return Err(Errno::EPERM);
        }
        self.gid = gid;
        Ok(())
    }

    fn set_uid(&mut self, uid: u32) -> nix::Result<()> {
        self.enter(KernelCall::SetUid(uid))?;
        if uid != self.uid && !self.has(Capability::Setuid) {
            return Err(Errno::EPERM);
        }
        // Leaving root without keep-caps clears permitted and effective
        if self.euid == 0 && uid != 0 {
            self.caps.effective = CapSet::EMPTY;
            self.caps.permitted = CapSet::EMPTY;
        }
        self.uid = uid;
        self.euid = uid;
        Ok(())
    }

    fn join_user_ns(&mut self, path: &Path) -> Result<()> {
        self.enter_checked(KernelCall::JoinUserNs(path.to_path_buf()))?;
        self.enter_user_namespace(Some(path.to_path_buf()));
        Ok(())
    }

    fn create_user_ns(&mut self, uid: u32, gid: u32) -> Result<()> {
        self.enter_checked(KernelCall::CreateUserNs { uid, gid })?;
        self.enter_user_namespace(None);
        self.uid = 0;
        self.gid = 0;
        self.euid = 0;
        Ok(())
    }

    fn unshare(&mut self, set: NamespaceSet) -> Result<()> {
        self.enter_checked(KernelCall::Unshare(set))?;
        self.require(Capability::SysAdmin, KernelOp::Unshare)?;
        self.unshared = NamespaceSet {
            user: self.unshared.user || set.user,
            mount: self.unshared.mount || set.mount,
            ipc: self.unshared.ipc || set.ipc,
            uts: self.unshared.uts || set.uts,
            pid: self.unshared.pid || set.pid,
            net: self.unshared.net || set.net,
        };
        Ok(())
    }

    fn isolate_filesystem(&mut self, root: &EmptyRoot) -> Result<()> {
        self.enter_checked(KernelCall::IsolateFilesystem(root.scratch().to_path_buf()))?;
        self.require(Capability::SysAdmin, KernelOp::IsolateFilesystem)?;
        if !self.unshared.mount {
            return Err(IsolationError::syscall(
                "simulated pivot_root outside a private mount namespace",
                Errno::EINVAL,
            ));
        }
        self.filesystem_visible = false;
        Ok(())
    }

    fn disable_core_dumps(&mut self) -> Result<()> {
        self.enter_checked(KernelCall::DisableCoreDumps)?;
        self.dumpable = false;
        Ok(())
    }

    fn install_seccomp(&mut self, filter: &SeccompFilter) -> Result<()> {
        self.enter_checked(KernelCall::InstallSeccomp(filter.profile()))?;
        SeccompBpf::instruction_count(filter)?;
        self.seccomp = Some(filter.profile());
        Ok(())
    }

    fn effective_uid(&self) -> u32 {
        self.euid
    }

    fn in_initial_user_ns(&self) -> bool {
        self.initial_user_ns
    }
}
