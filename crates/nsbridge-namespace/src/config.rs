//! Namespace kinds and sets

use log::debug;
use nix::sched::{CloneFlags, unshare};
use nix::unistd::Pid;
use nsbridge_core::{IsolationError, Result};

/// Namespace types the daemon may move into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKind {
    /// User namespace - isolate UIDs/GIDs and capabilities
    User,
    /// Mount namespace - isolate the filesystem view
    Mount,
    /// IPC namespace - isolate System V IPC and POSIX queues
    Ipc,
    /// UTS namespace - isolate hostname
    Uts,
    /// PID namespace - isolate process IDs of children
    Pid,
    /// Network namespace
    Net,
}

impl NamespaceKind {
    pub fn all() -> [NamespaceKind; 6] {
        [
            NamespaceKind::User,
            NamespaceKind::Mount,
            NamespaceKind::Ipc,
            NamespaceKind::Uts,
            NamespaceKind::Pid,
            NamespaceKind::Net,
        ]
    }

    pub fn clone_flag(&self) -> CloneFlags {
        match self {
            NamespaceKind::User => CloneFlags::CLONE_NEWUSER,
            NamespaceKind::Mount => CloneFlags::CLONE_NEWNS,
            NamespaceKind::Ipc => CloneFlags::CLONE_NEWIPC,
            NamespaceKind::Uts => CloneFlags::CLONE_NEWUTS,
            NamespaceKind::Pid => CloneFlags::CLONE_NEWPID,
            NamespaceKind::Net => CloneFlags::CLONE_NEWNET,
        }
    }

    /// Entry name under /proc/<pid>/ns
    pub fn proc_name(&self) -> &'static str {
        match self {
            NamespaceKind::User => "user",
            NamespaceKind::Mount => "mnt",
            NamespaceKind::Ipc => "ipc",
            NamespaceKind::Uts => "uts",
            NamespaceKind::Pid => "pid",
            NamespaceKind::Net => "net",
        }
    }
}

/// A set of namespaces to unshare together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NamespaceSet {
    pub user: bool,
    pub mount: bool,
    pub ipc: bool,
    pub uts: bool,
    pub pid: bool,
    pub net: bool,
}

impl NamespaceSet {
    /// IPC, UTS and mount namespaces, optionally PID too
    pub fn prefork(pid: bool) -> Self {
        Self {
            mount: true,
            ipc: true,
            uts: true,
            pid,
            ..Self::default()
        }
    }

    pub fn contains(&self, kind: NamespaceKind) -> bool {
        match kind {
            NamespaceKind::User => self.user,
            NamespaceKind::Mount => self.mount,
            NamespaceKind::Ipc => self.ipc,
            NamespaceKind::Uts => self.uts,
            NamespaceKind::Pid => self.pid,
            NamespaceKind::Net => self.net,
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = NamespaceKind> + '_ {
        NamespaceKind::all()
            .into_iter()
            .filter(|&kind| self.contains(kind))
    }

    /// Convert to clone flags
    pub fn to_clone_flags(&self) -> CloneFlags {
        self.kinds()
            .fold(CloneFlags::empty(), |flags, kind| flags | kind.clone_flag())
    }

    pub fn enabled_count(&self) -> usize {
        self.kinds().count()
    }

    /// Move the calling process into fresh namespaces of every kind in
    /// the set. A new PID namespace only applies to children.
    pub fn unshare(&self) -> Result<()> {
        let flags = self.to_clone_flags();
        debug!("Unsharing namespaces: {:?}", flags);
        unshare(flags).map_err(|e| IsolationError::syscall("Couldn't unshare namespaces", e))
    }
}

/// Get namespace inode for a process (`None` for the caller)
pub fn namespace_inode(kind: NamespaceKind, pid: Option<Pid>) -> Result<u64> {
    let pid_str = match pid {
        Some(p) => p.as_raw().to_string(),
        None => "self".to_string(),
    };
    let path = format!("/proc/{}/ns/{}", pid_str, kind.proc_name());
    let stat = std::fs::metadata(&path).map_err(|e| {
        IsolationError::Namespace(format!(
            "Failed to get namespace info for pid={} ns={}: {}",
            pid_str,
            kind.proc_name(),
            e
        ))
    })?;

    use std::os::unix::fs::MetadataExt;
    Ok(stat.ino())
}

/// Check if two processes share a namespace
pub fn shares_namespace(kind: NamespaceKind, pid1: Option<Pid>, pid2: Option<Pid>) -> Result<bool> {
    let inode1 = namespace_inode(kind, pid1)?;
    let inode2 = namespace_inode(kind, pid2)?;
    Ok(inode1 == inode2)
}
