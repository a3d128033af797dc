//! Runtime syscall allow-lists per operating mode

use nsbridge_core::{IsolationError, Mode, OperatingMode, Result};
use std::collections::HashSet;

/// Seccomp profile, one per operating mode.
///
/// Every profile allows the common data path set; modes add what their
/// own I/O needs on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeccompProfile {
    /// Common set only
    Passt,
    /// Common set + `lseek` for the tap device
    Pasta,
    /// Common set + shared memory and vhost control
    VhostUser,
}

impl SeccompProfile {
    pub fn all() -> Vec<Self> {
        vec![
            SeccompProfile::Passt,
            SeccompProfile::Pasta,
            SeccompProfile::VhostUser,
        ]
    }

    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Passt => SeccompProfile::Passt,
            Mode::Pasta => SeccompProfile::Pasta,
            Mode::VhostUser => SeccompProfile::VhostUser,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SeccompProfile::Passt => "Sockets, epoll and timers only",
            SeccompProfile::Pasta => "passt set + lseek on the tap device",
            SeccompProfile::VhostUser => "passt set + ioctl, mmap and getsockname",
        }
    }

    /// Syscalls needed by the data path in every mode
    fn common_syscalls() -> Vec<&'static str> {
        vec![
            // I/O
            "read",
            "write",
            "writev",
            "readv",
            "close",
            "fcntl",
            // Sockets
            "recvfrom",
            "sendto",
            "recvmsg",
            "sendmsg",
            "recvmmsg",
            "sendmmsg",
            "socket",
            "getsockopt",
            "setsockopt",
            "bind",
            "connect",
            "shutdown",
            "accept",
            "accept4",
            "listen",
            // Event loop
            "epoll_ctl",
            "epoll_wait",
            "epoll_pwait",
            "clock_gettime",
            "timerfd_create",
            "timerfd_settime",
            "timerfd_gettime",
            // Exit and signal return
            "exit_group",
            "exit",
            "rt_sigreturn",
            "restart_syscall",
        ]
    }

    fn extras(&self) -> Vec<&'static str> {
        match self {
            SeccompProfile::Passt => vec![],
            SeccompProfile::Pasta => vec!["lseek"],
            SeccompProfile::VhostUser => vec!["getsockname", "ioctl", "mmap", "munmap"],
        }
    }

    pub fn syscalls(&self) -> HashSet<String> {
        Self::common_syscalls()
            .into_iter()
            .chain(self.extras())
            .map(str::to_string)
            .collect()
    }
}

impl From<Mode> for SeccompProfile {
    fn from(mode: Mode) -> Self {
        Self::for_mode(mode)
    }
}

/// The allow-list installed for one profile. Anything else kills the
/// process.
#[derive(Debug, Clone)]
pub struct SeccompFilter {
    allowed: HashSet<String>,
    profile: SeccompProfile,
}

impl SeccompFilter {
    pub fn from_profile(profile: SeccompProfile) -> Self {
        Self {
            allowed: profile.syscalls(),
            profile,
        }
    }

    /// Filter for the daemon's operating mode
    pub fn for_mode(mode: &OperatingMode) -> Self {
        Self::from_profile(SeccompProfile::for_mode(mode.mode))
    }

    #[cfg(test)]
    pub(crate) fn with_syscalls(profile: SeccompProfile, names: &[&str]) -> Self {
        Self {
            allowed: names.iter().map(|name| name.to_string()).collect(),
            profile,
        }
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed.contains(name)
    }

    pub fn allowed_syscalls(&self) -> &HashSet<String> {
        &self.allowed
    }

    pub fn allowed_count(&self) -> usize {
        self.allowed.len()
    }

    pub fn profile(&self) -> SeccompProfile {
        self.profile
    }

    /// A filter must leave something allowed, at least a way to exit
    pub fn validate(&self) -> Result<()> {
        if self.allowed.is_empty() {
            return Err(IsolationError::Seccomp(
                "Filter allows no syscalls".to_string(),
            ));
        }
        if !self.is_allowed("exit_group") && !self.is_allowed("exit") {
            return Err(IsolationError::Seccomp(
                "Filter must allow exit or exit_group".to_string(),
            ));
        }
        Ok(())
    }

    /// Allowed syscalls, sorted
    pub fn export(&self) -> Vec<String> {
        let mut syscalls: Vec<String> = self.allowed.iter().cloned().collect();
        syscalls.sort();
        syscalls
    }
}
