//! Process-wide privilege state and the stage it has reached

use nsbridge_caps::{CapSet, CapabilitySets};
use nsbridge_namespace::NamespaceSet;
use nsbridge_seccomp::SeccompProfile;
use std::fmt;
use std::os::unix::io::RawFd;
use std::path::PathBuf;

/// How far isolation has progressed. Only ever moves forward, one step
/// per stage operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stage {
    /// Nothing done yet
    #[default]
    Startup,
    Initial,
    UserSwitched,
    PreforkIsolated,
    /// Terminal
    PostforkIsolated,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Startup => Some(Stage::Initial),
            Stage::Initial => Some(Stage::UserSwitched),
            Stage::UserSwitched => Some(Stage::PreforkIsolated),
            Stage::PreforkIsolated => Some(Stage::PostforkIsolated),
            Stage::PostforkIsolated => None,
        }
    }

    /// Position in the lifecycle, 0 for `Startup`
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Startup => "startup",
            Stage::Initial => "initial",
            Stage::UserSwitched => "user-switched",
            Stage::PreforkIsolated => "prefork-isolated",
            Stage::PostforkIsolated => "postfork-isolated",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// User namespace the process ended up in
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UserNamespace {
    /// Still the one we were started in
    #[default]
    Original,
    Joined(PathBuf),
    Created,
}

/// Single owned record of the process's privilege surface.
///
/// Passed by exclusive reference through the stage operations. Within a
/// user namespace the recorded capability sets and bounding set may only
/// shrink; entering a new user namespace starts a fresh baseline.
#[derive(Debug, Clone)]
pub struct PrivilegeState {
    stage: Stage,
    caps: Option<CapabilitySets>,
    bounding: Option<CapSet>,
    uid: Option<u32>,
    gid: Option<u32>,
    groups_cleared: bool,
    designated_fd: Option<RawFd>,
    user_namespace: UserNamespace,
    namespaces: NamespaceSet,
    filesystem_visible: bool,
    dumpable: bool,
    seccomp: Option<SeccompProfile>,
}

impl Default for PrivilegeState {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivilegeState {
    pub fn new() -> Self {
        Self {
            stage: Stage::Startup,
            caps: None,
            bounding: None,
            uid: None,
            gid: None,
            groups_cleared: false,
            designated_fd: None,
            user_namespace: UserNamespace::Original,
            namespaces: NamespaceSet::default(),
            filesystem_visible: true,
            dumpable: true,
            seccomp: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Panic unless the process is exactly at `expected`.
    ///
    /// Calling a stage out of order is a programming error in the host
    /// driver, never a runtime condition.
    pub fn require(&self, expected: Stage, operation: &str) {
        assert!(
            self.stage == expected,
            "{} called at stage {}, expected stage {}",
            operation,
            self.stage,
            expected
        );
    }

    /// Move forward by exactly one stage
    pub(crate) fn advance(&mut self) -> Stage {
        let next = self
            .stage
            .next()
            .unwrap_or_else(|| panic!("no stage after {}", self.stage));
        self.stage = next;
        next
    }

    /// Last capability sets read or written, if known
    pub fn caps(&self) -> Option<CapabilitySets> {
        self.caps
    }

    /// Capabilities still both effective and permitted
    pub fn retained(&self) -> CapSet {
        self.caps
            .map(|sets| sets.effective & sets.permitted)
            .unwrap_or(CapSet::EMPTY)
    }

    pub fn bounding(&self) -> Option<CapSet> {
        self.bounding
    }

    pub fn uid(&self) -> Option<u32> {
        self.uid
    }

    pub fn gid(&self) -> Option<u32> {
        self.gid
    }

    pub fn groups_cleared(&self) -> bool {
        self.groups_cleared
    }

    pub fn designated_fd(&self) -> Option<RawFd> {
        self.designated_fd
    }

    pub fn user_namespace(&self) -> &UserNamespace {
        &self.user_namespace
    }

    /// Namespaces unshared after the user namespace
    pub fn namespaces(&self) -> NamespaceSet {
        self.namespaces
    }

    pub fn filesystem_visible(&self) -> bool {
        self.filesystem_visible
    }

    pub fn dumpable(&self) -> bool {
        self.dumpable
    }

    pub fn seccomp(&self) -> Option<SeccompProfile> {
        self.seccomp
    }

    /// Record capability sets observed from the kernel. Panics if they
    /// are wider than the previous record in the same user namespace.
    pub(crate) fn record_caps(&mut self, sets: CapabilitySets) {
        if let Some(old) = self.caps {
            assert!(
                sets.effective.is_subset_of(old.effective | old.permitted)
                    && sets.permitted.is_subset_of(old.permitted),
                "capability sets widened from {:?} to {:?}",
                old,
                sets
            );
        }
        self.caps = Some(sets);
    }

    pub(crate) fn record_bounding(&mut self, bounding: CapSet) {
        if let Some(old) = self.bounding {
            assert!(
                bounding.is_subset_of(old),
                "bounding set widened from {} to {}",
                old,
                bounding
            );
        }
        self.bounding = Some(bounding);
    }

    pub(crate) fn record_identity(&mut self, uid: u32, gid: u32, groups_cleared: bool) {
        self.uid = Some(uid);
        self.gid = Some(gid);
        self.groups_cleared = groups_cleared;
    }

    pub(crate) fn record_designated_fd(&mut self, fd: Option<RawFd>) {
        self.designated_fd = fd;
    }

    /// Capabilities are relative to the user namespace: forget the old
    /// baseline.
    pub(crate) fn enter_user_namespace(&mut self, ns: UserNamespace) {
        self.user_namespace = ns;
        self.caps = None;
    }

    pub(crate) fn record_namespaces(&mut self, set: NamespaceSet) {
        self.namespaces = set;
    }

    pub(crate) fn hide_filesystem(&mut self) {
        self.filesystem_visible = false;
    }

    pub(crate) fn disable_dumps(&mut self) {
        self.dumpable = false;
    }

    pub(crate) fn record_seccomp(&mut self, profile: SeccompProfile) {
        self.seccomp = Some(profile);
    }
}
