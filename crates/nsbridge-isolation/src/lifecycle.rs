//! The four isolation stages
//!
//! Called exactly once each, in order, by the host driver:
//!
//! 1. [`Isolation::initial`] at startup: close inherited descriptors, keep
//!    only the capabilities needed for setup
//! 2. [`Isolation::user`] once the target identity is known: final UID/GID
//!    and user namespace, clamp bounding and inheritable sets
//! 3. [`Isolation::prefork`] after setup, before daemonizing: fresh IPC,
//!    UTS and mount namespaces, empty root, runtime capabilities only
//! 4. [`Isolation::postfork`] in the child after daemonizing: no core
//!    dumps, runtime syscall filter
//!
//! Filesystem access survives the first two stages; setup still reads
//! configuration after them.

use crate::caps::{clamp_bounding_and_inheritable, drop_effective_permitted};
use crate::fds::designated_fd;
use crate::kernel::Kernel;
use crate::policy;
use crate::state::{PrivilegeState, Stage, UserNamespace};
use log::{debug, info};
use nsbridge_core::{ErrnoPolicy, OperatingMode, Result};
use nsbridge_namespace::{EmptyRoot, NamespaceSet};
use nsbridge_seccomp::SeccompFilter;
use std::path::{Path, PathBuf};

/// Identity and user namespace to switch to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTarget {
    pub uid: u32,
    pub gid: u32,
    /// Create a user namespace if `userns` is not given
    pub use_userns: bool,
    /// Existing user namespace to join
    pub userns: Option<PathBuf>,
    pub mode: OperatingMode,
}

/// Execution context of the last two stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationContext {
    pub mode: OperatingMode,
    pub foreground: bool,
    pub root: EmptyRoot,
}

impl IsolationContext {
    pub fn new(mode: OperatingMode) -> Self {
        Self {
            mode,
            foreground: false,
            root: EmptyRoot::default(),
        }
    }

    pub fn foreground(mut self, foreground: bool) -> Self {
        self.foreground = foreground;
        self
    }

    pub fn scratch(mut self, scratch: impl AsRef<Path>) -> Self {
        self.root = EmptyRoot::new(scratch);
        self
    }

    /// Namespaces to unshare before daemonizing. A new PID namespace only
    /// affects children, so pasta in the foreground, which never forks
    /// again, gets none.
    pub fn prefork_namespaces(&self) -> NamespaceSet {
        NamespaceSet::prefork(!(self.mode.is_pasta() && self.foreground))
    }
}

/// Drives the stages against a kernel, owning the privilege state
#[derive(Debug)]
pub struct Isolation<K: Kernel> {
    kernel: K,
    state: PrivilegeState,
}

impl<K: Kernel> Isolation<K> {
    pub fn new(kernel: K) -> Self {
        Self {
            kernel,
            state: PrivilegeState::new(),
        }
    }

    pub fn state(&self) -> &PrivilegeState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage()
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    pub fn into_parts(self) -> (K, PrivilegeState) {
        (self.kernel, self.state)
    }

    /// Early, mostly configuration independent isolation.
    ///
    /// `args` are the command line arguments without the program name;
    /// only the designated descriptor (`--fd`) is looked at.
    pub fn initial<S: AsRef<str>>(&mut self, args: &[S]) -> Result<()> {
        self.state.require(Stage::Startup, "Initial isolation");

        let keep_fd = designated_fd(args)?;
        self.kernel.close_inherited_fds(keep_fd)?;
        self.state.record_designated_fd(keep_fd);

        let keep = policy::setup_keep(self.kernel.effective_uid(), self.kernel.in_initial_user_ns());
        drop_effective_permitted(&mut self.kernel, &mut self.state, keep)?;

        self.finish()
    }

    /// Switch to the final UID/GID and move into the final user namespace.
    ///
    /// There is no way back to the original identity afterwards.
    pub fn user(&mut self, target: &UserTarget) -> Result<()> {
        self.state.require(Stage::Initial, "User isolation");

        let groups = policy::SETGROUPS.check_logged(self.kernel.clear_groups(), || {
            "Can't drop supplementary groups".to_string()
        })?;

        ErrnoPolicy::FATAL.check(self.kernel.set_gid(target.gid), || {
            format!("Can't set GID to {}", target.gid)
        })?;
        ErrnoPolicy::FATAL.check(self.kernel.set_uid(target.uid), || {
            format!("Can't set UID to {}", target.uid)
        })?;
        self.state
            .record_identity(target.uid, target.gid, groups.is_applied());
        debug!("Now running as {}:{}", target.uid, target.gid);

        if let Some(path) = &target.userns {
            self.kernel.join_user_ns(path)?;
            self.state
                .enter_user_namespace(UserNamespace::Joined(path.clone()));
        } else if target.use_userns {
            self.kernel.create_user_ns(target.uid, target.gid)?;
            self.state.enter_user_namespace(UserNamespace::Created);
        }

        clamp_bounding_and_inheritable(&mut self.kernel, &mut self.state, &target.mode)?;

        self.finish()
    }

    /// Isolation before daemonizing.
    ///
    /// Returns the error rather than exiting so the caller can clean up
    /// first. Syscalls needed to daemonize remain available.
    pub fn prefork(&mut self, ctx: &IsolationContext) -> Result<()> {
        self.state.require(Stage::UserSwitched, "Prefork isolation");

        let namespaces = ctx.prefork_namespaces();
        self.kernel.unshare(namespaces)?;
        self.state.record_namespaces(namespaces);

        self.kernel.isolate_filesystem(&ctx.root)?;
        self.state.hide_filesystem();

        drop_effective_permitted(
            &mut self.kernel,
            &mut self.state,
            policy::runtime_keep(&ctx.mode),
        )?;

        self.finish()
    }

    /// Isolation after daemonizing, in the child. Terminal.
    pub fn postfork(&mut self, ctx: &IsolationContext) -> Result<()> {
        self.state.require(Stage::PreforkIsolated, "Postfork isolation");

        self.kernel.disable_core_dumps()?;
        self.state.disable_dumps();

        let filter = SeccompFilter::for_mode(&ctx.mode);
        self.kernel.install_seccomp(&filter)?;
        self.state.record_seccomp(filter.profile());

        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        let stage = self.state.advance();
        info!("Isolation stage complete: {}", stage);
        Ok(())
    }
}
