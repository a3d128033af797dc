//! Isolation lifecycle against the simulated kernel

use nix::errno::Errno;
use nsbridge_caps::{CapSet, Capability};
use nsbridge_core::{Mode, OperatingMode};
use nsbridge_isolation::{
    Isolation, IsolationContext, KernelCall, KernelOp, SimulatedKernel, Stage, UserNamespace,
    UserTarget,
};
use nsbridge_seccomp::SeccompProfile;
use std::path::PathBuf;

fn target(mode: OperatingMode) -> UserTarget {
    UserTarget {
        uid: 1000,
        gid: 1000,
        use_userns: true,
        userns: None,
        mode,
    }
}

fn pasta() -> OperatingMode {
    OperatingMode::new(Mode::Pasta)
}

/// Run every stage, checking the stage only ever moves up by one
fn run_all(isolation: &mut Isolation<SimulatedKernel>, mode: OperatingMode) {
    let ctx = IsolationContext::new(mode);
    let mut last = isolation.stage();

    let mut step = |now: Stage, stage: &str| {
        assert_eq!(now.index(), last.index() + 1, "after {}", stage);
        last = now;
    };

    isolation.initial(&["--fd", "5"]).unwrap();
    step(isolation.stage(), "initial");
    isolation.user(&target(mode)).unwrap();
    step(isolation.stage(), "user");
    isolation.prefork(&ctx).unwrap();
    step(isolation.stage(), "prefork");
    isolation.postfork(&ctx).unwrap();
    step(isolation.stage(), "postfork");
}

#[test]
fn full_lifecycle_as_root() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    run_all(&mut isolation, pasta());

    let state = isolation.state();
    assert_eq!(state.stage(), Stage::PostforkIsolated);
    assert_eq!(state.uid(), Some(1000));
    assert!(state.groups_cleared());
    assert_eq!(state.designated_fd(), Some(5));
    assert_eq!(state.user_namespace(), &UserNamespace::Created);
    assert!(!state.filesystem_visible());
    assert!(!state.dumpable());
    assert_eq!(state.seccomp(), Some(SeccompProfile::Pasta));
    assert_eq!(
        state.retained(),
        CapSet::of(&[Capability::SysAdmin, Capability::NetBindService])
    );

    let kernel = isolation.kernel();
    assert_eq!(kernel.open_fds.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 5]);
    assert!(kernel.bounding.is_empty());
    assert!(kernel.caps.inheritable.is_empty());
    assert!(kernel.unshared.ipc && kernel.unshared.uts && kernel.unshared.mount);
}

#[test]
fn initial_keeps_setup_capabilities_only() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    isolation.initial::<&str>(&[]).unwrap();

    let retained = isolation.state().retained();
    assert!(retained.contains(Capability::SysAdmin));
    assert!(retained.contains(Capability::Setuid));
    assert!(!retained.contains(Capability::NetRaw));
    assert!(!retained.contains(Capability::Setfcap));
    assert_eq!(isolation.kernel().open_fds.len(), 3);
}

#[test]
fn initial_keeps_setfcap_for_root_in_user_namespace() {
    let mut kernel = SimulatedKernel::root();
    kernel.initial_user_ns = false;
    let mut isolation = Isolation::new(kernel);
    isolation.initial::<&str>(&[]).unwrap();
    assert!(isolation.state().retained().contains(Capability::Setfcap));
}

#[test]
fn initial_leaves_inheritable_and_bounding() {
    let mut kernel = SimulatedKernel::root();
    kernel.caps.inheritable = CapSet::of(&[Capability::NetRaw]);
    let bounding = kernel.bounding;
    let mut isolation = Isolation::new(kernel);
    isolation.initial::<&str>(&[]).unwrap();

    assert_eq!(isolation.kernel().bounding, bounding);
    assert_eq!(
        isolation.kernel().caps.inheritable,
        CapSet::of(&[Capability::NetRaw])
    );
}

#[test]
fn invalid_fd_argument_stops_before_any_change() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    assert!(isolation.initial(&["--fd", "x"]).is_err());
    assert_eq!(isolation.stage(), Stage::Startup);
    assert!(isolation.kernel().journal().is_empty());
}

#[test]
fn unprivileged_setgroups_is_tolerated() {
    let mut isolation = Isolation::new(SimulatedKernel::unprivileged(1000, 1000));
    isolation.initial::<&str>(&[]).unwrap();
    isolation.user(&target(pasta())).unwrap();

    assert!(!isolation.state().groups_cleared());
    assert_eq!(isolation.stage(), Stage::UserSwitched);
}

#[test]
fn setgroups_other_errno_is_fatal() {
    let mut kernel = SimulatedKernel::root();
    kernel.fail(KernelOp::ClearGroups, Errno::EINVAL);
    let mut isolation = Isolation::new(kernel);
    isolation.initial::<&str>(&[]).unwrap();

    let err = isolation.user(&target(pasta())).unwrap_err();
    assert_eq!(err.errno(), Some(Errno::EINVAL));
    assert_eq!(isolation.stage(), Stage::Initial);
}

#[test]
fn setuid_failure_is_fatal() {
    let mut kernel = SimulatedKernel::root();
    kernel.fail(KernelOp::SetUid, Errno::EAGAIN);
    let mut isolation = Isolation::new(kernel);
    isolation.initial::<&str>(&[]).unwrap();

    let err = isolation.user(&target(pasta())).unwrap_err();
    assert!(err.to_string().contains("Can't set UID to 1000"));
}

#[test]
fn identity_change_precedes_user_namespace() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    isolation.initial::<&str>(&[]).unwrap();
    isolation.kernel_mut().take_journal();
    isolation.user(&target(pasta())).unwrap();

    let ops: Vec<KernelOp> = isolation
        .kernel()
        .journal()
        .iter()
        .map(KernelCall::op)
        .filter(|op| *op != KernelOp::DropBounding)
        .collect();
    assert_eq!(
        &ops[..4],
        &[
            KernelOp::ClearGroups,
            KernelOp::SetGid,
            KernelOp::SetUid,
            KernelOp::CreateUserNs
        ]
    );
}

#[test]
fn joining_a_user_namespace_by_path() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    isolation.initial::<&str>(&[]).unwrap();
    let path = PathBuf::from("/proc/1234/ns/user");
    isolation
        .user(&UserTarget {
            userns: Some(path.clone()),
            ..target(pasta())
        })
        .unwrap();

    assert_eq!(
        isolation.state().user_namespace(),
        &UserNamespace::Joined(path.clone())
    );
    assert!(
        isolation
            .kernel()
            .journal()
            .contains(&KernelCall::JoinUserNs(path))
    );
    assert_eq!(isolation.kernel().count(KernelOp::CreateUserNs), 0);
}

#[test]
fn no_user_namespace_requested() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    isolation.initial::<&str>(&[]).unwrap();
    isolation
        .user(&UserTarget {
            use_userns: false,
            ..target(OperatingMode::new(Mode::Passt))
        })
        .unwrap();
    assert_eq!(isolation.state().user_namespace(), &UserNamespace::Original);
}

#[test]
fn bounding_eperm_tolerated_in_restricted_mode() {
    // Leaving root drops CAP_SETPCAP, and no namespace brings it back
    let passt = OperatingMode::new(Mode::Passt);
    let mut isolation = Isolation::new(SimulatedKernel::root());
    isolation.initial::<&str>(&[]).unwrap();
    isolation
        .user(&UserTarget {
            use_userns: false,
            ..target(passt)
        })
        .unwrap();
    assert!(isolation.kernel().caps.inheritable.is_empty());
    assert!(!isolation.kernel().bounding.is_empty());
}

#[test]
fn bounding_eperm_fatal_for_pasta() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    isolation.initial::<&str>(&[]).unwrap();
    let err = isolation
        .user(&UserTarget {
            use_userns: false,
            ..target(pasta())
        })
        .unwrap_err();
    assert_eq!(err.errno(), Some(Errno::EPERM));
    assert_eq!(isolation.stage(), Stage::Initial);
}

#[test]
fn bounding_eperm_tolerated_for_netns_only_pasta() {
    let mode = pasta().netns_only(true);
    let mut isolation = Isolation::new(SimulatedKernel::root());
    isolation.initial::<&str>(&[]).unwrap();
    isolation
        .user(&UserTarget {
            use_userns: false,
            ..target(mode)
        })
        .unwrap();
}

#[test]
fn clamp_never_grows_bounding_set() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    let before = isolation.kernel().bounding;
    isolation.initial::<&str>(&[]).unwrap();
    isolation.user(&target(pasta())).unwrap();
    let after = isolation.state().bounding().unwrap();
    assert!(after.is_subset_of(before));
}

#[test]
fn prefork_pid_namespace_rules() {
    let bg = IsolationContext::new(pasta());
    assert!(bg.prefork_namespaces().pid);
    let fg = IsolationContext::new(pasta()).foreground(true);
    assert!(!fg.prefork_namespaces().pid);
    let passt_fg = IsolationContext::new(OperatingMode::new(Mode::Passt)).foreground(true);
    assert!(passt_fg.prefork_namespaces().pid);
}

#[test]
fn prefork_failure_is_returned() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    isolation.initial::<&str>(&[]).unwrap();
    isolation.user(&target(pasta())).unwrap();
    isolation
        .kernel_mut()
        .fail(KernelOp::IsolateFilesystem, Errno::ENOENT);

    let err = isolation.prefork(&IsolationContext::new(pasta())).unwrap_err();
    assert_eq!(err.errno(), Some(Errno::ENOENT));
    assert_eq!(isolation.stage(), Stage::UserSwitched);
    assert!(isolation.state().filesystem_visible());
}

#[test]
fn passt_keeps_nothing_after_prefork() {
    let passt = OperatingMode::new(Mode::Passt);
    let mut isolation = Isolation::new(SimulatedKernel::root());
    isolation.initial::<&str>(&[]).unwrap();
    isolation.user(&target(passt)).unwrap();
    isolation.prefork(&IsolationContext::new(passt)).unwrap();

    assert!(isolation.state().retained().is_empty());
    assert!(isolation.kernel().caps.permitted.is_empty());
}

#[test]
fn vhost_user_gets_its_filter() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    run_all(&mut isolation, OperatingMode::new(Mode::VhostUser));
    assert_eq!(isolation.state().seccomp(), Some(SeccompProfile::VhostUser));
}

#[test]
fn postfork_disables_dumps_before_filter() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    run_all(&mut isolation, pasta());
    let ops: Vec<KernelOp> = isolation.kernel().journal().iter().map(KernelCall::op).collect();
    let dumps = ops.iter().position(|op| *op == KernelOp::DisableCoreDumps);
    let filter = ops.iter().position(|op| *op == KernelOp::InstallSeccomp);
    assert!(dumps.unwrap() < filter.unwrap());
    assert_eq!(filter.unwrap(), ops.len() - 1);
}

#[test]
#[should_panic(expected = "User isolation called at stage startup")]
fn user_before_initial_panics() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    let _ = isolation.user(&target(pasta()));
}

#[test]
#[should_panic(expected = "Postfork isolation called at stage user-switched")]
fn postfork_before_prefork_panics() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    isolation.initial::<&str>(&[]).unwrap();
    isolation.user(&target(pasta())).unwrap();
    let _ = isolation.postfork(&IsolationContext::new(pasta()));
}

#[test]
#[should_panic(expected = "Initial isolation called at stage initial")]
fn initial_twice_panics() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    isolation.initial::<&str>(&[]).unwrap();
    let _ = isolation.initial::<&str>(&[]);
}

#[test]
#[should_panic(expected = "Prefork isolation called at stage postfork-isolated")]
fn nothing_after_postfork() {
    let mut isolation = Isolation::new(SimulatedKernel::root());
    run_all(&mut isolation, pasta());
    let _ = isolation.prefork(&IsolationContext::new(pasta()));
}
