//! Which capabilities each stage keeps, and which failures it tolerates

use nix::errno::Errno;
use nsbridge_caps::{CapSet, Capability};
use nsbridge_core::{ErrnoPolicy, OperatingMode};

/// Without CAP_SETGID, dropping supplementary groups fails with EPERM:
/// the process is already unprivileged in that respect.
pub const SETGROUPS: ErrnoPolicy = ErrnoPolicy::tolerating(&[Errno::EPERM]);

/// EINVAL: bit position not allocated by this kernel
const BOUNDING_DROP: ErrnoPolicy = ErrnoPolicy::tolerating(&[Errno::EINVAL]);

/// EPERM: no CAP_SETPCAP, expected when we don't own our user namespace
const BOUNDING_DROP_RESTRICTED: ErrnoPolicy =
    ErrnoPolicy::tolerating(&[Errno::EINVAL, Errno::EPERM]);

/// Policy for `PR_CAPBSET_DROP` in `mode`
pub fn bounding_drop(mode: &OperatingMode) -> ErrnoPolicy {
    if mode.is_restricted() {
        BOUNDING_DROP_RESTRICTED
    } else {
        BOUNDING_DROP
    }
}

/// Capabilities kept through setup: binding low ports, switching
/// identity, creating and configuring namespaces.
///
/// Root outside the initial user namespace also keeps CAP_SETFCAP, which
/// writing a gid/uid map for a further namespace may need.
pub fn setup_keep(euid: u32, in_initial_user_ns: bool) -> CapSet {
    let keep = CapSet::of(&[
        Capability::NetBindService,
        Capability::Setuid,
        Capability::Setgid,
        Capability::SysAdmin,
        Capability::NetAdmin,
    ]);

    if euid == 0 && !in_initial_user_ns {
        keep.with(Capability::Setfcap)
    } else {
        keep
    }
}

/// Capabilities kept once setup is over. pasta re-joins the target
/// namespace and may bind low ports in it; passt and vhost-user only do
/// packet I/O on descriptors they already hold.
pub fn runtime_keep(mode: &OperatingMode) -> CapSet {
    if mode.is_pasta() {
        CapSet::of(&[Capability::SysAdmin, Capability::NetBindService])
    } else {
        CapSet::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsbridge_core::Mode;

    #[test]
    fn test_setgroups_tolerates_eperm_only() {
        assert!(SETGROUPS.tolerates(Errno::EPERM));
        assert!(!SETGROUPS.tolerates(Errno::EINVAL));
    }

    #[test]
    fn test_bounding_drop_eperm_restricted_only() {
        let pasta = OperatingMode::new(Mode::Pasta);
        assert!(bounding_drop(&pasta).tolerates(Errno::EINVAL));
        assert!(!bounding_drop(&pasta).tolerates(Errno::EPERM));

        for mode in [
            OperatingMode::new(Mode::Passt),
            OperatingMode::new(Mode::VhostUser),
            OperatingMode::new(Mode::Pasta).netns_only(true),
        ] {
            let policy = bounding_drop(&mode);
            assert!(policy.tolerates(Errno::EPERM), "{} should tolerate EPERM", mode);
            assert!(!policy.tolerates(Errno::ENOMEM));
        }
    }

    #[test]
    fn test_setup_keep() {
        let keep = setup_keep(1000, true);
        assert!(keep.contains(Capability::SysAdmin));
        assert!(keep.contains(Capability::Setuid));
        assert!(!keep.contains(Capability::Setfcap));
        assert!(!keep.contains(Capability::NetRaw));

        assert!(setup_keep(0, false).contains(Capability::Setfcap));
        assert!(!setup_keep(0, true).contains(Capability::Setfcap));
    }

    #[test]
    fn test_runtime_keep_is_within_setup_keep() {
        for mode in Mode::all() {
            let keep = runtime_keep(&OperatingMode::new(mode));
            assert!(keep.is_subset_of(setup_keep(0, true)));
        }
        assert!(runtime_keep(&OperatingMode::new(Mode::Passt)).is_empty());
        assert!(
            runtime_keep(&OperatingMode::new(Mode::Pasta)).contains(Capability::NetBindService)
        );
    }
}
