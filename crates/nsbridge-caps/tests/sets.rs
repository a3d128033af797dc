//! Capability primitive tests
//!
//! These tests run the kernel primitives in a forked child so the test
//! runner keeps its own capabilities. They do NOT require root: narrowing
//! capability sets is always allowed.

use nix::errno::Errno;
use nsbridge_caps::sys::{bounding_contains, bounding_drop, capget, capset};
use nsbridge_caps::{CapSet, Capability};

fn wait_child(pid: libc::pid_t) -> i32 {
    let mut status: i32 = 0;
    let ret = unsafe { libc::waitpid(pid, &mut status, 0) };
    assert_eq!(ret, pid);
    assert!(libc::WIFEXITED(status), "child did not exit, status=0x{:x}", status);
    libc::WEXITSTATUS(status)
}

/// Dropping effective/permitted capabilities must not touch inheritable.
#[test]
fn capset_narrows_effective_and_permitted() {
    unsafe {
        let pid = libc::fork();
        assert!(pid >= 0, "fork failed: {}", std::io::Error::last_os_error());

        if pid == 0 {
            let Ok(before) = capget() else { libc::_exit(10) };
            let keep = CapSet::of(&[Capability::NetBindService]);
            if capset(&before.restrict_ep(keep)).is_err() {
                libc::_exit(11);
            }
            let Ok(after) = capget() else { libc::_exit(12) };

            if !after.effective.is_subset_of(keep) || !after.permitted.is_subset_of(keep) {
                libc::_exit(13);
            }
            if after.inheritable != before.inheritable {
                libc::_exit(14);
            }
            libc::_exit(0);
        }

        assert_eq!(wait_child(pid), 0);
    }
}

/// Raising a capability that was never permitted is refused.
#[test]
fn capset_cannot_widen() {
    unsafe {
        let pid = libc::fork();
        assert!(pid >= 0, "fork failed");

        if pid == 0 {
            let Ok(mut sets) = capget() else { libc::_exit(10) };
            sets = sets.restrict_ep(CapSet::EMPTY);
            if capset(&sets).is_err() {
                libc::_exit(11);
            }
            sets.permitted = CapSet::of(&[Capability::SysAdmin]);
            match capset(&sets) {
                Err(Errno::EPERM) => libc::_exit(0),
                _ => libc::_exit(1),
            }
        }

        assert_eq!(wait_child(pid), 0);
    }
}

/// A successful bounding-set drop is visible; without CAP_SETPCAP the
/// kernel answers EPERM.
#[test]
fn bounding_drop_is_effective_or_denied() {
    unsafe {
        let pid = libc::fork();
        assert!(pid >= 0, "fork failed");

        if pid == 0 {
            let bit = Capability::SysModule.bit();
            match bounding_drop(bit) {
                Ok(()) => match bounding_contains(bit) {
                    Ok(false) => libc::_exit(0),
                    _ => libc::_exit(1),
                },
                Err(Errno::EPERM) => libc::_exit(0),
                Err(_) => libc::_exit(2),
            }
        }

        assert_eq!(wait_child(pid), 0);
    }
}

#[test]
fn bounding_drop_of_unallocated_bit_is_einval_or_eperm() {
    unsafe {
        let pid = libc::fork();
        assert!(pid >= 0, "fork failed");

        if pid == 0 {
            match bounding_drop(63) {
                Err(Errno::EINVAL) | Err(Errno::EPERM) => libc::_exit(0),
                _ => libc::_exit(1),
            }
        }

        assert_eq!(wait_child(pid), 0);
    }
}
