//! Kernel capability primitives
//!
//! `capget`/`capset` have no libc or nix wrappers, so they go through
//! `syscall(2)` with the version 3 (64-bit) header.

use crate::capability::{CapSet, Capability, CapabilitySets};
use nix::errno::Errno;

const LINUX_CAPABILITY_VERSION_3: u32 = 0x2008_0522;
const LINUX_CAPABILITY_U32S_3: usize = 2;

#[repr(C)]
struct CapUserHeader {
    version: u32,
    pid: libc::c_int,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct CapUserData {
    effective: u32,
    permitted: u32,
    inheritable: u32,
}

type CapData = [CapUserData; LINUX_CAPABILITY_U32S_3];

fn header() -> CapUserHeader {
    CapUserHeader {
        version: LINUX_CAPABILITY_VERSION_3,
        pid: 0,
    }
}

fn to_sets(data: &CapData) -> CapabilitySets {
    let word = |f: fn(&CapUserData) -> u32| CapSet::from_words([f(&data[0]), f(&data[1])]);
    CapabilitySets {
        effective: word(|d| d.effective),
        permitted: word(|d| d.permitted),
        inheritable: word(|d| d.inheritable),
    }
}

fn to_data(sets: &CapabilitySets) -> CapData {
    let mut data = CapData::default();
    for (i, slot) in data.iter_mut().enumerate() {
        slot.effective = sets.effective.words()[i];
        slot.permitted = sets.permitted.words()[i];
        slot.inheritable = sets.inheritable.words()[i];
    }
    data
}

/// Read the calling thread's effective, permitted and inheritable sets
pub fn capget() -> nix::Result<CapabilitySets> {
    let mut hdr = header();
    let mut data = CapData::default();

    let ret = unsafe {
        libc::syscall(
            libc::SYS_capget,
            &mut hdr as *mut CapUserHeader,
            data.as_mut_ptr(),
        )
    };
    Errno::result(ret)?;

    Ok(to_sets(&data))
}

/// Replace the calling thread's effective, permitted and inheritable sets
pub fn capset(sets: &CapabilitySets) -> nix::Result<()> {
    let mut hdr = header();
    let data = to_data(sets);

    let ret = unsafe {
        libc::syscall(
            libc::SYS_capset,
            &mut hdr as *mut CapUserHeader,
            data.as_ptr(),
        )
    };
    Errno::result(ret).map(drop)
}

/// Drop one bit from the bounding set.
///
/// Fails with `EINVAL` for bit positions the kernel does not allocate and
/// `EPERM` without `CAP_SETPCAP`.
pub fn bounding_drop(bit: u8) -> nix::Result<()> {
    let ret = unsafe { libc::prctl(libc::PR_CAPBSET_DROP, libc::c_ulong::from(bit), 0, 0, 0) };
    Errno::result(ret).map(drop)
}

/// Whether a bit is still in the bounding set
pub fn bounding_contains(bit: u8) -> nix::Result<bool> {
    let ret = unsafe { libc::prctl(libc::PR_CAPBSET_READ, libc::c_ulong::from(bit), 0, 0, 0) };
    Errno::result(ret).map(|v| v == 1)
}

/// Snapshot of the bounding set over every bit the kernel allocates
pub fn bounding_set() -> CapSet {
    (0..Capability::MAX_BITS)
        .filter(|&bit| bounding_contains(bit).unwrap_or(false))
        .fold(CapSet::EMPTY, |set, bit| {
            CapSet::from_bits(set.bits() | (1u64 << bit))
        })
}
