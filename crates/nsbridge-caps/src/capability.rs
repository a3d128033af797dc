//! Capability numbers and masks

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

macro_rules! capabilities {
    ($($variant:ident = $bit:literal => $name:literal,)+) => {
        /// A Linux capability, numbered as in `linux/capability.h`
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Capability {
            $($variant = $bit,)+
        }

        impl Capability {
            /// Every capability known to this build, in bit order
            pub const ALL: &'static [Capability] = &[$(Capability::$variant,)+];

            pub fn name(&self) -> &'static str {
                match self {
                    $(Capability::$variant => $name,)+
                }
            }

            pub fn from_bit(bit: u8) -> Option<Self> {
                match bit {
                    $($bit => Some(Capability::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

capabilities! {
    Chown = 0 => "CAP_CHOWN",
    DacOverride = 1 => "CAP_DAC_OVERRIDE",
    DacReadSearch = 2 => "CAP_DAC_READ_SEARCH",
    Fowner = 3 => "CAP_FOWNER",
    Fsetid = 4 => "CAP_FSETID",
    Kill = 5 => "CAP_KILL",
    Setgid = 6 => "CAP_SETGID",
    Setuid = 7 => "CAP_SETUID",
    Setpcap = 8 => "CAP_SETPCAP",
    LinuxImmutable = 9 => "CAP_LINUX_IMMUTABLE",
    NetBindService = 10 => "CAP_NET_BIND_SERVICE",
    NetBroadcast = 11 => "CAP_NET_BROADCAST",
    NetAdmin = 12 => "CAP_NET_ADMIN",
    NetRaw = 13 => "CAP_NET_RAW",
    IpcLock = 14 => "CAP_IPC_LOCK",
    IpcOwner = 15 => "CAP_IPC_OWNER",
    SysModule = 16 => "CAP_SYS_MODULE",
    SysRawio = 17 => "CAP_SYS_RAWIO",
    SysChroot = 18 => "CAP_SYS_CHROOT",
    SysPtrace = 19 => "CAP_SYS_PTRACE",
    SysPacct = 20 => "CAP_SYS_PACCT",
    SysAdmin = 21 => "CAP_SYS_ADMIN",
    SysBoot = 22 => "CAP_SYS_BOOT",
    SysNice = 23 => "CAP_SYS_NICE",
    SysResource = 24 => "CAP_SYS_RESOURCE",
    SysTime = 25 => "CAP_SYS_TIME",
    SysTtyConfig = 26 => "CAP_SYS_TTY_CONFIG",
    Mknod = 27 => "CAP_MKNOD",
    Lease = 28 => "CAP_LEASE",
    AuditWrite = 29 => "CAP_AUDIT_WRITE",
    AuditControl = 30 => "CAP_AUDIT_CONTROL",
    Setfcap = 31 => "CAP_SETFCAP",
    MacOverride = 32 => "CAP_MAC_OVERRIDE",
    MacAdmin = 33 => "CAP_MAC_ADMIN",
    Syslog = 34 => "CAP_SYSLOG",
    WakeAlarm = 35 => "CAP_WAKE_ALARM",
    BlockSuspend = 36 => "CAP_BLOCK_SUSPEND",
    AuditRead = 37 => "CAP_AUDIT_READ",
    Perfmon = 38 => "CAP_PERFMON",
    Bpf = 39 => "CAP_BPF",
    CheckpointRestore = 40 => "CAP_CHECKPOINT_RESTORE",
}

impl Capability {
    /// Highest bit position a capability mask can hold
    pub const MAX_BITS: u8 = 64;

    pub fn bit(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A 64-bit capability mask, as exchanged with the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapSet(u64);

impl CapSet {
    pub const EMPTY: CapSet = CapSet(0);
    pub const FULL: CapSet = CapSet(u64::MAX);

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub fn of(caps: &[Capability]) -> Self {
        caps.iter().fold(Self::EMPTY, |set, &cap| set.with(cap))
    }

    pub const fn with(self, cap: Capability) -> Self {
        Self(self.0 | (1u64 << cap as u8))
    }

    pub const fn without(self, cap: Capability) -> Self {
        Self(self.0 & !(1u64 << cap as u8))
    }

    pub const fn contains(self, cap: Capability) -> bool {
        self.0 & (1u64 << cap as u8) != 0
    }

    pub const fn contains_bit(self, bit: u8) -> bool {
        bit < Capability::MAX_BITS && self.0 & (1u64 << bit) != 0
    }

    /// Whether every capability in `self` is also in `other`
    pub const fn is_subset_of(self, other: CapSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Low and high 32-bit words, in kernel `cap_user_data_t` order
    pub const fn words(self) -> [u32; 2] {
        [self.0 as u32, (self.0 >> 32) as u32]
    }

    pub const fn from_words(words: [u32; 2]) -> Self {
        Self(words[0] as u64 | (words[1] as u64) << 32)
    }

    /// Known capabilities present in the set
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .iter()
            .copied()
            .filter(move |&cap| self.contains(cap))
    }
}

impl BitAnd for CapSet {
    type Output = CapSet;

    fn bitand(self, rhs: CapSet) -> CapSet {
        CapSet(self.0 & rhs.0)
    }
}

impl BitOr for CapSet {
    type Output = CapSet;

    fn bitor(self, rhs: CapSet) -> CapSet {
        CapSet(self.0 | rhs.0)
    }
}

impl Not for CapSet {
    type Output = CapSet;

    fn not(self) -> CapSet {
        CapSet(!self.0)
    }
}

impl fmt::Display for CapSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        let names: Vec<&str> = self.iter().map(|cap| cap.name()).collect();
        let unknown = self.0 & !CapSet::of(Capability::ALL).0;
        if unknown != 0 {
            write!(f, "{} +{:#x}", names.join(","), unknown)
        } else {
            f.write_str(&names.join(","))
        }
    }
}

/// The per-thread sets read and written by `capget(2)`/`capset(2)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySets {
    pub effective: CapSet,
    pub permitted: CapSet,
    pub inheritable: CapSet,
}

impl CapabilitySets {
    /// Keep only `keep` in the effective and permitted sets
    pub fn restrict_ep(self, keep: CapSet) -> Self {
        Self {
            effective: self.effective & keep,
            permitted: self.permitted & keep,
            inheritable: self.inheritable,
        }
    }

    pub fn clear_inheritable(self) -> Self {
        Self {
            inheritable: CapSet::EMPTY,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_matches_kernel() {
        assert_eq!(Capability::Setuid.bit(), 7);
        assert_eq!(Capability::NetBindService.bit(), 10);
        assert_eq!(Capability::SysAdmin.bit(), 21);
        assert_eq!(Capability::Setfcap.bit(), 31);
        assert_eq!(Capability::ALL.len(), 41);
    }

    #[test]
    fn from_bit_round_trip() {
        for &cap in Capability::ALL {
            assert_eq!(Capability::from_bit(cap.bit()), Some(cap));
        }
        assert_eq!(Capability::from_bit(63), None);
    }

    #[test]
    fn set_operations() {
        let set = CapSet::of(&[Capability::Setuid, Capability::Setgid]);
        assert!(set.contains(Capability::Setuid));
        assert!(!set.contains(Capability::SysAdmin));
        assert_eq!(set.without(Capability::Setuid), CapSet::of(&[Capability::Setgid]));
        assert!(set.is_subset_of(set.with(Capability::NetAdmin)));
        assert!(!set.with(Capability::NetAdmin).is_subset_of(set));
        assert!((set & !set).is_empty());
    }

    #[test]
    fn words_split_at_32() {
        let set = CapSet::of(&[Capability::Chown, Capability::MacOverride]);
        assert_eq!(set.words(), [1, 1]);
        assert_eq!(CapSet::from_words(set.words()), set);
    }

    #[test]
    fn high_bits_are_addressable() {
        assert!(CapSet::FULL.contains_bit(63));
        assert!(!CapSet::FULL.contains_bit(64));
    }

    #[test]
    fn display_lists_names() {
        let set = CapSet::of(&[Capability::NetAdmin, Capability::Setuid]);
        assert_eq!(set.to_string(), "CAP_SETUID,CAP_NET_ADMIN");
        assert_eq!(CapSet::EMPTY.to_string(), "(none)");
        assert!(CapSet::from_bits(1 << 50).to_string().contains("0x4"));
    }

    #[test]
    fn restrict_ep_leaves_inheritable() {
        let sets = CapabilitySets {
            effective: CapSet::FULL,
            permitted: CapSet::FULL,
            inheritable: CapSet::of(&[Capability::Kill]),
        };
        let keep = CapSet::of(&[Capability::SysAdmin]);
        let narrowed = sets.restrict_ep(keep);
        assert_eq!(narrowed.effective, keep);
        assert_eq!(narrowed.permitted, keep);
        assert_eq!(narrowed.inheritable, sets.inheritable);
        assert!(narrowed.clear_inheritable().inheritable.is_empty());
    }
}
