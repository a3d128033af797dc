//! nsbridge-seccomp: runtime syscall filtering for the isolated daemon
//!
//! After the last isolation stage the daemon may only issue the syscalls
//! its data path needs. Each operating mode has its own allow-list; any
//! other syscall kills the process. Loading a filter does NOT require
//! root, only `PR_SET_NO_NEW_PRIVS`.

pub mod bpf;
pub mod profile;
pub mod syscall_table;

pub use bpf::SeccompBpf;
pub use profile::{SeccompFilter, SeccompProfile};
