//! Seccomp BPF filter compilation and loading using seccompiler

use crate::profile::SeccompFilter;
use crate::syscall_table::{equivalent_syscall, get_syscall_number_from_name};
use log::debug;
use nsbridge_core::{IsolationError, Result};
use seccompiler::{BpfProgram, SeccompAction, SeccompFilter as SeccompilerFilter, TargetArch, apply_filter};
use std::collections::BTreeMap;
use std::convert::TryInto;

/// Seccomp BPF filter compiler and loader
pub struct SeccompBpf;

impl SeccompBpf {
    /// Number of BPF instructions the filter compiles to
    pub fn instruction_count(filter: &SeccompFilter) -> Result<usize> {
        Ok(Self::compile_to_bpf(filter)?.len())
    }

    fn target_arch() -> Result<TargetArch> {
        std::env::consts::ARCH.try_into().map_err(|e| {
            IsolationError::FeatureNotAvailable(format!(
                "seccomp filters on {}: {}",
                std::env::consts::ARCH,
                e
            ))
        })
    }

    /// Resolve allowed names to numbers. A name the architecture lacks is
    /// skipped when an equivalent covers it, and rejected otherwise.
    fn syscall_rules(filter: &SeccompFilter) -> Result<BTreeMap<i64, Vec<seccompiler::SeccompRule>>> {
        let mut rules: BTreeMap<i64, Vec<seccompiler::SeccompRule>> = BTreeMap::new();

        for syscall_name in filter.export() {
            match get_syscall_number_from_name(&syscall_name) {
                Some(num) => {
                    rules.entry(num).or_default();
                }
                None => match equivalent_syscall(&syscall_name) {
                    Some(other) if get_syscall_number_from_name(other).is_some() => {
                        debug!("{} not on this architecture, covered by {}", syscall_name, other);
                    }
                    _ => {
                        return Err(IsolationError::Seccomp(format!(
                            "Unknown syscall to allow: '{}'. This syscall is not supported on this architecture.",
                            syscall_name
                        )));
                    }
                },
            }
        }

        Ok(rules)
    }

    /// Compile filter to BpfProgram with validation
    fn compile_to_bpf(filter: &SeccompFilter) -> Result<BpfProgram> {
        filter.validate()?;

        let rules = Self::syscall_rules(filter)?;

        let seccompiler_filter = SeccompilerFilter::new(
            rules,
            SeccompAction::KillProcess,
            SeccompAction::Allow,
            Self::target_arch()?,
        )
                .map_err(|e| IsolationError::Seccomp(format!("Failed to create filter: {}", e)))?;

        let bpf_program: BpfProgram = seccompiler_filter
            .try_into()
            .map_err(|e| IsolationError::Seccomp(format!("Failed to compile filter: {}", e)))?;

        Ok(bpf_program)
    }

    /// Set `PR_SET_NO_NEW_PRIVS` and install the filter on the calling
    /// thread. Irreversible.
    ///
    /// The filter is compiled before anything is changed, so a compile
    /// error leaves the process as it was.
    pub fn load(filter: &SeccompFilter) -> Result<()> {
        let bpf_program = Self::compile_to_bpf(filter)?;

        unsafe {
            if libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) != 0 {
                return Err(IsolationError::last_os_error(
                    "Failed to set PR_SET_NO_NEW_PRIVS",
                ));
            }
        }

        apply_filter(&bpf_program)
            .map_err(|e| IsolationError::Seccomp(format!("Failed to apply seccomp filter: {}", e)))?;

        Ok(())
    }
}
