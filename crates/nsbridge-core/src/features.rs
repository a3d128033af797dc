//! Runtime detection of kernel isolation features
//!
//! Probes the running kernel and process so the control tool can report
//! which isolation steps are expected to work before attempting them.

use std::fs;

/// Identity mapping of the initial user namespace
const INITIAL_UID_MAP: &str = "0 0 4294967295";

/// Detected isolation features of the running system
#[derive(Debug, Clone)]
pub struct SystemFeatures {
    /// Running with effective UID 0
    pub has_root: bool,
    /// Unprivileged user namespaces can be created
    pub has_user_namespaces: bool,
    /// Seccomp BPF filtering is available
    pub has_seccomp: bool,
    /// close_range(2) is implemented
    pub has_close_range: bool,
    /// The process lives in the initial user namespace
    pub in_initial_user_namespace: bool,
}

impl SystemFeatures {
    /// Detect all features on the current system
    pub fn detect() -> Self {
        Self {
            has_root: detect_root(),
            has_user_namespaces: detect_user_namespaces(),
            has_seccomp: detect_seccomp(),
            has_close_range: detect_close_range(),
            in_initial_user_namespace: in_initial_user_namespace(),
        }
    }

    /// Get a human-readable summary of features
    pub fn summary(&self) -> String {
        let check = |available: bool| if available { "[ok]" } else { "[--]" };

        [
            format!("{} Root privileges", check(self.has_root)),
            format!("{} User namespaces", check(self.has_user_namespaces)),
            format!("{} Seccomp BPF", check(self.has_seccomp)),
            format!("{} close_range()", check(self.has_close_range)),
            format!(
                "{} Initial user namespace",
                check(self.in_initial_user_namespace)
            ),
        ]
        .join("\n")
    }
}

/// Whether the calling process is in the initial user namespace.
///
/// The initial namespace maps the whole 32-bit ID range onto itself.
pub fn in_initial_user_namespace() -> bool {
    match fs::read_to_string("/proc/self/uid_map") {
        Ok(map) => is_identity_map(&map),
        // Without procfs we cannot tell; assume the common case
        Err(_) => true,
    }
}

fn is_identity_map(map: &str) -> bool {
    let lines: Vec<&str> = map.lines().collect();
    if lines.len() != 1 {
        return false;
    }
    let fields: Vec<&str> = lines[0].split_whitespace().collect();
    fields.join(" ") == INITIAL_UID_MAP
}

fn detect_root() -> bool {
    nix::unistd::geteuid().is_root()
}

fn detect_user_namespaces() -> bool {
    if let Ok(content) = fs::read_to_string("/proc/sys/kernel/unprivileged_userns_clone")
        && content.trim() == "0"
    {
        return false;
    }

    if let Ok(content) = fs::read_to_string("/proc/sys/user/max_user_namespaces")
        && let Ok(max) = content.trim().parse::<u64>()
    {
        return max > 0;
    }

    true
}

fn detect_seccomp() -> bool {
    // -1 with EINVAL if seccomp is not built into the kernel
    let ret = unsafe { libc::prctl(libc::PR_GET_SECCOMP, 0, 0, 0, 0) };
    ret >= 0
}

fn detect_close_range() -> bool {
    // An empty range with first > last is rejected with EINVAL when the
    // syscall exists, ENOSYS otherwise. Nothing gets closed either way.
    let ret = unsafe { libc::syscall(libc::SYS_close_range, 1u32, 0u32, 0u32) };
    ret == 0 || std::io::Error::last_os_error().raw_os_error() != Some(libc::ENOSYS)
}
