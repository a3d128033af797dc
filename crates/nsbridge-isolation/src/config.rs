//! Isolation configuration loaded from JSON

use crate::lifecycle::{IsolationContext, UserTarget};
use nsbridge_core::{IsolationError, Mode, OperatingMode, Result};
use nsbridge_namespace::EmptyRoot;
use serde::Deserialize;
use std::fs;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

/// Everything the four stages need to know about the daemon's setup
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IsolationConfig {
    /// Target UID, defaults to the real UID
    pub uid: Option<u32>,
    /// Target GID, defaults to the real GID
    pub gid: Option<u32>,
    /// User namespace to join, e.g. /proc/<pid>/ns/user
    pub userns: Option<PathBuf>,
    /// Create a user namespace when none is given to join. Unless set,
    /// one is created whenever the daemon isn't limited to an existing
    /// network namespace.
    pub use_userns: Option<bool>,
    pub mode: Mode,
    /// pasta only: operate on an existing network namespace
    pub netns_only: bool,
    pub foreground: bool,
    /// Directory the empty root is mounted over
    pub scratch_dir: PathBuf,
    /// Descriptor kept open by the initial descriptor sweep
    pub fd: Option<RawFd>,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            uid: None,
            gid: None,
            userns: None,
            use_userns: None,
            mode: Mode::default(),
            netns_only: false,
            foreground: false,
            scratch_dir: PathBuf::from(EmptyRoot::DEFAULT_SCRATCH),
            fd: None,
        }
    }
}

impl IsolationConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| IsolationError::InvalidConfig(format!("Couldn't parse JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            IsolationError::InvalidConfig(format!("Couldn't read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.netns_only && self.mode != Mode::Pasta {
            return Err(IsolationError::InvalidConfig(format!(
                "netns_only only applies to pasta, not {}",
                self.mode
            )));
        }
        if let Some(fd) = self.fd
            && fd < 0
        {
            return Err(IsolationError::InvalidConfig(format!("Invalid fd: {}", fd)));
        }
        if !self.scratch_dir.is_absolute() {
            return Err(IsolationError::InvalidConfig(format!(
                "Scratch directory must be absolute: {}",
                self.scratch_dir.display()
            )));
        }
        Ok(())
    }

    pub fn operating_mode(&self) -> OperatingMode {
        OperatingMode::new(self.mode).netns_only(self.netns_only)
    }

    pub fn use_userns(&self) -> bool {
        self.use_userns.unwrap_or(!self.netns_only)
    }

    /// Arguments the initial descriptor sweep looks at
    pub fn startup_args(&self) -> Vec<String> {
        match self.fd {
            Some(fd) => vec!["--fd".to_string(), fd.to_string()],
            None => Vec::new(),
        }
    }

    /// Identity to switch to, falling back to the given real IDs
    pub fn user_target(&self, real_uid: u32, real_gid: u32) -> UserTarget {
        UserTarget {
            uid: self.uid.unwrap_or(real_uid),
            gid: self.gid.unwrap_or(real_gid),
            use_userns: self.use_userns(),
            userns: self.userns.clone(),
            mode: self.operating_mode(),
        }
    }

    pub fn context(&self) -> IsolationContext {
        IsolationContext::new(self.operating_mode())
            .foreground(self.foreground)
            .scratch(&self.scratch_dir)
    }
}
