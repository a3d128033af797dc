//! Operating mode of the daemon

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Which transport the daemon bridges to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Socket transport to a VM, UNIX domain socket front end
    #[default]
    Passt,
    /// Tap device inside a network namespace
    Pasta,
    /// vhost-user backend on a UNIX domain socket
    VhostUser,
}

impl Mode {
    pub fn all() -> [Mode; 3] {
        [Mode::Passt, Mode::Pasta, Mode::VhostUser]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Passt => "passt",
            Mode::Pasta => "pasta",
            Mode::VhostUser => "vhost-user",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Mode::Passt => "VM transport over a UNIX domain socket",
            Mode::Pasta => "tap device in a network namespace",
            Mode::VhostUser => "vhost-user backend with shared memory rings",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "passt" => Ok(Mode::Passt),
            "pasta" => Ok(Mode::Pasta),
            "vhost-user" | "vu" => Ok(Mode::VhostUser),
            other => Err(format!("Unknown mode: {}", other)),
        }
    }
}

/// Mode plus the flags that change how strict isolation must be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperatingMode {
    pub mode: Mode,
    /// Only join an existing network namespace, no user namespace of our own
    pub netns_only: bool,
}

impl OperatingMode {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            netns_only: false,
        }
    }

    pub fn netns_only(mut self, netns_only: bool) -> Self {
        self.netns_only = netns_only;
        self
    }

    /// Restricted modes never own a user namespace where CAP_SETPCAP is
    /// held, so shrinking the bounding set is best effort there.
    pub fn is_restricted(&self) -> bool {
        self.netns_only || self.mode != Mode::Pasta
    }

    pub fn is_pasta(&self) -> bool {
        self.mode == Mode::Pasta
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.netns_only {
            write!(f, "{} (netns only)", self.mode)
        } else {
            write!(f, "{}", self.mode)
        }
    }
}
