//! nsbridge-isolation: staged self-isolation of a privileged daemon
//!
//! The daemon starts with more privilege than its data path needs and
//! sheds it in four irreversible stages around its own setup and
//! daemonization. Each stage narrows the privilege surface; none widens
//! it. All kernel access goes through the [`Kernel`] trait so the whole
//! sequence can also run against [`SimulatedKernel`].
//!
//! ```no_run
//! use nsbridge_isolation::{IsolationConfig, Isolation, LinuxKernel, OrDie};
//!
//! let config = IsolationConfig::default();
//! let args: Vec<String> = std::env::args().skip(1).collect();
//! let mut isolation = Isolation::new(LinuxKernel::new());
//!
//! isolation.initial(&args).or_die();
//! // ... parse configuration, open sockets ...
//! isolation.user(&config.user_target(1000, 1000)).or_die();
//! // ... remaining setup ...
//! let ctx = config.context();
//! isolation.prefork(&ctx).or_die();
//! // ... daemonize ...
//! isolation.postfork(&ctx).or_die();
//! ```

pub mod caps;
pub mod config;
pub mod coredump;
pub mod fatal;
pub mod fds;
pub mod kernel;
pub mod lifecycle;
pub mod linux;
pub mod policy;
pub mod simulation;
pub mod state;

pub use caps::{clamp_bounding_and_inheritable, drop_effective_permitted};
pub use config::IsolationConfig;
pub use fatal::{OrDie, die};
pub use kernel::Kernel;
pub use lifecycle::{Isolation, IsolationContext, UserTarget};
pub use linux::LinuxKernel;
pub use simulation::{KernelCall, KernelOp, SimulatedKernel};
pub use state::{PrivilegeState, Stage, UserNamespace};
