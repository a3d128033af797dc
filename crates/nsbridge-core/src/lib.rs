//! nsbridge-core: shared types for the nsbridge isolation crates
//!
//! This crate provides the foundational types used by all nsbridge sub-crates:
//! - Error type and Result alias
//! - Per-call-site errno policies (which kernel failures are tolerated)
//! - Operating mode of the daemon (passt, pasta, vhost-user)
//! - Runtime detection of kernel isolation features

pub mod error;
pub mod features;
pub mod mode;
pub mod policy;

pub use error::{IsolationError, Result};
pub use features::SystemFeatures;
pub use mode::{Mode, OperatingMode};
pub use policy::{ErrnoPolicy, Outcome};
