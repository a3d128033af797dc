//! nsbridge-caps: Linux capability sets
//!
//! Typed capability numbers and 64-bit capability masks, plus thin
//! wrappers over `capget(2)`, `capset(2)` and the `PR_CAPBSET_*` prctls.
//! The wrappers return raw `nix` errors; deciding which failures are
//! acceptable is left to the caller.

pub mod capability;
pub mod sys;

pub use capability::{CapSet, Capability, CapabilitySets};
