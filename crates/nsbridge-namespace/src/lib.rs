//! nsbridge-namespace: namespace moves used during self-isolation
//!
//! Provides namespace kinds and flag sets, joining or creating a user
//! namespace with UID/GID mappings, and reducing the mount namespace to an
//! empty read-only root.

pub mod config;
pub mod mount;
pub mod user_ns;

pub use config::{NamespaceKind, NamespaceSet, namespace_inode, shares_namespace};
pub use mount::EmptyRoot;
pub use user_ns::{create_user_namespace, join_user_namespace};
