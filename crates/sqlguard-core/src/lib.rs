//! # sqlguard-core
//!
//! Reference data for the SQL guardrails: per-role security policies and
//! the immutable registry every other component consults.
//!
//! Policies are declared in YAML (see [`config`]) or taken from the
//! built-in boardroom defaults, compiled into [`SecurityPolicy`] values, and
//! collected in a [`PolicyRegistry`] at startup.

pub mod config;
pub mod policy;
pub mod registry;

pub use config::{AuditConfig, ConfigError, GuardConfig, PolicyConfig, UpstreamConfig};
pub use policy::{PolicyOverrides, SecurityPolicy, TablePattern};
pub use registry::{PolicyRegistry, UnknownRoleError};
