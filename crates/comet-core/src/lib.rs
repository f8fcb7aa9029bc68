//! Comet Core
//!
//! This crate contains the module-level plumbing shared by every comet crate:
//! the identity of the executing module, logging bootstrap and runtime
//! configuration.

pub mod alloc;
pub mod config;
pub mod logging;
pub mod module;

pub use module::ModuleId;
