//! Identity of the executing module.
//!
//! `comet-core` is an rlib, so every loadable module (the host executable and
//! each plugin cdylib) links its own copy of it and therefore gets its own
//! copy of [`MODULE_ANCHOR`]. The anchor's address is unique per loaded copy,
//! which makes it a cheap, allocation-free module identity: code compiled into
//! a plugin sees a different [`ModuleId::current`] than code compiled into the
//! host, even when both run on the same thread.
//!
//! Every reference-count increment and release performed by comet passes the
//! caller's `ModuleId`, so a component can tell when it is being released from
//! a module other than the one that allocated it.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::OnceLock;

/// Per-module anchor. Only its address is meaningful.
static MODULE_ANCHOR: u8 = 0;

/// Optional human-readable name for this module, used in log output.
static MODULE_NAME: OnceLock<&'static str> = OnceLock::new();

/// Opaque identity of a loaded module.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(NonZeroUsize);

impl ModuleId {
    /// Identity of the module whose code is currently executing.
    #[inline]
    pub fn current() -> Self {
        let addr = std::ptr::addr_of!(MODULE_ANCHOR) as usize;
        // Statics never live at address zero.
        ModuleId(NonZeroUsize::new(addr).unwrap_or(NonZeroUsize::MIN))
    }

    /// Build an identity from a host-assigned value.
    ///
    /// Hosts that track modules themselves, and tests that need to act as a
    /// foreign module, use this instead of [`ModuleId::current`].
    pub const fn from_raw(raw: NonZeroUsize) -> Self {
        ModuleId(raw)
    }

    /// The raw value of this identity.
    pub const fn get(self) -> usize {
        self.0.get()
    }

    /// Whether this is the identity of the executing module.
    #[inline]
    pub fn is_current(self) -> bool {
        self == Self::current()
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_current(), MODULE_NAME.get()) {
            (true, Some(name)) => write!(f, "ModuleId({name}@{:#x})", self.get()),
            _ => write!(f, "ModuleId({:#x})", self.get()),
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Name the executing module for diagnostics.
///
/// Returns `false` if a name was already set; the first name wins.
pub fn set_module_name(name: &'static str) -> bool {
    MODULE_NAME.set(name).is_ok()
}

/// The name given to the executing module, if any.
pub fn module_name() -> Option<&'static str> {
    MODULE_NAME.get().copied()
}

static_assertions::assert_impl_all!(ModuleId: Send, Sync, Copy);
static_assertions::assert_eq_size!(ModuleId, Option<ModuleId>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_is_stable() {
        assert_eq!(ModuleId::current(), ModuleId::current());
        assert!(ModuleId::current().is_current());
    }

    #[test]
    fn test_foreign_module_differs() {
        let foreign = ModuleId::from_raw(NonZeroUsize::new(0x1000).unwrap());
        assert_ne!(foreign, ModuleId::current());
        assert!(!foreign.is_current());
        assert_eq!(foreign.get(), 0x1000);
    }

    #[test]
    fn test_debug_format() {
        let foreign = ModuleId::from_raw(NonZeroUsize::new(0x2a).unwrap());
        assert_eq!(format!("{foreign:?}"), "ModuleId(0x2a)");
    }
}
