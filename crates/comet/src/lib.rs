//! Comet - reference-counted handles to plugin components
//!
//! Components are created in one module (the host or a plugin) and used
//! from others through capability traits. Comet provides the two handle types
//! that own references to them:
//!
//! - [`TypedHandle<C>`]: a counted reference to one capability `C` of a
//!   component, e.g. `TypedHandle<dyn Render>`
//! - [`UntypedHandle`]: a counted reference to the component's lifecycle view
//!   only, for storage and transport
//!
//! # Quick Start
//!
//! ```
//! use comet::prelude::*;
//!
//! trait Counter: Object {
//!     fn value(&self) -> u32;
//! }
//!
//! trait Reset: Object {}
//!
//! struct Fixed {
//!     refs: RefCount,
//! }
//!
//! impl Class for Fixed {
//!     fn refs(&self) -> &RefCount {
//!         &self.refs
//!     }
//!
//!     fn capabilities<'a>(&'a self, query: &mut CapabilityQuery<'a>) {
//!         query.provide::<dyn Counter>(self);
//!     }
//! }
//!
//! impl Counter for Fixed {
//!     fn value(&self) -> u32 {
//!         3
//!     }
//! }
//!
//! let counter = TypedHandle::<dyn Counter>::new(Fixed { refs: RefCount::new() });
//! assert_eq!(counter.value(), 3);
//!
//! // Narrowing to a capability the component lacks yields a null handle.
//! let reset = TypedHandle::<dyn Reset>::narrow(&counter);
//! assert!(reset.is_null());
//! assert_eq!(counter.ref_count(), 1);
//! ```
//!
//! # Architecture
//!
//! - [`object`]: the lifecycle capability ([`Object`]), components ([`Class`]),
//!   the embedded [`RefCount`] and runtime capability queries
//! - [`factory`]: the [`Factory`] boundary that turns a [`ClassId`] into an
//!   [`Instance`]
//! - [`typed`] / [`untyped`]: the handles
//!
//! Every reference operation carries the calling module's
//! [`ModuleId`](comet_core::ModuleId). A component's last release runs the
//! deleter captured by the module that allocated it, so memory is always freed
//! by the allocator that produced it.

mod cast;
pub mod class;
pub mod error;
pub mod factory;
pub mod object;
pub mod typed;
pub mod untyped;

pub use class::ClassId;
pub use comet_core::ModuleId;
pub use error::{CreateError, HandleError, HandleResult};
pub use factory::{FnFactory, Factory, create_object, install_factory, installed_factory};
pub use object::{
    AsObject, CapabilityQuery, Class, Deleter, Instance, Object, RefCount, Released, query,
};
pub use typed::TypedHandle;
pub use untyped::UntypedHandle;

/// Common imports for writing and using components.
pub mod prelude {
    pub use crate::{
        CapabilityQuery, Class, ClassId, Factory, Instance, Object, RefCount, TypedHandle,
        UntypedHandle,
    };
}

static_assertions::assert_impl_all!(UntypedHandle: Send, Sync, Clone, Default);
static_assertions::assert_impl_all!(TypedHandle<dyn Object>: Send, Sync, Clone, Default);
static_assertions::assert_impl_all!(Instance: Send, Sync);
static_assertions::assert_eq_size!(UntypedHandle, std::ptr::NonNull<dyn Object>);
