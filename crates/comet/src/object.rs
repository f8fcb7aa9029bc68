//! The lifecycle capability every component implements.
//!
//! A component is a heap value reachable only through trait objects: its
//! lifecycle view ([`Object`]) and any number of capability views (traits that
//! extend `Object`). Components are written by implementing [`Class`], which
//! provides `Object` through a blanket impl:
//!
//! ```
//! use comet::{CapabilityQuery, Class, Object, RefCount, TypedHandle};
//!
//! trait Greeter: Object {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English {
//!     refs: RefCount,
//! }
//!
//! impl Class for English {
//!     fn refs(&self) -> &RefCount {
//!         &self.refs
//!     }
//!
//!     fn capabilities<'a>(&'a self, query: &mut CapabilityQuery<'a>) {
//!         query.provide::<dyn Greeter>(self);
//!     }
//! }
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//!
//! let greeter = TypedHandle::<dyn Greeter>::new(English { refs: RefCount::new() });
//! assert_eq!(greeter.greet(), "hello");
//! assert_eq!(greeter.ref_count(), 1);
//! ```

use std::any::{Any, type_name};
use std::fmt;
use std::mem::ManuallyDrop;
use std::ptr::{self, NonNull};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering, fence};

use comet_core::ModuleId;
use tracing::{debug, error, trace};

use crate::cast;

/// Saturation point for the reference count. Reaching it means handles are
/// being leaked in a loop.
const MAX_REFCOUNT: u32 = u32::MAX / 2;

/// Access to the lifecycle view of a component from any of its capability views.
///
/// Implemented for every [`Class`]; capability trait objects inherit it
/// through `Object`.
pub trait AsObject {
    fn as_object(&self) -> &(dyn Object + 'static);
}

impl<T: Class> AsObject for T {
    fn as_object(&self) -> &(dyn Object + 'static) {
        self
    }
}

/// The lifecycle capability: reference counting and capability discovery.
///
/// Capability traits extend this trait (`trait Render: Object { .. }`), so
/// every capability pointer can be turned back into its lifecycle view.
pub trait Object: AsObject + Send + Sync + 'static {
    /// Adds a reference on behalf of `caller` and returns the new count.
    fn add_ref(&self, caller: ModuleId) -> u32;

    /// Drops a reference on behalf of `caller`.
    ///
    /// When this was the last reference the component hands back the
    /// [`Deleter`] captured by the module that allocated it; the caller must
    /// run it once this call has returned.
    ///
    /// # Safety
    ///
    /// The caller must own one of the component's references and must not use
    /// it after this call.
    unsafe fn release(&self, caller: ModuleId) -> Released;

    /// Offers every capability this component implements to `query`.
    fn query_capability<'a>(&'a self, query: &mut CapabilityQuery<'a>);

    /// The reference count this component is counted on. Its address
    /// identifies the component.
    fn counter(&self) -> &RefCount;

    /// Number of outstanding references, for diagnostics.
    fn ref_count(&self) -> u32;

    /// Human-readable name of the concrete component type.
    fn class_name(&self) -> &'static str;
}

/// A concrete component type.
///
/// Implementors embed a [`RefCount`] and list their capabilities; the
/// [`Object`] implementation is derived from that.
pub trait Class: Send + Sync + Sized + 'static {
    /// The embedded reference count.
    ///
    /// Must return a field of `self`. [`Instance::new`] panics otherwise.
    fn refs(&self) -> &RefCount;

    /// Offers this component's capabilities to `query`.
    ///
    /// `dyn Object` is always provided and does not need to be listed. Only
    /// `self` may be provided: a capability implemented by a field or any
    /// other object is ignored by [`query`].
    #[allow(unused_variables)]
    fn capabilities<'a>(&'a self, query: &mut CapabilityQuery<'a>) {}
}

impl<T: Class> Object for T {
    fn add_ref(&self, caller: ModuleId) -> u32 {
        self.refs().increment(caller)
    }

    unsafe fn release(&self, caller: ModuleId) -> Released {
        // SAFETY: forwarded from the caller.
        unsafe { self.refs().decrement(caller) }
    }

    fn query_capability<'a>(&'a self, query: &mut CapabilityQuery<'a>) {
        query.provide::<dyn Object>(self);
        self.capabilities(query);
    }

    fn counter(&self) -> &RefCount {
        self.refs()
    }

    fn ref_count(&self) -> u32 {
        self.refs().count()
    }

    fn class_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Runtime capability lookup.
///
/// The query carries a type-erased `Option<NonNull<C>>` slot; [`provide`]
/// fills it when `C` matches the requested capability and ignores every
/// other capability. `'a` is the borrow of the component being queried.
///
/// [`provide`]: CapabilityQuery::provide
pub struct CapabilityQuery<'a> {
    slot: &'a mut dyn Any,
    requested: &'static str,
}

impl<'a> CapabilityQuery<'a> {
    fn new<C: ?Sized + 'static>(slot: &'a mut Option<NonNull<C>>) -> Self {
        Self {
            slot,
            requested: type_name::<C>(),
        }
    }

    /// Offers `capability` as the `C` view of the component.
    pub fn provide<C: ?Sized + 'static>(&mut self, capability: &'a C) -> &mut Self {
        if let Some(slot) = self.slot.downcast_mut::<Option<NonNull<C>>>() {
            if slot.is_none() {
                *slot = Some(NonNull::from(capability));
            }
        }
        self
    }

    /// Type name of the capability being looked up.
    pub fn requested(&self) -> &'static str {
        self.requested
    }
}

/// Looks up the `C` view of `object`.
///
/// Returns `None` when the component does not implement `C`; that is an
/// expected outcome, not an error. A capability provided by anything other
/// than the component itself is rejected the same way, so the returned view
/// always maps back to `object`. The pointer is valid for as long as a
/// reference to the component is held.
pub fn query<C: ?Sized + Object>(object: &dyn Object) -> Option<NonNull<C>> {
    let mut slot: Option<NonNull<C>> = None;
    let requested = {
        let mut request = CapabilityQuery::new(&mut slot);
        object.query_capability(&mut request);
        request.requested()
    };
    let capability = slot?;

    // SAFETY: the capability was provided from a borrow of `object`.
    let owner = unsafe { capability.as_ref() }.as_object();
    if ptr::addr_eq(owner, object) && ptr::eq(owner.counter(), object.counter()) {
        Some(capability)
    } else {
        debug!(
            class = object.class_name(),
            capability = requested,
            provider = owner.class_name(),
            "capability is provided by another object, ignoring it"
        );
        None
    }
}

/// Outcome of [`Object::release`].
#[must_use = "the deleter of a released component has to be run"]
#[derive(Debug)]
pub enum Released {
    /// Other references remain.
    Live(u32),
    /// That was the last reference; run the deleter to destroy the component.
    Last(Deleter),
}

impl Released {
    /// References left after the release.
    pub fn remaining(&self) -> u32 {
        match self {
            Released::Live(remaining) => *remaining,
            Released::Last(_) => 0,
        }
    }
}

/// Destroys a component through the code of the module that allocated it.
#[must_use = "dropping a deleter without running it leaks the component"]
pub struct Deleter {
    target: NonNull<()>,
    delete: unsafe fn(NonNull<()>),
    home: ModuleId,
}

impl Deleter {
    /// The module that allocated the component.
    pub fn home(&self) -> ModuleId {
        self.home
    }

    /// Destroys and deallocates the component.
    ///
    /// # Safety
    ///
    /// Must be called at most once, after the `release` call that produced it
    /// has returned and with no other borrow of the component alive.
    pub unsafe fn run(self) {
        // SAFETY: `delete` was instantiated for the concrete type behind
        // `target` when the component was boxed.
        unsafe { (self.delete)(self.target) }
    }
}

impl fmt::Debug for Deleter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deleter")
            .field("target", &self.target)
            .field("home", &self.home)
            .finish()
    }
}

/// Where a component came from and how to free it.
#[derive(Clone, Copy)]
struct Origin {
    home: ModuleId,
    target: NonNull<()>,
    delete: unsafe fn(NonNull<()>),
}

// SAFETY: `target` is only dereferenced by the deleter, which runs once the
// count has reached zero.
unsafe impl Send for Origin {}
unsafe impl Sync for Origin {}

unsafe fn delete_boxed<T>(target: NonNull<()>) {
    // SAFETY: `target` came from `Box::<T>::leak` in `Instance::new`.
    drop(unsafe { Box::from_raw(target.cast::<T>().as_ptr()) });
}

/// Atomic reference count embedded in every component.
///
/// The count starts at zero and becomes live when the component is boxed by
/// [`Instance::new`], which also records the allocating module and the
/// matching deleter.
pub struct RefCount {
    count: AtomicU32,
    origin: OnceLock<Origin>,
}

impl RefCount {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
            origin: OnceLock::new(),
        }
    }

    /// Current number of references.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// The module that allocated the component, once it has been boxed.
    pub fn home(&self) -> Option<ModuleId> {
        self.origin.get().map(|origin| origin.home)
    }

    /// Records the allocation and takes the first reference.
    ///
    /// Fails if this count is not stored inside `*target`, or was bound
    /// before.
    ///
    /// # Safety
    ///
    /// `target` must be a leaked `Box<T>`.
    unsafe fn bind<T: Class>(&self, target: NonNull<T>, home: ModuleId) -> bool {
        let start = target.as_ptr() as usize;
        let at = ptr::from_ref(self) as usize;
        if at < start || at + size_of::<RefCount>() > start + size_of::<T>() {
            return false;
        }

        let origin = Origin {
            home,
            target: target.cast(),
            delete: delete_boxed::<T>,
        };
        if self.origin.set(origin).is_err() {
            return false;
        }
        self.count.store(1, Ordering::Release);
        true
    }

    fn increment(&self, caller: ModuleId) -> u32 {
        // Relaxed is enough: the caller already holds a reference.
        let previous = self.count.fetch_add(1, Ordering::Relaxed);
        if previous >= MAX_REFCOUNT {
            error!(count = previous, "reference count overflow, aborting");
            std::process::abort();
        }
        trace!(count = previous + 1, %caller, "add_ref");
        previous + 1
    }

    /// # Safety
    ///
    /// The caller must own one of the references being counted.
    unsafe fn decrement(&self, caller: ModuleId) -> Released {
        let previous = self.count.fetch_sub(1, Ordering::Release);
        if previous == 0 {
            self.count.fetch_add(1, Ordering::Relaxed);
            error!(%caller, "release on a component without references, ignoring");
            return Released::Live(0);
        }
        if previous > 1 {
            trace!(count = previous - 1, %caller, "release");
            return Released::Live(previous - 1);
        }

        // Synchronizes with every earlier Release decrement so the deleter
        // observes all writes made through other handles.
        fence(Ordering::Acquire);

        match self.origin.get() {
            Some(origin) => {
                if origin.home != caller {
                    debug!(
                        home = %origin.home,
                        %caller,
                        "last reference released from a foreign module, deleting through the home module"
                    );
                }
                Released::Last(Deleter {
                    target: origin.target,
                    delete: origin.delete,
                    home: origin.home,
                })
            }
            None => {
                error!(%caller, "last reference released on a component that was never boxed, leaking it");
                Released::Live(0)
            }
        }
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCount")
            .field("count", &self.count())
            .field("home", &self.home())
            .finish()
    }
}

/// A freshly created component carrying exactly one reference.
///
/// This is what a [`Factory`](crate::Factory) hands back. Converting it into a
/// handle transfers the reference; dropping it unused releases it.
pub struct Instance {
    object: NonNull<dyn Object>,
}

impl Instance {
    /// Boxes `component` in the calling module and takes its first reference.
    ///
    /// # Panics
    ///
    /// Panics if `T::refs` returns a `RefCount` that is not a field of the
    /// component, or one that already counts another component. The
    /// component is dropped first.
    pub fn new<T: Class>(component: T) -> Self {
        let raw = NonNull::from(Box::leak(Box::new(component)));
        let home = ModuleId::current();

        // SAFETY: `raw` is the box we just leaked.
        let bound = unsafe { raw.as_ref().refs().bind(raw, home) };
        if !bound {
            error!(
                class = type_name::<T>(),
                "reference count is not owned by the component"
            );
            // SAFETY: no reference was handed out, so the box is still ours.
            drop(unsafe { Box::from_raw(raw.as_ptr()) });
            panic!(
                "{}::refs must return a RefCount field of the component",
                type_name::<T>()
            );
        }

        Instance { object: raw }
    }

    /// Takes over a raw lifecycle pointer that carries one reference.
    ///
    /// # Safety
    ///
    /// `object` must point at a live component and the caller must own one of
    /// its references, which is transferred to the instance.
    pub unsafe fn from_raw(object: NonNull<dyn Object>) -> Self {
        Instance { object }
    }

    /// Gives up the reference without releasing it.
    pub fn into_raw(self) -> NonNull<dyn Object> {
        ManuallyDrop::new(self).object
    }

    pub fn as_ptr(&self) -> NonNull<dyn Object> {
        self.object
    }

    pub fn object(&self) -> &dyn Object {
        // SAFETY: the instance owns a reference.
        unsafe { self.object.as_ref() }
    }

    pub fn class_name(&self) -> &'static str {
        self.object().class_name()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // SAFETY: the instance owns exactly one reference.
        unsafe { cast::release(self.object) }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class_name())
            .field("refs", &self.object().ref_count())
            .finish()
    }
}

// SAFETY: components are `Send + Sync` and the count is atomic.
unsafe impl Send for Instance {}
unsafe impl Sync for Instance {}
