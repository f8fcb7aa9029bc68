//! Typed handles - counted references to one capability of a component.
//!
//! A `TypedHandle<dyn Render>` owns one reference to a component and exposes
//! its `Render` view. The handle keeps two views of the same component: the
//! capability view it dereferences to, and the lifecycle view ([`Object`])
//! that its reference is counted on. Both are stored as a single pair, so a
//! handle is either fully null or fully live.
//!
//! Narrowing to a capability the component lacks is not an error: the
//! resulting handle is simply null, and no reference is taken.

use std::any::type_name;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::ptr::{self, NonNull};

use tracing::debug;

use crate::cast::{self, ObjectPtr};
use crate::class::ClassId;
use crate::error::{HandleError, HandleResult};
use crate::factory::{self, Factory};
use crate::object::{Class, Instance, Object};
use crate::untyped::UntypedHandle;

/// The two views held by a live handle.
struct Held<C: ?Sized> {
    capability: NonNull<C>,
    object: ObjectPtr,
}

impl<C: ?Sized> Clone for Held<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: ?Sized> Copy for Held<C> {}

/// A counted reference to the `C` capability of a component.
///
/// `C` is a capability trait object such as `dyn Render`, where
/// `trait Render: Object`.
///
/// # Example
///
/// ```ignore
/// let renderer: TypedHandle<dyn Render> = TypedHandle::from_class(&CLSID_SPRITE);
///
/// // Ask the same component for another capability.
/// let input = TypedHandle::<dyn Input>::narrow(&renderer);
/// if input.is_not_null() {
///     input.poll();
/// }
/// ```
pub struct TypedHandle<C: ?Sized + Object> {
    held: Option<Held<C>>,
}

impl<C: ?Sized + Object> TypedHandle<C> {
    /// A handle that references nothing.
    pub const fn null() -> Self {
        Self { held: None }
    }

    /// Boxes `component` and keeps its `C` view.
    ///
    /// The handle is null, and the component destroyed, if it does not
    /// implement `C`.
    pub fn new<T: Class>(component: T) -> Self {
        Self::from_instance(Instance::new(component)).unwrap_or_else(|err| {
            debug!(%err, "component does not implement the handle's capability");
            Self::null()
        })
    }

    /// Takes over a freshly created component.
    ///
    /// If the component does not implement `C` its reference is released
    /// immediately and an error is returned.
    pub fn from_instance(instance: Instance) -> HandleResult<Self> {
        // SAFETY: the instance owns a reference, so the component is live.
        match unsafe { cast::narrow::<C>(instance.as_ptr()) } {
            Some(capability) => Ok(Self {
                held: Some(Held {
                    capability,
                    object: instance.into_raw(),
                }),
            }),
            None => Err(HandleError::narrowing::<C>(instance.class_name())),
        }
    }

    /// Wraps a raw capability pointer.
    ///
    /// With `add_ref` the handle takes a new reference; without it the caller
    /// transfers a reference it already owns.
    ///
    /// # Safety
    ///
    /// `capability` must point at a live component, and when `add_ref` is
    /// `false` the caller must own a reference that it gives up.
    pub unsafe fn from_raw(capability: NonNull<C>, add_ref: bool) -> Self {
        // SAFETY: forwarded from the caller.
        let object = unsafe { cast::object_of(capability) };
        if add_ref {
            // SAFETY: as above.
            unsafe { cast::acquire(object) };
        }
        Self {
            held: Some(Held { capability, object }),
        }
    }

    /// Wraps a raw pointer to another capability `D`, narrowing it to `C`.
    ///
    /// When the component lacks `C` the handle is null; a reference
    /// transferred with `add_ref == false` is then released so it cannot leak.
    ///
    /// # Safety
    ///
    /// Same contract as [`TypedHandle::from_raw`].
    pub unsafe fn narrow_raw<D: ?Sized + Object>(source: NonNull<D>, add_ref: bool) -> Self {
        // SAFETY: forwarded from the caller.
        let object = unsafe { cast::object_of(source) };
        match unsafe { cast::narrow::<C>(object) } {
            Some(capability) => {
                if add_ref {
                    unsafe { cast::acquire(object) };
                }
                Self {
                    held: Some(Held { capability, object }),
                }
            }
            None => {
                debug!(
                    class = unsafe { cast::class_name(object) },
                    capability = type_name::<C>(),
                    "narrowing a raw pointer failed"
                );
                if !add_ref {
                    // SAFETY: the caller transferred this reference to us.
                    unsafe { cast::release(object) };
                }
                Self::null()
            }
        }
    }

    /// A new reference to the `C` view of the component behind `source`.
    ///
    /// Null if `source` is null or its component does not implement `C`.
    pub fn narrow<D: ?Sized + Object>(source: &TypedHandle<D>) -> Self {
        Self {
            held: source.object_ptr().and_then(|object| {
                // SAFETY: `source` keeps the component alive.
                unsafe { Self::acquire_narrowed(object) }
            }),
        }
    }

    /// A new reference to the `C` view of the component behind `source`.
    pub fn from_untyped(source: &UntypedHandle) -> Self {
        Self {
            held: source.as_ptr().and_then(|object| {
                // SAFETY: `source` keeps the component alive.
                unsafe { Self::acquire_narrowed(object) }
            }),
        }
    }

    /// Creates a component through this module's installed factory.
    ///
    /// Null if creation fails or the component does not implement `C`; in
    /// the latter case the new component is destroyed again.
    pub fn from_class(class: &ClassId) -> Self {
        Self::created(factory::installed_factory(), class).unwrap_or_else(|err| {
            debug!(%class, %err, "construction by class id left the handle null");
            Self::null()
        })
    }

    /// Creates a component through `factory`. See [`TypedHandle::from_class`].
    pub fn from_class_in(factory: &dyn Factory, class: &ClassId) -> Self {
        Self::created(Some(factory), class).unwrap_or_else(|err| {
            debug!(%class, %err, "construction by class id left the handle null");
            Self::null()
        })
    }

    fn created(factory: Option<&dyn Factory>, class: &ClassId) -> HandleResult<Self> {
        let instance = factory::create_with(factory, class)?;
        Self::from_instance(instance)
    }

    /// Narrows `object` to `C` and, on success, takes a reference.
    ///
    /// # Safety
    ///
    /// `object` must point at a live component.
    unsafe fn acquire_narrowed(object: ObjectPtr) -> Option<Held<C>> {
        // SAFETY: forwarded from the caller.
        match unsafe { cast::narrow::<C>(object) } {
            Some(capability) => {
                unsafe { cast::acquire(object) };
                Some(Held { capability, object })
            }
            None => {
                debug!(
                    class = unsafe { cast::class_name(object) },
                    capability = type_name::<C>(),
                    "component does not implement the requested capability"
                );
                None
            }
        }
    }

    /// Stores `next`, which already carries its reference, then releases the
    /// previous reference.
    fn install(&mut self, next: Option<Held<C>>) {
        if let Some(previous) = std::mem::replace(&mut self.held, next) {
            // SAFETY: the handle owned this reference and no longer holds it.
            unsafe { cast::release(previous.object) };
        }
    }

    /// Makes this handle reference what `source` references.
    ///
    /// A no-op when both already reference the same component, so the count
    /// never dips while the component is in use.
    pub fn assign(&mut self, source: &Self) {
        if cast::same_component(self.object_ptr(), source.object_ptr()) {
            return;
        }
        if let Some(held) = source.held {
            // SAFETY: `source` keeps the component alive.
            unsafe { cast::acquire(held.object) };
        }
        self.install(source.held);
    }

    /// Makes this handle reference the `C` view of `source`'s component.
    ///
    /// Becomes null if that component does not implement `C`.
    pub fn assign_from<D: ?Sized + Object>(&mut self, source: &TypedHandle<D>) {
        if cast::same_component(self.object_ptr(), source.object_ptr()) {
            return;
        }
        let next = source.object_ptr().and_then(|object| {
            // SAFETY: `source` keeps the component alive.
            unsafe { Self::acquire_narrowed(object) }
        });
        self.install(next);
    }

    /// Makes this handle reference the `C` view of `source`'s component.
    pub fn assign_untyped(&mut self, source: &UntypedHandle) {
        if cast::same_component(self.object_ptr(), source.as_ptr()) {
            return;
        }
        let next = source.as_ptr().and_then(|object| {
            // SAFETY: `source` keeps the component alive.
            unsafe { Self::acquire_narrowed(object) }
        });
        self.install(next);
    }

    /// Makes this handle reference the `C` view of a raw `D` pointer, taking
    /// a new reference.
    ///
    /// # Safety
    ///
    /// `source`, if present, must point at a live component.
    pub unsafe fn assign_raw<D: ?Sized + Object>(&mut self, source: Option<NonNull<D>>) {
        // SAFETY: forwarded from the caller.
        let object = source.map(|source| unsafe { cast::object_of(source) });
        if cast::same_component(self.object_ptr(), object) {
            return;
        }
        let next = object.and_then(|object| unsafe { Self::acquire_narrowed(object) });
        self.install(next);
    }

    /// Drops the held reference, leaving the handle null.
    pub fn release(&mut self) {
        self.install(None);
    }

    /// Gives up ownership without releasing.
    ///
    /// The caller becomes responsible for the reference, typically by
    /// attaching the pointer to another handle.
    pub fn detach(&mut self) -> Option<NonNull<C>> {
        self.held.take().map(|held| held.capability)
    }

    /// Adopts a raw capability pointer whose reference the caller already
    /// owns. The previous reference is released.
    ///
    /// # Safety
    ///
    /// `capability`, if present, must point at a live component and the caller
    /// must own a reference to it that it gives up.
    pub unsafe fn attach(&mut self, capability: Option<NonNull<C>>) {
        let next = capability.map(|capability| Held {
            capability,
            // SAFETY: forwarded from the caller.
            object: unsafe { cast::object_of(capability) },
        });
        self.install(next);
    }

    /// Adopts a raw lifecycle pointer whose reference the caller already owns,
    /// narrowing it to `C`. The previous reference is released.
    ///
    /// If the component does not implement `C`, the transferred reference is
    /// released as well and the handle stays null.
    ///
    /// # Safety
    ///
    /// Same contract as [`TypedHandle::attach`].
    pub unsafe fn attach_object(&mut self, object: Option<NonNull<dyn Object>>) -> HandleResult<()> {
        self.release();

        let Some(object) = object else {
            return Ok(());
        };
        // SAFETY: forwarded from the caller.
        match unsafe { cast::narrow::<C>(object) } {
            Some(capability) => {
                self.held = Some(Held { capability, object });
                Ok(())
            }
            None => {
                let class = unsafe { cast::class_name(object) };
                // SAFETY: the caller transferred this reference to us.
                unsafe { cast::release(object) };
                Err(HandleError::narrowing::<C>(class))
            }
        }
    }

    /// Releases the current reference and creates a new component through the
    /// installed factory.
    pub fn create(&mut self, class: &ClassId) -> HandleResult<()> {
        self.create_with(factory::installed_factory(), class)
    }

    /// Releases the current reference and creates a new component through
    /// `factory`.
    pub fn create_in(&mut self, factory: &dyn Factory, class: &ClassId) -> HandleResult<()> {
        self.create_with(Some(factory), class)
    }

    fn create_with(&mut self, factory: Option<&dyn Factory>, class: &ClassId) -> HandleResult<()> {
        self.release();
        let created = Self::created(factory, class)?;
        *self = created;
        Ok(())
    }

    /// The capability, or `None` for a null handle.
    pub fn get(&self) -> Option<&C> {
        // SAFETY: the handle holds a reference, so the component is live for
        // at least as long as `self` is borrowed.
        self.held.map(|held| unsafe { held.capability.as_ref() })
    }

    /// The raw capability pointer, without transferring ownership.
    pub fn as_ptr(&self) -> Option<NonNull<C>> {
        self.held.map(|held| held.capability)
    }

    /// The lifecycle view of the component.
    pub fn object(&self) -> Option<&dyn Object> {
        // SAFETY: as in `get`.
        self.held.map(|held| unsafe { held.object.as_ref() })
    }

    pub(crate) fn object_ptr(&self) -> Option<ObjectPtr> {
        self.held.map(|held| held.object)
    }

    /// An untyped handle to the same component.
    pub fn to_untyped(&self) -> UntypedHandle {
        UntypedHandle::from_typed(self)
    }

    pub fn is_null(&self) -> bool {
        self.held.is_none()
    }

    pub fn is_not_null(&self) -> bool {
        self.held.is_some()
    }

    /// Whether this handle's capability pointer is `other`.
    pub fn ptr_eq(&self, other: *const C) -> bool {
        match self.held {
            Some(held) => ptr::addr_eq(held.capability.as_ptr(), other),
            None => other.is_null(),
        }
    }

    /// Whether both handles reference the same component, whatever
    /// capabilities they expose.
    pub fn same_component<D: ?Sized + Object>(&self, other: &TypedHandle<D>) -> bool {
        cast::same_component(self.object_ptr(), other.object_ptr())
    }

    /// Current reference count of the component, 0 for a null handle.
    pub fn ref_count(&self) -> u32 {
        self.object().map_or(0, |object| object.ref_count())
    }

    /// Type name of the component, if any.
    pub fn class_name(&self) -> Option<&'static str> {
        self.object().map(|object| object.class_name())
    }
}

impl<C: ?Sized + Object> Default for TypedHandle<C> {
    fn default() -> Self {
        Self::null()
    }
}

impl<C: ?Sized + Object> Clone for TypedHandle<C> {
    fn clone(&self) -> Self {
        if let Some(held) = self.held {
            // SAFETY: `self` keeps the component alive.
            unsafe { cast::acquire(held.object) };
        }
        Self { held: self.held }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl<C: ?Sized + Object> Drop for TypedHandle<C> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<C: ?Sized + Object> Deref for TypedHandle<C> {
    type Target = C;

    /// # Panics
    ///
    /// Panics if the handle is null; check with [`TypedHandle::is_not_null`]
    /// or use [`TypedHandle::get`].
    fn deref(&self) -> &C {
        match self.get() {
            Some(capability) => capability,
            None => panic!("dereferenced a null TypedHandle<{}>", type_name::<C>()),
        }
    }
}

impl<C: ?Sized + Object> PartialEq for TypedHandle<C> {
    fn eq(&self, other: &Self) -> bool {
        match (self.held, other.held) {
            (Some(a), Some(b)) => ptr::addr_eq(a.capability.as_ptr(), b.capability.as_ptr()),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<C: ?Sized + Object> Eq for TypedHandle<C> {}

impl<C: ?Sized + Object> Hash for TypedHandle<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.held
            .map(|held| held.capability.cast::<()>().as_ptr() as usize)
            .hash(state);
    }
}

impl<C: ?Sized + Object> From<&UntypedHandle> for TypedHandle<C> {
    fn from(source: &UntypedHandle) -> Self {
        Self::from_untyped(source)
    }
}

impl<C: ?Sized + Object> fmt::Debug for TypedHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedHandle")
            .field("capability", &type_name::<C>())
            .field("class", &self.class_name())
            .field("refs", &self.ref_count())
            .finish()
    }
}

// SAFETY: `C: Object` implies `Send + Sync`, and the count is atomic.
unsafe impl<C: ?Sized + Object> Send for TypedHandle<C> {}
unsafe impl<C: ?Sized + Object> Sync for TypedHandle<C> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{CapabilityQuery, RefCount};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Alpha: Object {
        fn alpha(&self) -> u32;
    }

    trait Beta: Object {
        fn beta(&self) -> &'static str;
    }

    trait Gamma: Object {}

    struct Pair {
        refs: RefCount,
        drops: Arc<AtomicUsize>,
    }

    impl Class for Pair {
        fn refs(&self) -> &RefCount {
            &self.refs
        }

        fn capabilities<'a>(&'a self, query: &mut CapabilityQuery<'a>) {
            query.provide::<dyn Alpha>(self).provide::<dyn Beta>(self);
        }
    }

    impl Alpha for Pair {
        fn alpha(&self) -> u32 {
            7
        }
    }

    impl Beta for Pair {
        fn beta(&self) -> &'static str {
            "beta"
        }
    }

    impl Drop for Pair {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pair() -> (TypedHandle<dyn Alpha>, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        let handle = TypedHandle::new(Pair {
            refs: RefCount::new(),
            drops: Arc::clone(&drops),
        });
        (handle, drops)
    }

    #[test]
    fn test_null_handle() {
        let handle = TypedHandle::<dyn Alpha>::null();
        assert!(handle.is_null());
        assert!(!handle.is_not_null());
        assert!(handle.get().is_none());
        assert_eq!(handle.ref_count(), 0);
        assert!(handle.ptr_eq(ptr::null::<Pair>() as *const dyn Alpha));
        assert_eq!(handle, TypedHandle::default());
    }

    #[test]
    fn test_new_and_deref() {
        let (alpha, drops) = pair();
        assert!(alpha.is_not_null());
        assert_eq!(alpha.alpha(), 7);
        assert_eq!(alpha.ref_count(), 1);

        drop(alpha);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_without_capability_destroys_component() {
        let drops = Arc::new(AtomicUsize::new(0));
        let gamma = TypedHandle::<dyn Gamma>::new(Pair {
            refs: RefCount::new(),
            drops: Arc::clone(&drops),
        });
        assert!(gamma.is_null());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "dereferenced a null TypedHandle")]
    fn test_deref_null_panics() {
        let handle = TypedHandle::<dyn Alpha>::null();
        let _ = handle.alpha();
    }

    #[test]
    fn test_clone_and_drop_track_count() {
        let (alpha, drops) = pair();
        let copy = alpha.clone();
        assert_eq!(alpha.ref_count(), 2);
        assert_eq!(alpha, copy);

        drop(copy);
        assert_eq!(alpha.ref_count(), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_narrow_success_and_failure() {
        let (alpha, _drops) = pair();

        let beta = TypedHandle::<dyn Beta>::narrow(&alpha);
        assert_eq!(beta.beta(), "beta");
        assert_eq!(alpha.ref_count(), 2);
        assert!(beta.same_component(&alpha));

        let gamma = TypedHandle::<dyn Gamma>::narrow(&alpha);
        assert!(gamma.is_null());
        assert_eq!(alpha.ref_count(), 2);
    }

    #[test]
    fn test_assign_same_component_is_noop() {
        let (mut alpha, _drops) = pair();
        let other = alpha.clone();
        assert_eq!(alpha.ref_count(), 2);

        alpha.assign(&other);
        assert_eq!(alpha.ref_count(), 2);

        alpha.clone_from(&other);
        assert_eq!(alpha.ref_count(), 2);

        let beta = TypedHandle::<dyn Beta>::narrow(&alpha);
        alpha.assign_from(&beta);
        assert_eq!(alpha.ref_count(), 3);
    }

    #[test]
    fn test_assign_replaces_and_releases() {
        let (mut first, first_drops) = pair();
        let (second, second_drops) = pair();

        first.assign(&second);
        assert_eq!(first_drops.load(Ordering::SeqCst), 1);
        assert_eq!(second.ref_count(), 2);
        assert_eq!(first, second);

        first.release();
        assert!(first.is_null());
        assert_eq!(second.ref_count(), 1);
        assert_eq!(second_drops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_detach_then_attach_keeps_count() {
        let (mut alpha, drops) = pair();
        let observer = alpha.clone();

        let raw = alpha.detach();
        assert!(alpha.is_null());
        assert_eq!(observer.ref_count(), 2);

        let mut adopted = TypedHandle::<dyn Alpha>::null();
        unsafe { adopted.attach(raw) };
        assert_eq!(observer.ref_count(), 2);
        assert_eq!(adopted, observer);

        drop(adopted);
        drop(observer);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_attach_object_failure_releases_input() {
        let (alpha, drops) = pair();
        let mut object = alpha.to_untyped();
        drop(alpha);

        let raw = object.detach();
        let mut gamma = TypedHandle::<dyn Gamma>::null();
        let result = unsafe { gamma.attach_object(raw) };

        assert!(matches!(result, Err(HandleError::NarrowingFailed { .. })));
        assert!(gamma.is_null());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_narrow_raw_transferred_reference_is_not_leaked() {
        let (mut alpha, drops) = pair();
        let raw = alpha.detach().unwrap();

        let gamma = unsafe { TypedHandle::<dyn Gamma>::narrow_raw(raw, false) };
        assert!(gamma.is_null());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hash_follows_identity() {
        use std::collections::HashSet;

        let (alpha, _drops) = pair();
        let mut set = HashSet::new();
        set.insert(alpha.clone());
        assert!(set.contains(&alpha));
        assert_eq!(alpha.ref_count(), 2);
    }
}
