//! Untyped handles - counted references to a component's lifecycle view.
//!
//! Used where the capability is chosen later or does not matter, for example
//! when components are stored generically or passed across a plugin boundary.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr::{self, NonNull};

use tracing::debug;

use crate::cast::{self, ObjectPtr};
use crate::class::ClassId;
use crate::error::HandleResult;
use crate::factory::{self, Factory};
use crate::object::{Class, Instance, Object};
use crate::typed::TypedHandle;

/// A counted reference to a component, without committing to a capability.
///
/// Convert to a [`TypedHandle`] with [`UntypedHandle::cast`] once the
/// capability is known.
#[derive(Default)]
pub struct UntypedHandle {
    object: Option<ObjectPtr>,
}

impl UntypedHandle {
    /// A handle that references nothing.
    pub const fn null() -> Self {
        Self { object: None }
    }

    /// Boxes `component` and keeps its lifecycle view.
    pub fn new<T: Class>(component: T) -> Self {
        Self::from(Instance::new(component))
    }

    /// A new reference to the component behind a raw capability pointer.
    ///
    /// # Safety
    ///
    /// `capability` must point at a live component.
    pub unsafe fn from_raw<C: ?Sized + Object>(capability: NonNull<C>) -> Self {
        // SAFETY: forwarded from the caller.
        let object = unsafe { cast::object_of(capability) };
        unsafe { cast::acquire(object) };
        Self {
            object: Some(object),
        }
    }

    /// A new reference to the component behind `source`.
    pub fn from_typed<C: ?Sized + Object>(source: &TypedHandle<C>) -> Self {
        let object = source.object_ptr();
        if let Some(object) = object {
            // SAFETY: `source` keeps the component alive.
            unsafe { cast::acquire(object) };
        }
        Self { object }
    }

    /// Creates a component through this module's installed factory.
    ///
    /// Null if creation fails.
    pub fn from_class(class: &ClassId) -> Self {
        Self::created(factory::installed_factory(), class)
    }

    /// Creates a component through `factory`. Null if creation fails.
    pub fn from_class_in(factory: &dyn Factory, class: &ClassId) -> Self {
        Self::created(Some(factory), class)
    }

    fn created(factory: Option<&dyn Factory>, class: &ClassId) -> Self {
        match factory::create_with(factory, class) {
            Ok(instance) => Self::from(instance),
            Err(err) => {
                debug!(%class, %err, "construction by class id left the handle null");
                Self::null()
            }
        }
    }

    fn install(&mut self, next: Option<ObjectPtr>) {
        if let Some(previous) = std::mem::replace(&mut self.object, next) {
            // SAFETY: the handle owned this reference and no longer holds it.
            unsafe { cast::release(previous) };
        }
    }

    /// Makes this handle reference what `source` references.
    ///
    /// A no-op when both already reference the same component.
    pub fn assign(&mut self, source: &Self) {
        if cast::same_component(self.object, source.object) {
            return;
        }
        if let Some(object) = source.object {
            // SAFETY: `source` keeps the component alive.
            unsafe { cast::acquire(object) };
        }
        self.install(source.object);
    }

    /// Makes this handle reference the component behind `source`.
    pub fn assign_from<C: ?Sized + Object>(&mut self, source: &TypedHandle<C>) {
        let object = source.object_ptr();
        if cast::same_component(self.object, object) {
            return;
        }
        if let Some(object) = object {
            // SAFETY: `source` keeps the component alive.
            unsafe { cast::acquire(object) };
        }
        self.install(object);
    }

    /// Drops the held reference, leaving the handle null.
    pub fn release(&mut self) {
        self.install(None);
    }

    /// Gives up ownership without releasing.
    pub fn detach(&mut self) -> Option<NonNull<dyn Object>> {
        self.object.take()
    }

    /// Adopts a raw lifecycle pointer whose reference the caller already owns.
    /// The previous reference is released.
    ///
    /// # Safety
    ///
    /// `object`, if present, must point at a live component and the caller must
    /// own a reference to it that it gives up.
    pub unsafe fn attach(&mut self, object: Option<NonNull<dyn Object>>) {
        self.install(object);
    }

    /// Releases the current reference and stores a new component created
    /// through the installed factory.
    pub fn create(&mut self, class: &ClassId) -> HandleResult<()> {
        self.create_with(factory::installed_factory(), class)
    }

    /// Releases the current reference and stores a new component created
    /// through `factory`.
    pub fn create_in(&mut self, factory: &dyn Factory, class: &ClassId) -> HandleResult<()> {
        self.create_with(Some(factory), class)
    }

    fn create_with(&mut self, factory: Option<&dyn Factory>, class: &ClassId) -> HandleResult<()> {
        self.release();
        let instance = factory::create_with(factory, class)?;
        self.object = Some(instance.into_raw());
        Ok(())
    }

    /// A typed handle to the `C` view of this component; null if the
    /// component does not implement `C`.
    pub fn cast<C: ?Sized + Object>(&self) -> TypedHandle<C> {
        TypedHandle::from_untyped(self)
    }

    /// The lifecycle view, or `None` for a null handle.
    pub fn get(&self) -> Option<&dyn Object> {
        // SAFETY: the handle holds a reference.
        self.object.map(|object| unsafe { object.as_ref() })
    }

    /// The raw lifecycle pointer, without transferring ownership.
    pub fn as_ptr(&self) -> Option<NonNull<dyn Object>> {
        self.object
    }

    pub fn is_null(&self) -> bool {
        self.object.is_none()
    }

    pub fn is_not_null(&self) -> bool {
        self.object.is_some()
    }

    /// Whether this handle's lifecycle pointer is `other`.
    pub fn ptr_eq(&self, other: *const dyn Object) -> bool {
        match self.object {
            Some(object) => ptr::addr_eq(object.as_ptr(), other),
            None => other.is_null(),
        }
    }

    /// Whether this handle and `other` reference the same component.
    pub fn same_component<C: ?Sized + Object>(&self, other: &TypedHandle<C>) -> bool {
        cast::same_component(self.object, other.object_ptr())
    }

    /// Current reference count of the component, 0 for a null handle.
    pub fn ref_count(&self) -> u32 {
        self.get().map_or(0, |object| object.ref_count())
    }

    /// Type name of the component, if any.
    pub fn class_name(&self) -> Option<&'static str> {
        self.get().map(|object| object.class_name())
    }
}

impl Clone for UntypedHandle {
    fn clone(&self) -> Self {
        if let Some(object) = self.object {
            // SAFETY: `self` keeps the component alive.
            unsafe { cast::acquire(object) };
        }
        Self {
            object: self.object,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl Drop for UntypedHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl From<Instance> for UntypedHandle {
    fn from(instance: Instance) -> Self {
        Self {
            object: Some(instance.into_raw()),
        }
    }
}

impl<C: ?Sized + Object> From<&TypedHandle<C>> for UntypedHandle {
    fn from(source: &TypedHandle<C>) -> Self {
        Self::from_typed(source)
    }
}

impl PartialEq for UntypedHandle {
    fn eq(&self, other: &Self) -> bool {
        cast::same_component(self.object, other.object)
    }
}

impl Eq for UntypedHandle {}

impl Hash for UntypedHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.object
            .map(|object| object.cast::<()>().as_ptr() as usize)
            .hash(state);
    }
}

impl fmt::Debug for UntypedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UntypedHandle")
            .field("class", &self.class_name())
            .field("refs", &self.ref_count())
            .finish()
    }
}

// SAFETY: components are `Send + Sync` and the count is atomic.
unsafe impl Send for UntypedHandle {}
unsafe impl Sync for UntypedHandle {}
