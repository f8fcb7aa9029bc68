//! Reference and cast primitives shared by both handle types.
//!
//! Rules every handle operation follows:
//! - the new reference is taken before it is exposed to the caller;
//! - a reference is released only after its last use, and never touched again;
//! - two handles are "the same" when their lifecycle views have the same data
//!   address, whatever capability they expose;
//! - a failed narrowing takes no reference and leaves the source untouched.

use std::ptr::{self, NonNull};

use comet_core::ModuleId;
use tracing::trace;

use crate::object::{self, Object, Released};

pub(crate) type ObjectPtr = NonNull<dyn Object>;

/// Adds a reference on behalf of the calling module.
///
/// # Safety
///
/// `object` must point at a live component.
#[inline]
pub(crate) unsafe fn acquire(object: ObjectPtr) {
    // SAFETY: forwarded from the caller.
    unsafe { object.as_ref() }.add_ref(ModuleId::current());
}

/// Releases a reference on behalf of the calling module, destroying the
/// component when it was the last one.
///
/// # Safety
///
/// The caller must own one reference to `object` and not use it afterwards.
pub(crate) unsafe fn release(object: ObjectPtr) {
    let caller = ModuleId::current();
    // The borrow of the component ends with this statement, before the
    // deleter frees it.
    let released = unsafe { object.as_ref().release(caller) };
    if let Released::Last(deleter) = released {
        trace!(home = %deleter.home(), %caller, "destroying component");
        // SAFETY: that was the last reference and nothing borrows the component.
        unsafe { deleter.run() }
    }
}

/// The lifecycle view behind a capability pointer.
///
/// # Safety
///
/// `capability` must point at a live component.
#[inline]
pub(crate) unsafe fn object_of<C: ?Sized + Object>(capability: NonNull<C>) -> ObjectPtr {
    // SAFETY: forwarded from the caller.
    NonNull::from(unsafe { capability.as_ref() }.as_object())
}

/// Looks up the `C` view of `object` without touching its count.
///
/// # Safety
///
/// `object` must point at a live component.
#[inline]
pub(crate) unsafe fn narrow<C: ?Sized + Object>(object: ObjectPtr) -> Option<NonNull<C>> {
    // SAFETY: forwarded from the caller.
    object::query::<C>(unsafe { object.as_ref() })
}

/// Component identity: compares lifecycle data addresses, ignoring vtables.
#[inline]
pub(crate) fn same_component(a: Option<ObjectPtr>, b: Option<ObjectPtr>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => ptr::addr_eq(a.as_ptr(), b.as_ptr()),
        (None, None) => true,
        _ => false,
    }
}

/// Class name of the component behind `object`.
///
/// # Safety
///
/// `object` must point at a live component.
#[inline]
pub(crate) unsafe fn class_name(object: ObjectPtr) -> &'static str {
    // SAFETY: forwarded from the caller.
    unsafe { object.as_ref() }.class_name()
}
