//! The component factory boundary.
//!
//! Handles never construct components themselves: construction by
//! [`ClassId`] is delegated to a [`Factory`]. Each module may install one
//! process-wide factory, which the `from_class`/`create` handle operations
//! use; the `*_in` variants take an explicit factory instead.

use std::any::type_name;
use std::sync::{Arc, OnceLock};

use tracing::{debug, trace};

use crate::class::ClassId;
use crate::error::CreateError;
use crate::object::Instance;

/// Maps a class id to a freshly constructed component.
///
/// On success the returned [`Instance`] carries exactly one reference.
pub trait Factory: Send + Sync {
    fn create(&self, class: &ClassId) -> Result<Instance, CreateError>;

    /// Name of this factory for diagnostics.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

impl<F: Factory + ?Sized> Factory for Arc<F> {
    fn create(&self, class: &ClassId) -> Result<Instance, CreateError> {
        (**self).create(class)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<F: Factory + ?Sized> Factory for Box<F> {
    fn create(&self, class: &ClassId) -> Result<Instance, CreateError> {
        (**self).create(class)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// A function-based factory for simple use cases.
///
/// # Example
///
/// ```
/// use comet::{ClassId, Class, FnFactory, Instance, RefCount, UntypedHandle};
///
/// const CLSID_UNIT: ClassId = ClassId::new("unit");
///
/// struct Unit {
///     refs: RefCount,
/// }
///
/// impl Class for Unit {
///     fn refs(&self) -> &RefCount {
///         &self.refs
///     }
/// }
///
/// let factory = FnFactory::new("units", |class| {
///     (*class == CLSID_UNIT).then(|| Instance::new(Unit { refs: RefCount::new() }))
/// });
///
/// let handle = UntypedHandle::from_class_in(&factory, &CLSID_UNIT);
/// assert!(handle.is_not_null());
/// ```
pub struct FnFactory<F>
where
    F: Fn(&ClassId) -> Option<Instance> + Send + Sync + 'static,
{
    name: &'static str,
    create_fn: F,
}

impl<F> FnFactory<F>
where
    F: Fn(&ClassId) -> Option<Instance> + Send + Sync + 'static,
{
    /// Create a new function-based factory.
    pub fn new(name: &'static str, create_fn: F) -> Self {
        Self { name, create_fn }
    }
}

impl<F> Factory for FnFactory<F>
where
    F: Fn(&ClassId) -> Option<Instance> + Send + Sync + 'static,
{
    fn create(&self, class: &ClassId) -> Result<Instance, CreateError> {
        (self.create_fn)(class).ok_or(CreateError::UnknownClass { class: *class })
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// This module's factory. Every plugin links its own copy of this crate and
/// therefore has its own slot.
static FACTORY: OnceLock<Box<dyn Factory>> = OnceLock::new();

/// Installs the factory used by `from_class` and `create` in this module.
///
/// Returns `false` if a factory was already installed; the first one stays.
pub fn install_factory(factory: impl Factory + 'static) -> bool {
    let name = factory.name();
    let installed = FACTORY.set(Box::new(factory)).is_ok();
    if installed {
        debug!(factory = name, "installed component factory");
    } else {
        debug!(factory = name, "a component factory is already installed, ignoring");
    }
    installed
}

/// The factory installed in this module, if any.
pub fn installed_factory() -> Option<&'static dyn Factory> {
    FACTORY.get().map(|factory| &**factory as &dyn Factory)
}

/// Creates a component through the installed factory.
pub fn create_object(class: &ClassId) -> Result<Instance, CreateError> {
    create_with(installed_factory(), class)
}

pub(crate) fn create_with(
    factory: Option<&dyn Factory>,
    class: &ClassId,
) -> Result<Instance, CreateError> {
    if !class.is_valid() {
        return Err(CreateError::UnknownClass { class: *class });
    }
    let factory = factory.ok_or(CreateError::NoFactory { class: *class })?;

    let instance = factory.create(class)?;
    trace!(
        %class,
        factory = factory.name(),
        component = instance.class_name(),
        "created component"
    );
    Ok(instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Class, RefCount};

    const CLSID_UNIT: ClassId = ClassId::new("unit");

    struct Unit {
        refs: RefCount,
    }

    impl Class for Unit {
        fn refs(&self) -> &RefCount {
            &self.refs
        }
    }

    fn unit_factory() -> impl Factory {
        FnFactory::new("units", |class| {
            (*class == CLSID_UNIT).then(|| Instance::new(Unit { refs: RefCount::new() }))
        })
    }

    #[test]
    fn test_fn_factory_creates_known_class() {
        let factory = unit_factory();
        let instance = create_with(Some(&factory), &CLSID_UNIT).unwrap();
        assert_eq!(instance.object().ref_count(), 1);
        assert_eq!(factory.name(), "units");
    }

    #[test]
    fn test_fn_factory_rejects_unknown_class() {
        let factory = unit_factory();
        let err = create_with(Some(&factory), &ClassId::new("other")).unwrap_err();
        assert!(matches!(err, CreateError::UnknownClass { .. }));
        assert_eq!(err.class(), ClassId::new("other"));
    }

    #[test]
    fn test_invalid_class_never_reaches_factory() {
        let factory = FnFactory::new("panicking", |_| panic!("factory must not be called"));
        let err = create_with(Some(&factory), &ClassId::NONE).unwrap_err();
        assert!(matches!(err, CreateError::UnknownClass { .. }));
    }

    #[test]
    fn test_missing_factory() {
        let err = create_with(None, &CLSID_UNIT).unwrap_err();
        assert!(matches!(err, CreateError::NoFactory { .. }));
        assert_eq!(
            err.to_string(),
            "No factory installed to create class 'unit'"
        );
    }

    #[test]
    fn test_shared_factory() {
        let factory: Arc<dyn Factory> = Arc::new(unit_factory());
        assert!(create_with(Some(&factory), &CLSID_UNIT).is_ok());
    }
}
