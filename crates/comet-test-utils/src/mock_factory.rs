//! Mock implementation of Factory for testing.
//!
//! The factory maps class ids to constructor closures and records every
//! create call, successful or not.

use comet::{Class, ClassId, CreateError, Factory, Instance};
use comet_core::alloc::HashMap;
use parking_lot::Mutex;

/// Records a create call for verification in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCall {
    pub class: ClassId,
    pub succeeded: bool,
}

type Constructor = Box<dyn Fn() -> Instance + Send + Sync>;

/// Mock implementation of Factory for testing.
///
/// # Example
///
/// ```rust
/// use comet::{ClassId, UntypedHandle};
/// use comet_test_utils::MockFactory;
///
/// let factory = MockFactory::new().with_failure(ClassId::new("broken"), "out of memory");
///
/// let handle = UntypedHandle::from_class_in(&factory, &ClassId::new("broken"));
/// assert!(handle.is_null());
/// assert_eq!(factory.count_failures(), 1);
/// ```
pub struct MockFactory {
    /// Class table
    constructors: HashMap<ClassId, Constructor>,

    /// Classes that are known but fail to construct
    failures: HashMap<ClassId, String>,

    /// Recorded calls for verification
    calls: Mutex<Vec<CreateCall>>,
}

impl MockFactory {
    /// Create a new mock factory with no classes.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
            failures: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Add a class constructed by `constructor`.
    pub fn with_class<T, F>(mut self, class: ClassId, constructor: F) -> Self
    where
        T: Class,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.constructors
            .insert(class, Box::new(move || Instance::new(constructor())));
        self
    }

    /// Add a class whose construction always fails with `message`.
    pub fn with_failure(mut self, class: ClassId, message: impl Into<String>) -> Self {
        self.failures.insert(class, message.into());
        self
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<CreateCall> {
        self.calls.lock().clone()
    }

    /// Count successful creates.
    pub fn count_creates(&self) -> usize {
        self.calls.lock().iter().filter(|call| call.succeeded).count()
    }

    /// Count failed creates.
    pub fn count_failures(&self) -> usize {
        self.calls.lock().iter().filter(|call| !call.succeeded).count()
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Get total number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Default for MockFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl Factory for MockFactory {
    fn create(&self, class: &ClassId) -> Result<Instance, CreateError> {
        let result = if let Some(message) = self.failures.get(class) {
            Err(CreateError::Failed {
                class: *class,
                message: message.clone(),
            })
        } else if let Some(constructor) = self.constructors.get(class) {
            Ok(constructor())
        } else {
            Err(CreateError::UnknownClass { class: *class })
        };

        self.calls.lock().push(CreateCall {
            class: *class,
            succeeded: result.is_ok(),
        });

        result
    }

    fn name(&self) -> &'static str {
        "MockFactory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comet::RefCount;

    struct Empty {
        refs: RefCount,
    }

    impl Class for Empty {
        fn refs(&self) -> &RefCount {
            &self.refs
        }
    }

    const CLSID_EMPTY: ClassId = ClassId::new("empty");

    #[test]
    fn test_records_calls() {
        let factory = MockFactory::new().with_class(CLSID_EMPTY, || Empty {
            refs: RefCount::new(),
        });

        let instance = factory.create(&CLSID_EMPTY).unwrap();
        assert_eq!(instance.object().ref_count(), 1);
        assert!(factory.create(&ClassId::new("missing")).is_err());

        assert_eq!(factory.count_creates(), 1);
        assert_eq!(factory.count_failures(), 1);
        assert_eq!(
            factory.calls()[1],
            CreateCall {
                class: ClassId::new("missing"),
                succeeded: false,
            }
        );

        factory.clear_calls();
        assert_eq!(factory.call_count(), 0);
    }

    #[test]
    fn test_failure_takes_precedence() {
        let factory = MockFactory::new()
            .with_class(CLSID_EMPTY, || Empty {
                refs: RefCount::new(),
            })
            .with_failure(CLSID_EMPTY, "disabled");

        let err = factory.create(&CLSID_EMPTY).unwrap_err();
        assert_eq!(err.to_string(), "Failed to create class 'empty': disabled");
    }
}
