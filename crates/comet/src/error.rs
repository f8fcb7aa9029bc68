//! Error types for component creation and handle operations.

use std::fmt;

use crate::class::ClassId;

/// Errors a [`Factory`](crate::Factory) reports when it cannot produce a component.
#[derive(Debug)]
pub enum CreateError {
    /// No factory is installed in the calling module.
    NoFactory {
        /// The class that was requested.
        class: ClassId,
    },

    /// The factory does not know this class id.
    UnknownClass {
        /// The class that was requested.
        class: ClassId,
    },

    /// The factory knows the class but construction failed.
    Failed {
        /// The class that was requested.
        class: ClassId,
        /// Description of the failure.
        message: String,
    },
}

impl CreateError {
    /// The class id the failed request was for.
    pub fn class(&self) -> ClassId {
        match self {
            CreateError::NoFactory { class }
            | CreateError::UnknownClass { class }
            | CreateError::Failed { class, .. } => *class,
        }
    }
}

impl fmt::Display for CreateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateError::NoFactory { class } => {
                write!(f, "No factory installed to create class '{}'", class)
            }
            CreateError::UnknownClass { class } => {
                write!(f, "Unknown class id: '{}'", class)
            }
            CreateError::Failed { class, message } => {
                write!(f, "Failed to create class '{}': {}", class, message)
            }
        }
    }
}

impl std::error::Error for CreateError {}

/// Errors reported by the handle operations that return a result.
///
/// Constructors never report these: a failed construction simply yields a
/// null handle.
#[derive(Debug)]
pub enum HandleError {
    /// The factory could not produce the component.
    Creation(CreateError),

    /// The component does not implement the requested capability.
    NarrowingFailed {
        /// Type name of the component.
        class: &'static str,
        /// Type name of the capability that was requested.
        capability: &'static str,
    },
}

impl HandleError {
    pub(crate) fn narrowing<C: ?Sized>(class: &'static str) -> Self {
        HandleError::NarrowingFailed {
            class,
            capability: std::any::type_name::<C>(),
        }
    }
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleError::Creation(err) => write!(f, "{}", err),
            HandleError::NarrowingFailed { class, capability } => {
                write!(f, "Component '{}' does not implement {}", class, capability)
            }
        }
    }
}

impl std::error::Error for HandleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandleError::Creation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CreateError> for HandleError {
    fn from(err: CreateError) -> Self {
        HandleError::Creation(err)
    }
}

/// Result type alias for handle operations.
pub type HandleResult<T> = Result<T, HandleError>;
