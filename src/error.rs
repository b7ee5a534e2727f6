//! Error types for dependency resolution

use crate::key::Key;
use thiserror::Error;

/// Errors that can occur while resolving or constructing a dependency
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The resolution strategy was exhausted without finding an implementation
    #[error("no provider found for {key}")]
    NoImplementation { key: Key },

    /// More than one eligible constructor at the same priority tier
    #[error("{type_name}: multiple {kind} constructors")]
    AmbiguousConstructor {
        type_name: &'static str,
        /// `"marked"` or `"public"`, depending on which tier was ambiguous
        kind: &'static str,
    },

    /// A non-builtin type with no registered constructor
    #[error("{type_name}: no public constructor")]
    NoConstructor { type_name: &'static str },

    /// A builtin type reached the instantiation procedure; builtins must be
    /// supplied through instance bindings
    #[error("{type_name}: nothing provided")]
    NothingProvided { type_name: &'static str },

    /// A constructor parameter's recursive resolution failed
    #[error("{target}: failed to inject {key} param")]
    ParameterResolution {
        key: Key,
        /// The type that was being constructed
        target: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// The chosen constructor itself failed during invocation
    #[error("failed to construct {type_name}: {reason}")]
    ConstructionFailed {
        type_name: &'static str,
        reason: String,
    },

    /// A registered value did not downcast to the requested type
    #[error("{key} resolved to a value that is not a {expected}")]
    WrongType { key: Key, expected: &'static str },

    /// Circular dependency detected during resolution
    #[error("circular dependency detected while resolving {type_name}")]
    CircularDependency { type_name: &'static str },
}

impl Error {
    /// Create a ConstructionFailed error for a type
    ///
    /// Use this inside registered constructors to surface domain failures:
    ///
    /// ```
    /// use plugin_injector::Error;
    ///
    /// struct Listener;
    ///
    /// let err = Error::construction::<Listener>("port already in use");
    /// assert!(err.to_string().contains("port already in use"));
    /// ```
    #[inline]
    pub fn construction<T: 'static>(reason: impl Into<String>) -> Self {
        Self::ConstructionFailed {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }

    /// Create a NoImplementation error for a key
    #[inline]
    pub fn no_implementation(key: Key) -> Self {
        Self::NoImplementation { key }
    }

    /// The innermost error in a parameter-resolution chain
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::ParameterResolution { source, .. } = current {
            current = source;
        }
        current
    }
}

/// Result type alias for resolution operations
pub type Result<T> = std::result::Result<T, Error>;
