//! Error types for Argus observables.

use crate::observable::ObservableId;
use core::fmt;

/// Result type alias for Argus operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for observable operations.
///
/// Every variant is a programmer-contract violation: the correct caller
/// behavior is to fix the call site, not to retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The property is bound and may not be written or re-bound.
    AlreadyBound,
    /// The property is not bound and may not be unbound.
    NotBound,
    /// A dependency edge to the given observable already exists.
    DuplicateDependency {
        observable: ObservableId,
    },
    /// No dependency edge to the given observable exists.
    UnknownDependency {
        observable: ObservableId,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AlreadyBound => {
                write!(f, "A bound property's value may not be set explicitly")
            }
            Error::NotBound => {
                write!(f, "The property is not bound")
            }
            Error::DuplicateDependency { observable } => {
                write!(f, "Expression already depends on observable: {:#x}", observable)
            }
            Error::UnknownDependency { observable } => {
                write!(f, "Expression does not depend on observable: {:#x}", observable)
            }
        }
    }
}

impl Error {
    /// Creates a duplicate dependency error.
    pub fn duplicate_dependency(observable: ObservableId) -> Self {
        Error::DuplicateDependency { observable }
    }

    /// Creates an unknown dependency error.
    pub fn unknown_dependency(observable: ObservableId) -> Self {
        Error::UnknownDependency { observable }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_display() {
        let err = Error::AlreadyBound;
        assert!(err.to_string().contains("bound property"));

        let err = Error::duplicate_dependency(0xdead);
        assert!(err.to_string().contains("already depends"));

        let err = Error::unknown_dependency(0xbeef);
        assert!(err.to_string().contains("does not depend"));
    }

    #[test]
    fn test_error_constructors() {
        let err = Error::duplicate_dependency(42);
        match err {
            Error::DuplicateDependency { observable } => assert_eq!(observable, 42),
            _ => panic!("Wrong error type"),
        }
    }
}
