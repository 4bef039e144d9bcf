//! Type-safe construct identifiers
//!
//! Ids are assigned by the instrumenter and are only meaningful within one
//! instrumentation of one source version. The three kinds are deliberately
//! not interchangeable.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! construct_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create a new id
            #[inline]
            #[must_use]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            /// Get the inner value
            #[inline]
            #[must_use]
            pub const fn as_u32(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

construct_id! {
    /// Identifies one instrumented statement in a file
    StatementId
}

construct_id! {
    /// Identifies one instrumented function in a file
    FunctionId
}

construct_id! {
    /// Identifies one instrumented branch point (with one or more arms) in a file
    BranchId
}
