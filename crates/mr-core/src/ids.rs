//! Typed ID wrappers providing compile-time safety for identifiers.
//!
//! Upstream identifiers are plain integers, so each ID type is a newtype
//! over the integer it carries. This prevents passing an object id where a
//! container id is expected, which the routing layer would otherwise accept.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generate a newtype ID wrapper over an integer type.
///
/// The macro produces a struct with:
/// - `new(value)` and `get()` accessors
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `Ord`, `Serialize`, `Deserialize`
/// - `Display` and `FromStr` delegating to the inner integer
/// - `From<inner>` conversion
macro_rules! numeric_id {
    ($($(#[doc = $doc:expr])* $name:ident($inner:ty)),+ $(,)?) => {
        $(
            $(#[doc = $doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name($inner);

            impl $name {
                /// Wrap a raw value.
                #[must_use]
                pub const fn new(value: $inner) -> Self {
                    Self(value)
                }

                /// Return the raw value.
                #[must_use]
                pub const fn get(self) -> $inner {
                    self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl FromStr for $name {
                type Err = std::num::ParseIntError;

                fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                    s.trim().parse::<$inner>().map(Self)
                }
            }

            impl From<$inner> for $name {
                fn from(value: $inner) -> Self {
                    Self(value)
                }
            }
        )+
    };
}

numeric_id! {
    /// Identifier of the upstream container (channel, bucket, chat) holding an object.
    ContainerId(i64),
    /// Identifier of an object within its container.
    ObjectId(i64),
    /// Position of an upstream client within the client pool.
    ClientId(usize),
}

/// Address of a remote object: the container it lives in plus its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub container_id: ContainerId,
    pub object_id: ObjectId,
}

impl ObjectRef {
    pub const fn new(container_id: i64, object_id: i64) -> Self {
        Self {
            container_id: ContainerId::new(container_id),
            object_id: ObjectId::new(object_id),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container_id, self.object_id)
    }
}
