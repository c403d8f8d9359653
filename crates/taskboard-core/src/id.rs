use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt};
use uuid::Uuid;

/// Prefix carried by identifiers minted on the client before the backend
/// has confirmed the entity.
pub const TEMPORARY_PREFIX: &str = "tmp-";

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier issued by a backend (or read from storage).
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Mint a client-side placeholder id (`tmp-` + UUID v7).
            #[must_use]
            pub fn temporary() -> Self {
                // UUID v7 keeps placeholders sortable by creation time.
                Self(format!("{TEMPORARY_PREFIX}{}", Uuid::now_v7()))
            }

            /// Mint a backend id (UUID v7) for stores that issue their own.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Whether this id is a client placeholder awaiting confirmation.
            #[must_use]
            pub fn is_temporary(&self) -> bool {
                self.0.starts_with(TEMPORARY_PREFIX)
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(
    /// Identifier of a task.
    TaskId
);

opaque_id!(
    /// Identifier of a section (board column).
    SectionId
);
