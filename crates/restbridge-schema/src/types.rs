//! Newtype wrappers for string identifiers, providing compile-time type safety.
//!
//! All newtypes serialize/deserialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Stable identifier of a managed resource type, e.g. `tailscale:tailnet:Key`.
    TypeToken
);

string_newtype!(
    /// Resource instance URN: `urn:pulumi:<stack>::<project>::<type>::<name>`.
    ResourceUrn
);

const URN_PREFIX: &str = "urn:pulumi:";
const URN_SEPARATOR: &str = "::";

impl ResourceUrn {
    /// Build a URN from its parts.
    pub fn compose(stack: &str, project: &str, type_token: &str, name: &str) -> Self {
        Self(format!(
            "{URN_PREFIX}{stack}{URN_SEPARATOR}{project}{URN_SEPARATOR}{type_token}{URN_SEPARATOR}{name}"
        ))
    }

    fn segments(&self) -> Option<(&str, &str)> {
        let rest = self.0.strip_prefix(URN_PREFIX)?;
        let mut parts = rest.splitn(4, URN_SEPARATOR);
        let _stack = parts.next()?;
        let _project = parts.next()?;
        let qualified_type = parts.next()?;
        let name = parts.next()?;
        Some((qualified_type, name))
    }

    /// The resource type token. Parent types are prefixed with `$`-separated
    /// components; only the last one names this resource's type.
    pub fn type_token(&self) -> Option<TypeToken> {
        let (qualified_type, _) = self.segments()?;
        let token = qualified_type.rsplit('$').next().unwrap_or(qualified_type);
        if token.is_empty() {
            None
        } else {
            Some(TypeToken::new(token))
        }
    }

    /// The user-supplied resource name.
    pub fn name(&self) -> Option<&str> {
        self.segments().map(|(_, name)| name)
    }
}
