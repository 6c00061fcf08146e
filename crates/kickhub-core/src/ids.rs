use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident, $fresh:expr) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self($fresh)
            }

            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Sessions are plain UUIDs so browser clients can round-trip them through `?session=`.
opaque_id!(SessionId, Uuid::now_v7().to_string());
opaque_id!(ConnectionId, format!("conn_{}", Uuid::now_v7().simple()));

impl SessionId {
    /// Use the caller-supplied token, or mint a fresh one when it is absent or blank.
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::trim) {
            Some(t) if !t.is_empty() => Self::from_raw(t),
            _ => Self::new(),
        }
    }
}
