//! Typed identifiers for store entities
//!
//! Every entity reference in the system goes through one of these newtypes
//! so a sensor id can never be handed to an equipment lookup. Identifiers
//! are opaque strings, validated to be non-empty and whitespace-free.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for invalid identifiers
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("identifier cannot be empty")]
    Empty,

    #[error("identifier cannot contain whitespace: {0:?}")]
    Whitespace(String),
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a raw identifier
            pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
                let raw = raw.into();
                if raw.is_empty() {
                    return Err(IdError::Empty);
                }
                if raw.chars().any(char::is_whitespace) {
                    return Err(IdError::Whitespace(raw));
                }
                Ok(Self(raw))
            }

            /// View the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_type! {
    /// Identifier of a monitored site (greenhouse installation)
    SiteId
}

id_type! {
    /// Identifier of a sensor attached to a site
    SensorId
}

id_type! {
    /// Identifier of an actuator attached to a site
    EquipmentId
}

id_type! {
    /// Identifier of an automation rule
    RuleId
}

id_type! {
    /// Identifier of an alert entry
    AlertId
}
