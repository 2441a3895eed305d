//! Core domain types
//!
//! These types mirror the coordinator's view of a job. They are shared between
//! the client (which fills them from responses) and the agent (which reads and
//! updates them while the job runs). None of them are persisted locally.

/// Declares a string-valued enumeration with a fixed set of known values and
/// a catch-all variant (named after `else`) that keeps unrecognized strings intact.
///
/// The generated type serializes as a plain string, so unknown values coming
/// from a newer coordinator round-trip unchanged.
macro_rules! open_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $variant:ident => $wire:literal, )+
        }
        else $other:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $( $variant, )+
            /// Any value not listed above, kept verbatim
            $other(String),
        }

        impl $name {
            /// Returns the wire representation
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $wire, )+
                    Self::$other(value) => value,
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                match value.as_str() {
                    $( $wire => Self::$variant, )+
                    _ => Self::$other(value),
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::from(value.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                match value {
                    $name::$other(value) => value,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod job;
pub mod pipeline;
