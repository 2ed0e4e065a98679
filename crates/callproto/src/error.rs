//! # Error Definitions
//!
//! Codec and framing failures. Remote failures are not errors of this
//! library; they travel as `RemoteError` records inside `CallResult`s.

use crate::any::Tag;
use crate::value::Kind;

/// Failures of boxing, unboxing and record framing.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The payload bytes could not be read or written.
    Wire(wirepack::Error),
    /// No boxing capability applies to the value's type.
    UnsupportedType(String),
    /// The wire tag cannot be unboxed into the target.
    TypeMismatch { tag: Tag, target: Kind },
    /// The wire value does not fit the target without loss.
    Overflow { tag: Tag, value: String, target: Kind },
    /// A value's own structured, text or binary conversion failed.
    Marshal(String),
    /// A record was missing a required field or was otherwise malformed.
    ProtocolViolation(String),
    /// An unknown tag code or directive name was encountered.
    UnknownVariant(String),
    /// The nesting depth of a structural value exceeded the safety limit.
    RecursionLimitExceeded,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wire(e) => write!(f, "wire error: {}", e),
            Self::UnsupportedType(ty) => write!(f, "cannot box value of type {}: unsupported type", ty),
            Self::TypeMismatch { tag, target } => {
                write!(f, "cannot unbox {} into {}: type mismatch", tag, target)
            }
            Self::Overflow { tag, value, target } => {
                write!(f, "cannot unbox {} of {} into {}: overflow", tag, value, target)
            }
            Self::Marshal(msg) => write!(f, "marshal error: {}", msg),
            Self::ProtocolViolation(msg) => write!(f, "protocol violation: {}", msg),
            Self::UnknownVariant(name) => write!(f, "unknown variant: {}", name),
            Self::RecursionLimitExceeded => write!(f, "structural value nested too deeply"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Wire(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wirepack::Error> for Error {
    fn from(e: wirepack::Error) -> Self {
        Self::Wire(e)
    }
}

/// A specialized Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
