//! # Boxed Values
//!
//! `Any` is the self-describing envelope every application value travels in:
//! a `Tag` naming how to read the payload, and the payload bytes themselves.
//! The tag alone determines decoding, independent of the type the value had
//! before it was boxed.

use crate::error::Error;
use crate::error::Result;
use crate::value::Native;

/// The closed set of wire-representable shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// The null pointer / absent value. Carries no payload.
    Empty,
    Bool,
    /// Every signed integer, widened to 64 bits.
    Int,
    /// Every unsigned integer, widened to 64 bits.
    Uint,
    /// Every float, widened to 64 bits.
    Double,
    String,
    Bytes,
    Timestamp,
    Duration,
    /// A generic tree of null, bool, number, string, list and ordered-key map.
    Structure,
}

impl Tag {
    /// Every tag, in code order.
    pub const ALL: [Tag; 10] = [
        Tag::Empty,
        Tag::Bool,
        Tag::Int,
        Tag::Uint,
        Tag::Double,
        Tag::String,
        Tag::Bytes,
        Tag::Timestamp,
        Tag::Duration,
        Tag::Structure,
    ];

    /// Stable short name, used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Tag::Empty => "empty",
            Tag::Bool => "bool",
            Tag::Int => "int64",
            Tag::Uint => "uint64",
            Tag::Double => "double",
            Tag::String => "string",
            Tag::Bytes => "bytes",
            Tag::Timestamp => "timestamp",
            Tag::Duration => "duration",
            Tag::Structure => "structure",
        }
    }

    /// Stable numeric code, used by record framing.
    pub fn code(self) -> u64 {
        match self {
            Tag::Empty => 0,
            Tag::Bool => 1,
            Tag::Int => 2,
            Tag::Uint => 3,
            Tag::Double => 4,
            Tag::String => 5,
            Tag::Bytes => 6,
            Tag::Timestamp => 7,
            Tag::Duration => 8,
            Tag::Structure => 9,
        }
    }

    /// Inverse of [`Tag::code`].
    pub fn from_code(code: u64) -> Result<Self> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.code() == code)
            .ok_or_else(|| Error::UnknownVariant(format!("tag code {}", code)))
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A boxed value: tag plus payload, compared structurally.
///
/// Created by the codec (see [`crate::box_value`]) and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Any {
    tag: Tag,
    payload: Vec<u8>,
}

impl Any {
    /// The canonical boxed null.
    pub fn empty() -> Self {
        Self { tag: Tag::Empty, payload: Vec::new() }
    }

    /// Reassembles a boxed value received from the wire.
    ///
    /// The payload is not validated here; decoding reports malformed bytes.
    pub fn from_parts(tag: Tag, payload: Vec<u8>) -> Self {
        Self { tag, payload }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn is_empty(&self) -> bool {
        self.tag == Tag::Empty
    }

    /// Decodes the payload into its native form, as named by the tag.
    pub fn decode(&self) -> Result<Native> {
        Native::decode(self.tag, &self.payload)
    }
}

impl Default for Any {
    fn default() -> Self {
        Self::empty()
    }
}
