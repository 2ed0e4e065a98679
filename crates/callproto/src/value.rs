//! # Native Values and Target Kinds
//!
//! `Native` is what a payload decodes to before any target type is
//! considered; `Kind` describes the target a caller wants to unbox into.
//!
//! ## Invariants
//! - **One width per kind**: every payload is a single wirepack item holding
//!   a 64-bit scalar, a blob, a time value or a structural tree.
//! - **Recursion Safety**: structural trees are bounded by `MAX_RECURSION_DEPTH`.
//! - **No silent loss**: narrowing to a target kind is checked, never wrapped.

use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde_json::Value;
use wirepack::Decoder;
use wirepack::Encoder;

use crate::any::Any;
use crate::any::Tag;
use crate::error::Error;
use crate::error::Result;

/// The maximum nesting depth of a structural value.
const MAX_RECURSION_DEPTH: usize = 64;

/// The decoded, untyped form of a boxed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(SystemTime),
    Duration(Duration),
    Structure(Value),
}

/// Describes the target of an unboxing operation.
///
/// Integer and float kinds carry their bit width so narrowing can be checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int(u32),
    Uint(u32),
    Float(u32),
    String,
    Bytes,
    Timestamp,
    Duration,
    Structure,
    /// Accepts whatever the wire holds.
    Any,
    /// A type reachable only through a deserialization capability, named
    /// for error messages.
    Opaque(&'static str),
}

impl Kind {
    /// The tag whose native decoded type is exactly this kind, if any.
    pub fn native_tag(self) -> Option<Tag> {
        match self {
            Kind::Bool => Some(Tag::Bool),
            Kind::Int(64) => Some(Tag::Int),
            Kind::Uint(64) => Some(Tag::Uint),
            Kind::Float(64) => Some(Tag::Double),
            Kind::String => Some(Tag::String),
            Kind::Bytes => Some(Tag::Bytes),
            Kind::Timestamp => Some(Tag::Timestamp),
            Kind::Duration => Some(Tag::Duration),
            Kind::Structure => Some(Tag::Structure),
            Kind::Int(_) | Kind::Uint(_) | Kind::Float(_) | Kind::Any | Kind::Opaque(_) => None,
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Bool => f.write_str("bool"),
            Kind::Int(bits) => write!(f, "i{}", bits),
            Kind::Uint(bits) => write!(f, "u{}", bits),
            Kind::Float(bits) => write!(f, "f{}", bits),
            Kind::String => f.write_str("string"),
            Kind::Bytes => f.write_str("bytes"),
            Kind::Timestamp => f.write_str("timestamp"),
            Kind::Duration => f.write_str("duration"),
            Kind::Structure => f.write_str("structure"),
            Kind::Any => f.write_str("any"),
            Kind::Opaque(name) => f.write_str(name),
        }
    }
}

impl Native {
    /// The tag this value boxes under.
    pub fn tag(&self) -> Tag {
        match self {
            Native::Null => Tag::Empty,
            Native::Bool(_) => Tag::Bool,
            Native::Int(_) => Tag::Int,
            Native::Uint(_) => Tag::Uint,
            Native::Double(_) => Tag::Double,
            Native::String(_) => Tag::String,
            Native::Bytes(_) => Tag::Bytes,
            Native::Timestamp(_) => Tag::Timestamp,
            Native::Duration(_) => Tag::Duration,
            Native::Structure(_) => Tag::Structure,
        }
    }

    /// Boxes the value.
    pub fn encode(&self) -> Result<Any> {
        if let Native::Null = self {
            return Ok(Any::empty());
        }

        let mut enc = Encoder::new();
        match self {
            Native::Null => {}
            Native::Bool(b) => enc.bool(*b)?,
            Native::Int(i) => enc.s64(*i)?,
            Native::Uint(u) => enc.u64(*u)?,
            Native::Double(f) => enc.f64(*f)?,
            Native::String(s) => enc.str(s)?,
            Native::Bytes(b) => enc.bytes(b)?,
            Native::Timestamp(t) => {
                let (secs, nanos) = timestamp_parts(*t)?;
                enc.timestamp(secs, nanos)?;
            }
            Native::Duration(d) => {
                let secs = i64::try_from(d.as_secs())
                    .map_err(|_| Error::Marshal(format!("duration {:?} out of range", d)))?;
                // subsec_nanos is below one billion, which always fits an i32.
                enc.duration(secs, d.subsec_nanos() as i32)?;
            }
            Native::Structure(v) => encode_structure(&mut enc, v, 0)?,
        }
        Ok(Any::from_parts(self.tag(), enc.into_bytes()?))
    }

    /// Decodes a payload as named by its tag.
    pub(crate) fn decode(tag: Tag, payload: &[u8]) -> Result<Native> {
        if tag == Tag::Empty {
            return Ok(Native::Null);
        }

        let mut dec = Decoder::new(payload);
        let native = match tag {
            Tag::Empty => Native::Null,
            Tag::Bool => Native::Bool(dec.bool()?),
            Tag::Int => Native::Int(dec.s64()?),
            Tag::Uint => Native::Uint(dec.u64()?),
            Tag::Double => Native::Double(dec.f64()?),
            Tag::String => Native::String(dec.str()?.to_string()),
            Tag::Bytes => Native::Bytes(dec.bytes()?.to_vec()),
            Tag::Timestamp => {
                let (secs, nanos) = dec.timestamp()?;
                Native::Timestamp(timestamp_from_parts(secs, nanos)?)
            }
            Tag::Duration => {
                let (secs, nanos) = dec.duration()?;
                if secs < 0 || nanos < 0 {
                    return Err(Error::Overflow {
                        tag,
                        value: format!("{}s{}ns", secs, nanos),
                        target: Kind::Duration,
                    });
                }
                Native::Duration(Duration::new(secs as u64, nanos as u32))
            }
            Tag::Structure => Native::Structure(decode_structure(&mut dec, 0)?),
        };

        if !dec.is_empty() {
            return Err(Error::ProtocolViolation(format!(
                "{} trailing bytes after {} payload",
                dec.remaining(),
                tag
            )));
        }
        Ok(native)
    }

    /// Narrows the value to `target`.
    ///
    /// Returns `Ok(None)` if the kinds are incompatible and an overflow error
    /// if they are compatible but the value does not fit.
    pub(crate) fn coerce(self, target: Kind) -> Result<Option<Native>> {
        let tag = self.tag();
        let overflow = |value: String| Error::Overflow { tag, value, target };

        let native = match (self, target) {
            (native, Kind::Any) => native,
            (Native::Bool(b), Kind::Bool) => Native::Bool(b),
            (Native::Int(i), Kind::Int(bits)) => {
                if !fits_signed(i, bits) {
                    return Err(overflow(i.to_string()));
                }
                Native::Int(i)
            }
            (Native::Uint(u), Kind::Uint(bits)) => {
                if !fits_unsigned(u, bits) {
                    return Err(overflow(u.to_string()));
                }
                Native::Uint(u)
            }
            (Native::Double(f), Kind::Float(bits)) => {
                if bits < 64 && f.is_finite() && f.abs() > f64::from(f32::MAX) {
                    return Err(overflow(f.to_string()));
                }
                Native::Double(f)
            }
            (Native::String(s), Kind::String) => Native::String(s),
            (Native::Bytes(b), Kind::Bytes) => Native::Bytes(b),
            (Native::Timestamp(t), Kind::Timestamp) => Native::Timestamp(t),
            (Native::Duration(d), Kind::Duration) => Native::Duration(d),
            (Native::Structure(v), Kind::Structure) => Native::Structure(v),
            _ => return Ok(None),
        };
        Ok(Some(native))
    }
}

fn fits_signed(v: i64, bits: u32) -> bool {
    if bits >= 64 {
        return true;
    }
    let max = (1i64 << (bits - 1)) - 1;
    let min = -(1i64 << (bits - 1));
    (min..=max).contains(&v)
}

fn fits_unsigned(v: u64, bits: u32) -> bool {
    bits >= 64 || v < (1u64 << bits)
}

pub(crate) fn timestamp_parts(t: SystemTime) -> Result<(i64, u32)> {
    let out_of_range = || Error::Marshal(format!("timestamp {:?} out of range", t));
    match t.duration_since(UNIX_EPOCH) {
        Ok(after) => {
            let secs = i64::try_from(after.as_secs()).map_err(|_| out_of_range())?;
            Ok((secs, after.subsec_nanos()))
        }
        Err(before) => {
            let before = before.duration();
            let secs = i64::try_from(before.as_secs()).map_err(|_| out_of_range())?;
            match before.subsec_nanos() {
                0 => Ok((-secs, 0)),
                nanos => {
                    let secs = (-secs).checked_sub(1).ok_or_else(out_of_range)?;
                    Ok((secs, 1_000_000_000 - nanos))
                }
            }
        }
    }
}

pub(crate) fn timestamp_from_parts(secs: i64, nanos: u32) -> Result<SystemTime> {
    let t = if secs >= 0 {
        UNIX_EPOCH.checked_add(Duration::new(secs as u64, nanos))
    } else {
        UNIX_EPOCH
            .checked_sub(Duration::from_secs(secs.unsigned_abs()))
            .and_then(|t| t.checked_add(Duration::from_nanos(u64::from(nanos))))
    };
    t.ok_or_else(|| Error::Overflow {
        tag: Tag::Timestamp,
        value: format!("{}s{}ns", secs, nanos),
        target: Kind::Timestamp,
    })
}

fn encode_structure(enc: &mut Encoder, value: &Value, depth: usize) -> Result<()> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }

    match value {
        Value::Null => enc.null()?,
        Value::Bool(b) => enc.bool(*b)?,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                enc.s64(i)?;
            } else if let Some(u) = n.as_u64() {
                enc.u64(u)?;
            } else if let Some(f) = n.as_f64() {
                enc.f64(f)?;
            } else {
                return Err(Error::Marshal(format!("number {} is not representable", n)));
            }
        }
        Value::String(s) => enc.str(s)?,
        Value::Array(items) => {
            enc.list_begin()?;
            for item in items {
                encode_structure(enc, item, depth + 1)?;
            }
            enc.list_end()?;
        }
        Value::Object(fields) => {
            enc.map_begin()?;
            for (key, item) in fields {
                enc.variant_begin(key)?;
                encode_structure(enc, item, depth + 1)?;
                enc.variant_end()?;
            }
            enc.map_end()?;
        }
    }
    Ok(())
}

fn decode_structure(dec: &mut Decoder, depth: usize) -> Result<Value> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }

    let value = match dec.peek_tag()? {
        wirepack::Tag::Null => {
            dec.null()?;
            Value::Null
        }
        wirepack::Tag::BoolTrue | wirepack::Tag::BoolFalse => Value::Bool(dec.bool()?),
        wirepack::Tag::S64 => Value::from(dec.s64()?),
        wirepack::Tag::U64 => Value::from(dec.u64()?),
        wirepack::Tag::F64 => {
            let f = dec.f64()?;
            serde_json::Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| Error::Marshal(format!("non-finite number {} in structure", f)))?
        }
        wirepack::Tag::String => Value::String(dec.str()?.to_string()),
        wirepack::Tag::List => {
            let mut iter = dec.list()?;
            let mut items = Vec::new();
            while let Some(mut item) = iter.next()? {
                items.push(decode_structure(&mut item, depth + 1)?);
            }
            Value::Array(items)
        }
        wirepack::Tag::Map => {
            let mut iter = dec.map()?;
            let mut fields = serde_json::Map::new();
            while let Some((key, mut item)) = iter.next()? {
                fields.insert(key.to_string(), decode_structure(&mut item, depth + 1)?);
            }
            Value::Object(fields)
        }
        other => {
            return Err(Error::ProtocolViolation(format!(
                "{:?} cannot appear inside a structure",
                other
            )));
        }
    };
    Ok(value)
}
