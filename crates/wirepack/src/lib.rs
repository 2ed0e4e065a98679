//! # Wirepack
//!
//! The byte layout underneath every boxed value payload.
//!
//! ## Philosophy
//!
//! - **One width per kind**: the wire knows a single signed integer (`S64`),
//!   a single unsigned integer (`U64`) and a single float (`F64`). Narrower
//!   types are a concern of whoever decodes, never of the wire.
//! - **TLV Architecture**: `[Tag][Length?][Value]` so readers can skip fields
//!   they do not understand.
//! - **Bounded**: the encoder tracks open scopes explicitly; decoders are
//!   zero-copy, bounds-checked views that never panic on hostile input.
//!
//! ## Format
//!
//! - **Scalars**: `[Tag: 1b][Data: N]`
//! - **Blobs**: `[Tag: 1b][Len: 4b][Data: Len]`
//! - **Containers**: `[Tag: 1b][Len: 4b][Body: Len]`
//!
//! All integers are Little-Endian.

#[cfg(test)]
mod tests;

/// Wirepack encoding and decoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Byte does not correspond to a valid `Tag`.
    InvalidTag(u8),
    /// A valid tag was found where a different one was required.
    UnexpectedTag { expected: Tag, found: Tag },
    /// String data is not valid UTF-8.
    InvalidUtf8,
    /// Nanosecond field outside of its legal range.
    InvalidNanos(i64),
    /// Closing a scope that does not match the innermost open scope.
    ScopeMismatch { expected: Scope, actual: Scope },
    /// Attempted to close a scope when only the root remains.
    ScopeUnderflow,
    /// Attempted to finalize the buffer with open scopes.
    ScopeStillOpen,
    /// Buffer exhausted while reading.
    UnexpectedEnd,
    /// Blob or container length exceeds `u32::MAX`.
    BlobTooLarge(usize),
    /// Attempted to write a second item into an Option or Variant scope.
    TooManyItems(Scope),
    /// Attempted to close an Option or Variant scope without its payload.
    EmptyAdt(Scope),
    /// Attempted to write something other than a Variant directly into a Map.
    InvalidMapEntry,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidTag(b) => write!(f, "invalid tag byte {:#04x}", b),
            Error::UnexpectedTag { expected, found } => {
                write!(f, "expected {:?}, found {:?}", expected, found)
            }
            Error::InvalidUtf8 => write!(f, "string is not valid utf-8"),
            Error::InvalidNanos(n) => write!(f, "nanoseconds out of range: {}", n),
            Error::ScopeMismatch { expected, actual } => {
                write!(f, "scope mismatch: expected {:?}, found {:?}", expected, actual)
            }
            Error::ScopeUnderflow => write!(f, "no open scope to close"),
            Error::ScopeStillOpen => write!(f, "buffer finalized with an open scope"),
            Error::UnexpectedEnd => write!(f, "unexpected end of buffer"),
            Error::BlobTooLarge(n) => write!(f, "blob of {} bytes exceeds u32 length", n),
            Error::TooManyItems(s) => write!(f, "too many items in {:?} scope; expected exactly 1", s),
            Error::EmptyAdt(s) => write!(f, "empty {:?} scope; expected exactly 1 item", s),
            Error::InvalidMapEntry => write!(f, "map entries must be variants"),
        }
    }
}

impl std::error::Error for Error {}

/// Specialized `Result` for wirepack operations.
pub type Result<T> = std::result::Result<T, Error>;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Identifies the type of the encoded item.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Null = 0x00,

    // Fixed-width scalars
    BoolTrue = 0x01,
    BoolFalse = 0x02,
    U64 = 0x03,
    S64 = 0x04,
    F64 = 0x05,
    /// Seconds (s64) and nanoseconds (u32) since the Unix epoch.
    Timestamp = 0x06,
    /// Seconds (s64) and nanoseconds (s32), both carrying the same sign.
    Duration = 0x07,
    OptionNone = 0x08,

    // Blobs (Tag + u32 Len + Bytes)
    String = 0x10,
    Bytes = 0x11,

    // Containers (Tag + u32 Len + Body)
    List = 0x20,
    Map = 0x21,

    // ADTs (Tag + u32 Len + Body)
    OptionSome = 0x30,
    Variant = 0x31,
}

impl Tag {
    /// Returns the Tag for a given byte, or `None` if invalid.
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Tag::Null),
            0x01 => Some(Tag::BoolTrue),
            0x02 => Some(Tag::BoolFalse),
            0x03 => Some(Tag::U64),
            0x04 => Some(Tag::S64),
            0x05 => Some(Tag::F64),
            0x06 => Some(Tag::Timestamp),
            0x07 => Some(Tag::Duration),
            0x08 => Some(Tag::OptionNone),
            0x10 => Some(Tag::String),
            0x11 => Some(Tag::Bytes),
            0x20 => Some(Tag::List),
            0x21 => Some(Tag::Map),
            0x30 => Some(Tag::OptionSome),
            0x31 => Some(Tag::Variant),
            _ => None,
        }
    }

    /// Width of the fixed data following the tag byte, if the tag is a scalar.
    fn fixed_width(self) -> Option<usize> {
        match self {
            Tag::Null | Tag::BoolTrue | Tag::BoolFalse | Tag::OptionNone => Some(0),
            Tag::U64 | Tag::S64 | Tag::F64 => Some(8),
            Tag::Timestamp | Tag::Duration => Some(12),
            _ => None,
        }
    }
}

/// Kinds of scope tracked on the `Encoder` stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The virtual root; allows any number of items.
    Root,
    /// Ordered sequence; allows any number of items.
    List,
    /// Key-Value container; only `Tag::Variant` items.
    Map,
    /// Exactly one item.
    Option,
    /// Exactly one item (the payload) after the name.
    Variant,
}

struct Frame {
    start: usize,
    scope: Scope,
    count: usize,
}

/// A state-machine driven encoder.
///
/// Keeps a stack of open scopes so that structural mistakes are reported at
/// the call that makes them, and back-patches container lengths on close.
///
/// # Structural Invariants
///
/// 1. **Map scopes** accept only Variant items.
/// 2. **Option and Variant scopes** accept exactly one item.
/// 3. The encoder must be back at the root scope to produce bytes.
pub struct Encoder {
    buf: Vec<u8>,
    /// Bottom is always `Scope::Root`.
    stack: Vec<Frame>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// Creates a new encoder.
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(64),
            stack: vec![Frame { start: 0, scope: Scope::Root, count: 0 }],
        }
    }

    /// Consumes the encoder and returns the encoded bytes.
    ///
    /// # Errors
    /// Returns `Error::ScopeStillOpen` if any scope besides the root is open.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if self.stack.len() > 1 {
            return Err(Error::ScopeStillOpen);
        }
        Ok(self.buf)
    }

    fn current_frame(&mut self) -> &mut Frame {
        // The root frame is never popped (see `end_scope`).
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn check_write(&mut self, tag: Tag) -> Result<()> {
        let frame = self.current_frame();
        match frame.scope {
            Scope::Root | Scope::List => Ok(()),
            Scope::Map if tag != Tag::Variant => Err(Error::InvalidMapEntry),
            Scope::Map => Ok(()),
            Scope::Option | Scope::Variant if frame.count >= 1 => Err(Error::TooManyItems(frame.scope)),
            Scope::Option | Scope::Variant => Ok(()),
        }
    }

    fn scalar(&mut self, tag: Tag, data: &[u8]) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(data);
        self.current_frame().count += 1;
        Ok(())
    }

    fn blob(&mut self, tag: Tag, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| Error::BlobTooLarge(data.len()))?;
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(data);
        self.current_frame().count += 1;
        Ok(())
    }

    fn begin_scope(&mut self, tag: Tag, scope: Scope) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&[0, 0, 0, 0]); // length, patched in end_scope
        self.stack.push(Frame { start: self.buf.len(), scope, count: 0 });
        Ok(())
    }

    fn end_scope(&mut self, expected: Scope) -> Result<()> {
        if self.stack.len() <= 1 {
            return Err(Error::ScopeUnderflow);
        }

        let frame = self.current_frame();
        if frame.scope != expected {
            return Err(Error::ScopeMismatch { expected, actual: frame.scope });
        }
        if matches!(frame.scope, Scope::Option | Scope::Variant) && frame.count == 0 {
            return Err(Error::EmptyAdt(frame.scope));
        }

        let start = frame.start;
        let body_len = self.buf.len() - start;
        let len = u32::try_from(body_len).map_err(|_| Error::BlobTooLarge(body_len))?;
        self.buf[start - 4..start].copy_from_slice(&len.to_le_bytes());

        self.stack.pop();
        self.current_frame().count += 1;
        Ok(())
    }

    /// Encodes the null marker.
    pub fn null(&mut self) -> Result<()> { self.scalar(Tag::Null, &[]) }

    /// Encodes a boolean.
    pub fn bool(&mut self, v: bool) -> Result<()> {
        self.scalar(if v { Tag::BoolTrue } else { Tag::BoolFalse }, &[])
    }

    /// Encodes an unsigned 64-bit integer.
    pub fn u64(&mut self, v: u64) -> Result<()> { self.scalar(Tag::U64, &v.to_le_bytes()) }
    /// Encodes a signed 64-bit integer.
    pub fn s64(&mut self, v: i64) -> Result<()> { self.scalar(Tag::S64, &v.to_le_bytes()) }
    /// Encodes a 64-bit float.
    pub fn f64(&mut self, v: f64) -> Result<()> { self.scalar(Tag::F64, &v.to_le_bytes()) }

    /// Encodes a point in time as seconds and nanoseconds since the Unix epoch.
    ///
    /// Instants before the epoch carry negative seconds and positive nanos.
    pub fn timestamp(&mut self, secs: i64, nanos: u32) -> Result<()> {
        if i64::from(nanos) >= NANOS_PER_SEC {
            return Err(Error::InvalidNanos(i64::from(nanos)));
        }
        let mut data = [0u8; 12];
        data[..8].copy_from_slice(&secs.to_le_bytes());
        data[8..].copy_from_slice(&nanos.to_le_bytes());
        self.scalar(Tag::Timestamp, &data)
    }

    /// Encodes a signed span of time.
    pub fn duration(&mut self, secs: i64, nanos: i32) -> Result<()> {
        let n = i64::from(nanos);
        if n.abs() >= NANOS_PER_SEC || (secs > 0 && n < 0) || (secs < 0 && n > 0) {
            return Err(Error::InvalidNanos(n));
        }
        let mut data = [0u8; 12];
        data[..8].copy_from_slice(&secs.to_le_bytes());
        data[8..].copy_from_slice(&nanos.to_le_bytes());
        self.scalar(Tag::Duration, &data)
    }

    /// Encodes `Option::None`.
    pub fn option_none(&mut self) -> Result<()> { self.scalar(Tag::OptionNone, &[]) }

    /// Encodes a UTF-8 string blob.
    pub fn str(&mut self, v: &str) -> Result<()> { self.blob(Tag::String, v.as_bytes()) }

    /// Encodes a raw byte blob.
    pub fn bytes(&mut self, v: &[u8]) -> Result<()> { self.blob(Tag::Bytes, v) }

    /// Begins a List. Any number of items; close with `list_end()`.
    pub fn list_begin(&mut self) -> Result<()> { self.begin_scope(Tag::List, Scope::List) }
    /// Ends a List.
    pub fn list_end(&mut self) -> Result<()> { self.end_scope(Scope::List) }

    /// Begins a Map. Only `variant_begin()` entries; close with `map_end()`.
    pub fn map_begin(&mut self) -> Result<()> { self.begin_scope(Tag::Map, Scope::Map) }
    /// Ends a Map.
    pub fn map_end(&mut self) -> Result<()> { self.end_scope(Scope::Map) }

    /// Begins an `Option::Some`. Exactly one item; close with `option_some_end()`.
    pub fn option_some_begin(&mut self) -> Result<()> { self.begin_scope(Tag::OptionSome, Scope::Option) }
    /// Ends an `Option::Some`.
    pub fn option_some_end(&mut self) -> Result<()> { self.end_scope(Scope::Option) }

    /// Begins a named payload.
    ///
    /// The name is written immediately; exactly one payload item must follow
    /// before `variant_end()`.
    pub fn variant_begin(&mut self, name: &str) -> Result<()> {
        self.begin_scope(Tag::Variant, Scope::Variant)?;
        self.blob(Tag::String, name.as_bytes())?;
        // The name is metadata, not the payload.
        self.current_frame().count = 0;
        Ok(())
    }
    /// Ends a Variant.
    pub fn variant_end(&mut self) -> Result<()> { self.end_scope(Scope::Variant) }
}

/// A zero-copy, bounds-checked cursor over a byte slice.
///
/// Reading advances the cursor. Container reads return new decoders
/// restricted to the container body.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over the slice.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Returns true once every byte has been read.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Peeks the next Tag without advancing.
    pub fn peek_tag(&self) -> Result<Tag> {
        let b = *self.buf.first().ok_or(Error::UnexpectedEnd)?;
        Tag::from_u8(b).ok_or(Error::InvalidTag(b))
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() {
            return Err(Error::UnexpectedEnd);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn read_len(&mut self) -> Result<usize> {
        Ok(u32::from_le_bytes(self.read_array()?) as usize)
    }

    fn expect_tag(&mut self, expected: Tag) -> Result<()> {
        let found = self.peek_tag()?;
        if found != expected {
            return Err(Error::UnexpectedTag { expected, found });
        }
        self.read_bytes(1)?;
        Ok(())
    }

    /// Skips the next item and everything nested inside it.
    pub fn skip(&mut self) -> Result<()> {
        let tag = self.peek_tag()?;
        self.read_bytes(1)?;
        match tag.fixed_width() {
            Some(width) => { self.read_bytes(width)?; }
            None => {
                let len = self.read_len()?;
                self.read_bytes(len)?;
            }
        }
        Ok(())
    }

    /// Decodes the null marker.
    pub fn null(&mut self) -> Result<()> { self.expect_tag(Tag::Null) }

    /// Decodes a bool.
    pub fn bool(&mut self) -> Result<bool> {
        match self.peek_tag()? {
            Tag::BoolTrue => { self.read_bytes(1)?; Ok(true) }
            Tag::BoolFalse => { self.read_bytes(1)?; Ok(false) }
            found => Err(Error::UnexpectedTag { expected: Tag::BoolTrue, found }),
        }
    }

    /// Decodes an unsigned 64-bit integer.
    pub fn u64(&mut self) -> Result<u64> { self.expect_tag(Tag::U64)?; Ok(u64::from_le_bytes(self.read_array()?)) }
    /// Decodes a signed 64-bit integer.
    pub fn s64(&mut self) -> Result<i64> { self.expect_tag(Tag::S64)?; Ok(i64::from_le_bytes(self.read_array()?)) }
    /// Decodes a 64-bit float.
    pub fn f64(&mut self) -> Result<f64> { self.expect_tag(Tag::F64)?; Ok(f64::from_le_bytes(self.read_array()?)) }

    /// Decodes a timestamp as `(seconds, nanos)` since the Unix epoch.
    pub fn timestamp(&mut self) -> Result<(i64, u32)> {
        self.expect_tag(Tag::Timestamp)?;
        let secs = i64::from_le_bytes(self.read_array()?);
        let nanos = u32::from_le_bytes(self.read_array()?);
        if i64::from(nanos) >= NANOS_PER_SEC {
            return Err(Error::InvalidNanos(i64::from(nanos)));
        }
        Ok((secs, nanos))
    }

    /// Decodes a signed duration as `(seconds, nanos)`.
    pub fn duration(&mut self) -> Result<(i64, i32)> {
        self.expect_tag(Tag::Duration)?;
        let secs = i64::from_le_bytes(self.read_array()?);
        let nanos = i32::from_le_bytes(self.read_array()?);
        let n = i64::from(nanos);
        if n.abs() >= NANOS_PER_SEC || (secs > 0 && n < 0) || (secs < 0 && n > 0) {
            return Err(Error::InvalidNanos(n));
        }
        Ok((secs, nanos))
    }

    /// Decodes `Option::None`.
    pub fn option_none(&mut self) -> Result<()> { self.expect_tag(Tag::OptionNone) }

    /// Decodes a string slice.
    pub fn str(&mut self) -> Result<&'a str> {
        self.expect_tag(Tag::String)?;
        let len = self.read_len()?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    /// Decodes a byte slice.
    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        self.expect_tag(Tag::Bytes)?;
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    fn enter_container(&mut self, expected: Tag) -> Result<Decoder<'a>> {
        self.expect_tag(expected)?;
        let len = self.read_len()?;
        Ok(Decoder::new(self.read_bytes(len)?))
    }

    /// Decodes a List into an iterator over its items.
    pub fn list(&mut self) -> Result<ListIter<'a>> {
        Ok(ListIter { dec: self.enter_container(Tag::List)? })
    }

    /// Decodes a Map into an iterator over its entries.
    pub fn map(&mut self) -> Result<MapIter<'a>> {
        Ok(MapIter { dec: self.enter_container(Tag::Map)? })
    }

    /// Decodes an Option, returning a decoder for the payload if present.
    pub fn option(&mut self) -> Result<Option<Decoder<'a>>> {
        match self.peek_tag()? {
            Tag::OptionNone => { self.read_bytes(1)?; Ok(None) }
            Tag::OptionSome => Ok(Some(self.enter_container(Tag::OptionSome)?)),
            found => Err(Error::UnexpectedTag { expected: Tag::OptionSome, found }),
        }
    }

    /// Decodes a Variant into `(name, payload decoder)`.
    pub fn variant(&mut self) -> Result<(&'a str, Decoder<'a>)> {
        let mut inner = self.enter_container(Tag::Variant)?;
        let name = inner.str()?;
        Ok((name, inner))
    }
}

/// Iterator over the items of a List.
#[derive(Debug)]
pub struct ListIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> ListIter<'a> {
    /// Returns a decoder scoped to the next item, or `None` at the end.
    ///
    /// # Errors
    /// Fails if the next item is truncated or carries an invalid tag.
    pub fn next(&mut self) -> Result<Option<Decoder<'a>>> {
        if self.dec.is_empty() {
            return Ok(None);
        }
        let mut probe = self.dec.clone();
        probe.skip()?;
        let len = self.dec.remaining() - probe.remaining();
        Ok(Some(Decoder::new(self.dec.read_bytes(len)?)))
    }
}

/// Iterator over the `(key, value)` entries of a Map.
#[derive(Debug)]
pub struct MapIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> MapIter<'a> {
    /// Returns the next `(key, value decoder)`, or `None` at the end.
    pub fn next(&mut self) -> Result<Option<(&'a str, Decoder<'a>)>> {
        if self.dec.is_empty() {
            return Ok(None);
        }
        let found = self.dec.peek_tag()?;
        if found != Tag::Variant {
            return Err(Error::UnexpectedTag { expected: Tag::Variant, found });
        }
        Ok(Some(self.dec.variant()?))
    }
}
