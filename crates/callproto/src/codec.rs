//! # Value Codec
//!
//! Converts application values into `Any` and back without a schema.
//!
//! Boxing walks a fixed chain of capabilities, first match wins:
//!
//! 1. null (`Boxable::is_null`) boxes as [`crate::Tag::Empty`].
//! 2. a primitive (`Boxable::native`) boxes under its dedicated tag.
//! 3. a structured form (`Boxable::structured`) boxes as [`crate::Tag::Structure`].
//! 4. a text form (`Boxable::text`) boxes as [`crate::Tag::String`].
//! 5. a binary form (`Boxable::binary`) boxes as [`crate::Tag::Bytes`].
//!
//! An `Any` is already boxed and passes through unchanged. Unboxing mirrors
//! the chain from the target's side; see [`unbox`].

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use std::time::SystemTime;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::any::Any;
use crate::error::Error;
use crate::error::Result;
use crate::value::Kind;
use crate::value::Native;

/// A value that can be boxed.
///
/// Every method is a capability; the defaults mean "not supported". A type
/// normally overrides exactly one of them.
pub trait Boxable {
    /// An already boxed value, passed through unchanged.
    fn boxed(&self) -> Option<&Any> {
        None
    }

    /// True for the null pointer.
    fn is_null(&self) -> bool {
        false
    }

    /// The value as one of the primitive kinds.
    fn native(&self) -> Option<Native> {
        None
    }

    /// A lossless structural tree of the value.
    fn structured(&self) -> Option<Result<Value>> {
        None
    }

    /// A textual form of the value.
    fn text(&self) -> Option<Result<String>> {
        None
    }

    /// A binary form of the value.
    fn binary(&self) -> Option<Result<Vec<u8>>> {
        None
    }
}

/// A type that can be produced from a boxed value.
pub trait Unboxable: Sized {
    /// Describes the target, for primitive matching and error messages.
    fn kind() -> Kind;

    /// Builds the target from a value already narrowed to `kind()`.
    fn from_native(native: Native) -> Option<Self>;

    /// The target's null representation, if it has one.
    fn from_null() -> Option<Self> {
        None
    }

    /// Structured-deserialization capability.
    fn from_structure(_value: &Value) -> Option<Result<Self>> {
        None
    }

    /// Text-deserialization capability.
    fn from_text(_text: &str) -> Option<Result<Self>> {
        None
    }

    /// Binary-deserialization capability.
    fn from_binary(_bytes: &[u8]) -> Option<Result<Self>> {
        None
    }
}

/// Boxes a value.
///
/// # Errors
/// `UnsupportedType` if no capability applies; otherwise whatever the
/// applicable capability reports.
pub fn box_value<T: Boxable + ?Sized>(value: &T) -> Result<Any> {
    if let Some(any) = value.boxed() {
        return Ok(any.clone());
    }
    if value.is_null() {
        return Ok(Any::empty());
    }
    if let Some(native) = value.native() {
        return native.encode();
    }
    if let Some(tree) = value.structured() {
        return Native::Structure(tree?).encode();
    }
    if let Some(text) = value.text() {
        return Native::String(text?).encode();
    }
    if let Some(bytes) = value.binary() {
        return Native::Bytes(bytes?).encode();
    }
    Err(Error::UnsupportedType(std::any::type_name::<T>().to_string()))
}

/// Unboxes a value into `T`.
///
/// 1. The empty tag yields `T`'s null representation, or a mismatch.
/// 2. If the tag's native type is exactly `T`'s kind, it is assigned directly.
/// 3. Structure, string and bytes tags are fed through `T`'s matching
///    deserialization capability, if it has one.
/// 4. Otherwise the value is narrowed to `T`'s primitive kind; values that
///    would truncate or change sign fail with `Overflow`.
/// 5. Anything else is a `TypeMismatch`.
pub fn unbox<T: Unboxable>(any: &Any) -> Result<T> {
    let tag = any.tag();
    let target = T::kind();
    let mismatch = || Error::TypeMismatch { tag, target };

    let native = any.decode()?;
    if let Native::Null = native {
        return T::from_null().ok_or_else(mismatch);
    }
    if target.native_tag() == Some(tag) {
        return T::from_native(native).ok_or_else(mismatch);
    }

    let capability = match &native {
        Native::Structure(tree) => T::from_structure(tree),
        Native::String(text) => T::from_text(text),
        Native::Bytes(bytes) => T::from_binary(bytes),
        _ => None,
    };
    if let Some(result) = capability {
        return result;
    }

    match native.coerce(target)? {
        Some(narrowed) => T::from_native(narrowed).ok_or_else(mismatch),
        None => Err(mismatch()),
    }
}

impl Any {
    /// Boxes `value`; see [`box_value`].
    pub fn new<T: Boxable + ?Sized>(value: &T) -> Result<Self> {
        box_value(value)
    }

    /// Unboxes into `T`; see [`unbox`].
    pub fn unbox<T: Unboxable>(&self) -> Result<T> {
        unbox(self)
    }
}

// ============================================================================
//  PRIMITIVES
// ============================================================================

macro_rules! impl_signed {
    ($($ty:ty),*) => {$(
        impl Boxable for $ty {
            fn native(&self) -> Option<Native> {
                Some(Native::Int(*self as i64))
            }
        }

        impl Unboxable for $ty {
            fn kind() -> Kind {
                Kind::Int(<$ty>::BITS)
            }

            fn from_native(native: Native) -> Option<Self> {
                match native {
                    Native::Int(i) => <$ty>::try_from(i).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($ty:ty),*) => {$(
        impl Boxable for $ty {
            fn native(&self) -> Option<Native> {
                Some(Native::Uint(*self as u64))
            }
        }

        impl Unboxable for $ty {
            fn kind() -> Kind {
                Kind::Uint(<$ty>::BITS)
            }

            fn from_native(native: Native) -> Option<Self> {
                match native {
                    Native::Uint(u) => <$ty>::try_from(u).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64, isize);
impl_unsigned!(u8, u16, u32, u64, usize);

impl Boxable for f32 {
    fn native(&self) -> Option<Native> {
        Some(Native::Double(f64::from(*self)))
    }
}

impl Unboxable for f32 {
    fn kind() -> Kind {
        Kind::Float(32)
    }

    fn from_native(native: Native) -> Option<Self> {
        match native {
            // Range was checked by coerce; only precision is given up here.
            Native::Double(f) => Some(f as f32),
            _ => None,
        }
    }
}

impl Boxable for f64 {
    fn native(&self) -> Option<Native> {
        Some(Native::Double(*self))
    }
}

impl Unboxable for f64 {
    fn kind() -> Kind {
        Kind::Float(64)
    }

    fn from_native(native: Native) -> Option<Self> {
        match native {
            Native::Double(f) => Some(f),
            _ => None,
        }
    }
}

impl Boxable for bool {
    fn native(&self) -> Option<Native> {
        Some(Native::Bool(*self))
    }
}

impl Unboxable for bool {
    fn kind() -> Kind {
        Kind::Bool
    }

    fn from_native(native: Native) -> Option<Self> {
        match native {
            Native::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl Boxable for str {
    fn native(&self) -> Option<Native> {
        Some(Native::String(self.to_string()))
    }
}

impl Boxable for String {
    fn native(&self) -> Option<Native> {
        Some(Native::String(self.clone()))
    }
}

impl Unboxable for String {
    fn kind() -> Kind {
        Kind::String
    }

    fn from_native(native: Native) -> Option<Self> {
        match native {
            Native::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Boxable for [u8] {
    fn native(&self) -> Option<Native> {
        Some(Native::Bytes(self.to_vec()))
    }
}

impl Boxable for Vec<u8> {
    fn native(&self) -> Option<Native> {
        Some(Native::Bytes(self.clone()))
    }
}

impl Unboxable for Vec<u8> {
    fn kind() -> Kind {
        Kind::Bytes
    }

    fn from_native(native: Native) -> Option<Self> {
        match native {
            Native::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl Boxable for SystemTime {
    fn native(&self) -> Option<Native> {
        Some(Native::Timestamp(*self))
    }
}

impl Unboxable for SystemTime {
    fn kind() -> Kind {
        Kind::Timestamp
    }

    fn from_native(native: Native) -> Option<Self> {
        match native {
            Native::Timestamp(t) => Some(t),
            _ => None,
        }
    }
}

impl Boxable for Duration {
    fn native(&self) -> Option<Native> {
        Some(Native::Duration(*self))
    }
}

impl Unboxable for Duration {
    fn kind() -> Kind {
        Kind::Duration
    }

    fn from_native(native: Native) -> Option<Self> {
        match native {
            Native::Duration(d) => Some(d),
            _ => None,
        }
    }
}

// ============================================================================
//  NULLABLES, POINTERS & UNTYPED TARGETS
// ============================================================================

impl Boxable for () {
    fn is_null(&self) -> bool {
        true
    }
}

impl Unboxable for () {
    fn kind() -> Kind {
        Kind::Opaque("()")
    }

    fn from_native(_native: Native) -> Option<Self> {
        None
    }

    fn from_null() -> Option<Self> {
        Some(())
    }
}

impl<T: Boxable> Boxable for Option<T> {
    fn boxed(&self) -> Option<&Any> {
        self.as_ref().and_then(|v| v.boxed())
    }

    fn is_null(&self) -> bool {
        self.as_ref().is_none_or(|v| v.is_null())
    }

    fn native(&self) -> Option<Native> {
        self.as_ref().and_then(|v| v.native())
    }

    fn structured(&self) -> Option<Result<Value>> {
        self.as_ref().and_then(|v| v.structured())
    }

    fn text(&self) -> Option<Result<String>> {
        self.as_ref().and_then(|v| v.text())
    }

    fn binary(&self) -> Option<Result<Vec<u8>>> {
        self.as_ref().and_then(|v| v.binary())
    }
}

/// `None` is the null pointer: the empty tag unboxes to it without
/// consulting `T` at all.
impl<T: Unboxable> Unboxable for Option<T> {
    fn kind() -> Kind {
        T::kind()
    }

    fn from_native(native: Native) -> Option<Self> {
        T::from_native(native).map(Some)
    }

    fn from_null() -> Option<Self> {
        Some(None)
    }

    fn from_structure(value: &Value) -> Option<Result<Self>> {
        T::from_structure(value).map(|r| r.map(Some))
    }

    fn from_text(text: &str) -> Option<Result<Self>> {
        T::from_text(text).map(|r| r.map(Some))
    }

    fn from_binary(bytes: &[u8]) -> Option<Result<Self>> {
        T::from_binary(bytes).map(|r| r.map(Some))
    }
}

macro_rules! impl_boxable_pointer {
    ($($ptr:ty),*) => {$(
        impl<T: Boxable + ?Sized> Boxable for $ptr {
            fn boxed(&self) -> Option<&Any> { (**self).boxed() }
            fn is_null(&self) -> bool { (**self).is_null() }
            fn native(&self) -> Option<Native> { (**self).native() }
            fn structured(&self) -> Option<Result<Value>> { (**self).structured() }
            fn text(&self) -> Option<Result<String>> { (**self).text() }
            fn binary(&self) -> Option<Result<Vec<u8>>> { (**self).binary() }
        }
    )*};
}

impl_boxable_pointer!(&T, Box<T>);

impl Boxable for Any {
    fn boxed(&self) -> Option<&Any> {
        Some(self)
    }
}

impl Boxable for Native {
    fn is_null(&self) -> bool {
        matches!(self, Native::Null)
    }

    fn native(&self) -> Option<Native> {
        Some(self.clone())
    }
}

/// The untyped target: accepts every tag.
impl Unboxable for Native {
    fn kind() -> Kind {
        Kind::Any
    }

    fn from_native(native: Native) -> Option<Self> {
        Some(native)
    }

    fn from_null() -> Option<Self> {
        Some(Native::Null)
    }
}

impl Boxable for Value {
    fn native(&self) -> Option<Native> {
        Some(Native::Structure(self.clone()))
    }
}

impl Unboxable for Value {
    fn kind() -> Kind {
        Kind::Structure
    }

    fn from_native(native: Native) -> Option<Self> {
        match native {
            Native::Structure(v) => Some(v),
            _ => None,
        }
    }

    fn from_null() -> Option<Self> {
        Some(Value::Null)
    }
}

// ============================================================================
//  CAPABILITY ADAPTERS
// ============================================================================

/// Boxes `T` through its serde representation as a structural value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Json<T>(pub T);

impl<T: Serialize> Boxable for Json<T> {
    fn structured(&self) -> Option<Result<Value>> {
        Some(serde_json::to_value(&self.0).map_err(|e| Error::Marshal(e.to_string())))
    }
}

impl<T: DeserializeOwned> Unboxable for Json<T> {
    fn kind() -> Kind {
        Kind::Opaque(std::any::type_name::<T>())
    }

    fn from_native(_native: Native) -> Option<Self> {
        None
    }

    fn from_structure(value: &Value) -> Option<Result<Self>> {
        Some(T::deserialize(value).map(Json).map_err(|e| Error::Marshal(e.to_string())))
    }
}

/// Boxes `T` through `Display` and unboxes it through `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Text<T>(pub T);

impl<T: Display> Boxable for Text<T> {
    fn text(&self) -> Option<Result<String>> {
        Some(Ok(self.0.to_string()))
    }
}

impl<T> Unboxable for Text<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn kind() -> Kind {
        Kind::Opaque(std::any::type_name::<T>())
    }

    fn from_native(_native: Native) -> Option<Self> {
        None
    }

    fn from_text(text: &str) -> Option<Result<Self>> {
        Some(text.parse().map(Text).map_err(|e: T::Err| Error::Marshal(e.to_string())))
    }
}
