//! # callproto
//!
//! The value and record layer of the orchestration client.
//!
//! ## Architecture
//!
//! Application values cross the boundary as [`Any`]: a closed set of tags
//! plus a wirepack payload. [`box_value`] and [`unbox`] convert values in and
//! out of it by walking a fixed chain of capabilities, so callers never write
//! a schema. The records built on top ([`Call`], [`CallResult`], [`Poll`],
//! [`PollResult`], [`Request`], [`Response`]) are plain values; [`classify`]
//! turns an error into the [`Status`] a `Response` carries, and [`frame`]
//! moves the envelopes as bytes.

mod any;
mod call;
mod codec;
mod envelope;
mod error;
mod poll;
mod status;
mod value;

pub mod frame;

#[cfg(test)]
mod tests;

pub use any::Any;
pub use any::Tag;
pub use call::Call;
pub use call::CallOption;
pub use call::CallResult;
pub use call::CallResultOption;
pub use call::RemoteError;
pub use codec::Boxable;
pub use codec::Json;
pub use codec::Text;
pub use codec::Unboxable;
pub use codec::box_value;
pub use codec::unbox;
pub use envelope::Exit;
pub use envelope::Request;
pub use envelope::RequestDirective;
pub use envelope::Response;
pub use envelope::ResponseDirective;
pub use error::Error;
pub use error::Result;
pub use poll::Poll;
pub use poll::PollResult;
pub use status::Condition;
pub use status::Joined;
pub use status::MAX_DEPTH;
pub use status::Status;
pub use status::StatusError;
pub use status::classify;
pub use value::Kind;
pub use value::Native;
