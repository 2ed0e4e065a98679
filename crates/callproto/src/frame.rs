//! # Record Frames
//!
//! A byte encoding of `Request` and `Response` over wirepack, for transports
//! and tests that move records as bytes.
//!
//! Every record is a Map of named fields; the envelope is wrapped in a
//! Variant naming it (`"Request"` or `"Response"`).
//!
//! ## Invariants
//! - **Panic Safety**: All decoding paths return `Result`, never panicking on unknown data.
//! - **Forward Compatibility**: Unknown fields are skipped.
//! - **Required fields**: a missing required field is a `ProtocolViolation`;
//!   optional fields are omitted on encode and defaulted on decode.

use std::time::Duration;

use wirepack::Decoder;
use wirepack::Encoder;

use crate::any::Any;
use crate::any::Tag;
use crate::call::Call;
use crate::call::CallOption;
use crate::call::CallResult;
use crate::call::CallResultOption;
use crate::call::RemoteError;
use crate::envelope::Exit;
use crate::envelope::Request;
use crate::envelope::RequestDirective;
use crate::envelope::Response;
use crate::envelope::ResponseDirective;
use crate::error::Error;
use crate::error::Result;
use crate::poll::Poll;
use crate::poll::PollResult;
use crate::status::Status;
use crate::value::timestamp_from_parts;
use crate::value::timestamp_parts;

// ============================================================================
//  ENVELOPES
// ============================================================================

/// Encodes a `Request` frame.
pub fn encode_request(req: &Request) -> Result<Vec<u8>> {
    let mut enc = Encoder::new();
    enc.variant_begin("Request")?;
    enc.map_begin()?;

    field(&mut enc, "function", |e| Ok(e.str(req.function())?))?;
    field(&mut enc, "dispatch_id", |e| Ok(e.str(req.dispatch_id())?))?;
    field(&mut enc, "parent_dispatch_id", |e| Ok(e.str(req.parent_dispatch_id())?))?;
    field(&mut enc, "root_dispatch_id", |e| Ok(e.str(req.root_dispatch_id())?))?;
    if let Some(t) = req.creation_time() {
        field(&mut enc, "creation_time", |e| encode_time(e, t))?;
    }
    if let Some(t) = req.expiration_time() {
        field(&mut enc, "expiration_time", |e| encode_time(e, t))?;
    }
    match req.directive() {
        RequestDirective::Input(input) => field(&mut enc, "input", |e| encode_any(e, input))?,
        RequestDirective::PollResult(result) => {
            field(&mut enc, "poll_result", |e| encode_poll_result(e, result))?
        }
    }

    enc.map_end()?;
    enc.variant_end()?;
    Ok(enc.into_bytes()?)
}

/// Decodes a `Request` frame.
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let mut dec = Decoder::new(bytes);
    let mut body = envelope(&mut dec, "Request")?;

    let mut map = body.map()?;
    let mut function = None;
    let mut directive = None;
    let mut dispatch_id = String::new();
    let mut parent_dispatch_id = String::new();
    let mut root_dispatch_id = String::new();
    let mut creation_time = None;
    let mut expiration_time = None;

    while let Some((key, mut val)) = map.next()? {
        match key {
            "function" => function = Some(val.str()?.to_string()),
            "dispatch_id" => dispatch_id = val.str()?.to_string(),
            "parent_dispatch_id" => parent_dispatch_id = val.str()?.to_string(),
            "root_dispatch_id" => root_dispatch_id = val.str()?.to_string(),
            "creation_time" => creation_time = Some(decode_time(&mut val)?),
            "expiration_time" => expiration_time = Some(decode_time(&mut val)?),
            "input" => directive = Some(RequestDirective::Input(decode_any(&mut val)?)),
            "poll_result" => {
                directive = Some(RequestDirective::PollResult(decode_poll_result(&mut val)?))
            }
            _ => val.skip()?,
        }
    }
    finish(&dec)?;

    let mut req = Request::new(required(function, "function")?, required(directive, "directive")?)
        .with_dispatch_id(dispatch_id)
        .with_parent_dispatch_id(parent_dispatch_id)
        .with_root_dispatch_id(root_dispatch_id);
    if let Some(t) = creation_time {
        req = req.with_creation_time(t);
    }
    if let Some(t) = expiration_time {
        req = req.with_expiration_time(t);
    }
    Ok(req)
}

/// Encodes a `Response` frame.
pub fn encode_response(res: &Response) -> Result<Vec<u8>> {
    let mut enc = Encoder::new();
    enc.variant_begin("Response")?;
    enc.map_begin()?;

    field(&mut enc, "status", |e| Ok(e.u64(res.status().code())?))?;
    match res.directive() {
        ResponseDirective::Exit(exit) => field(&mut enc, "exit", |e| encode_exit(e, exit))?,
        ResponseDirective::Poll(poll) => field(&mut enc, "poll", |e| encode_poll(e, poll))?,
    }

    enc.map_end()?;
    enc.variant_end()?;
    Ok(enc.into_bytes()?)
}

/// Decodes a `Response` frame.
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let mut dec = Decoder::new(bytes);
    let mut body = envelope(&mut dec, "Response")?;

    let mut map = body.map()?;
    let mut status = None;
    let mut directive = None;

    while let Some((key, mut val)) = map.next()? {
        match key {
            "status" => status = Some(Status::from_code(val.u64()?)),
            "exit" => directive = Some(ResponseDirective::Exit(decode_exit(&mut val)?)),
            "poll" => directive = Some(ResponseDirective::Poll(decode_poll(&mut val)?)),
            _ => val.skip()?,
        }
    }
    finish(&dec)?;

    Ok(Response::new(required(status, "status")?, required(directive, "directive")?))
}

fn envelope<'a>(dec: &mut Decoder<'a>, expected: &str) -> Result<Decoder<'a>> {
    let (name, body) = dec.variant()?;
    if name != expected {
        return Err(Error::UnknownVariant(format!("expected {} frame, found {}", expected, name)));
    }
    Ok(body)
}

fn finish(dec: &Decoder<'_>) -> Result<()> {
    if dec.is_empty() {
        Ok(())
    } else {
        Err(Error::ProtocolViolation(format!("{} trailing bytes after frame", dec.remaining())))
    }
}

// ============================================================================
//  RECORDS
// ============================================================================

fn encode_any(enc: &mut Encoder, any: &Any) -> Result<()> {
    enc.map_begin()?;
    field(enc, "tag", |e| Ok(e.u64(any.tag().code())?))?;
    field(enc, "payload", |e| Ok(e.bytes(any.payload())?))?;
    enc.map_end()?;
    Ok(())
}

fn decode_any(dec: &mut Decoder<'_>) -> Result<Any> {
    let mut map = dec.map()?;
    let mut tag = None;
    let mut payload = None;
    while let Some((key, mut val)) = map.next()? {
        match key {
            "tag" => tag = Some(Tag::from_code(val.u64()?)?),
            "payload" => payload = Some(val.bytes()?.to_vec()),
            _ => val.skip()?,
        }
    }
    Ok(Any::from_parts(required(tag, "tag")?, required(payload, "payload")?))
}

fn encode_call(enc: &mut Encoder, call: &Call) -> Result<()> {
    enc.map_begin()?;
    field(enc, "endpoint", |e| Ok(e.str(call.endpoint())?))?;
    field(enc, "function", |e| Ok(e.str(call.function())?))?;
    field(enc, "input", |e| encode_any(e, call.input()))?;
    field(enc, "correlation_id", |e| Ok(e.u64(call.correlation_id())?))?;
    field(enc, "expiration", |e| encode_duration(e, call.expiration()))?;
    field(enc, "version", |e| Ok(e.str(call.version())?))?;
    enc.map_end()?;
    Ok(())
}

fn decode_call(dec: &mut Decoder<'_>) -> Result<Call> {
    let mut map = dec.map()?;
    let mut endpoint = String::new();
    let mut function = None;
    let mut input = Any::empty();
    let mut options = Vec::new();
    while let Some((key, mut val)) = map.next()? {
        match key {
            "endpoint" => endpoint = val.str()?.to_string(),
            "function" => function = Some(val.str()?.to_string()),
            "input" => input = decode_any(&mut val)?,
            "correlation_id" => options.push(CallOption::CorrelationId(val.u64()?)),
            "expiration" => options.push(CallOption::Expiration(decode_duration(&mut val)?)),
            "version" => options.push(CallOption::Version(val.str()?.to_string())),
            _ => val.skip()?,
        }
    }
    Ok(Call::new(endpoint, required(function, "call function")?, input).with(options))
}

fn encode_call_result(enc: &mut Encoder, result: &CallResult) -> Result<()> {
    enc.map_begin()?;
    field(enc, "correlation_id", |e| Ok(e.u64(result.correlation_id())?))?;
    if let Some(output) = result.output_value() {
        field(enc, "output", |e| encode_any(e, output))?;
    }
    if let Some(error) = result.error_value() {
        field(enc, "error", |e| encode_remote_error(e, error))?;
    }
    field(enc, "dispatch_id", |e| Ok(e.str(result.dispatch_id())?))?;
    enc.map_end()?;
    Ok(())
}

fn decode_call_result(dec: &mut Decoder<'_>) -> Result<CallResult> {
    let mut map = dec.map()?;
    let mut options = Vec::new();
    while let Some((key, mut val)) = map.next()? {
        match key {
            "correlation_id" => options.push(CallResultOption::CorrelationId(val.u64()?)),
            "output" => options.push(CallResultOption::Output(decode_any(&mut val)?)),
            "error" => options.push(CallResultOption::Error(decode_remote_error(&mut val)?)),
            "dispatch_id" => options.push(CallResultOption::DispatchId(val.str()?.to_string())),
            _ => val.skip()?,
        }
    }
    Ok(CallResult::default().with(options))
}

fn encode_remote_error(enc: &mut Encoder, error: &RemoteError) -> Result<()> {
    enc.map_begin()?;
    field(enc, "kind", |e| Ok(e.str(error.kind())?))?;
    field(enc, "message", |e| Ok(e.str(error.message())?))?;
    if let Some(value) = error.value() {
        field(enc, "value", |e| Ok(e.bytes(value)?))?;
    }
    if let Some(traceback) = error.traceback() {
        field(enc, "traceback", |e| Ok(e.bytes(traceback)?))?;
    }
    enc.map_end()?;
    Ok(())
}

fn decode_remote_error(dec: &mut Decoder<'_>) -> Result<RemoteError> {
    let mut map = dec.map()?;
    let mut kind = String::new();
    let mut message = String::new();
    let mut value = None;
    let mut traceback = None;
    while let Some((key, mut val)) = map.next()? {
        match key {
            "kind" => kind = val.str()?.to_string(),
            "message" => message = val.str()?.to_string(),
            "value" => value = Some(val.bytes()?.to_vec()),
            "traceback" => traceback = Some(val.bytes()?.to_vec()),
            _ => val.skip()?,
        }
    }

    let mut error = RemoteError::new(kind, message);
    if let Some(value) = value {
        error = error.with_value(value);
    }
    if let Some(traceback) = traceback {
        error = error.with_traceback(traceback);
    }
    Ok(error)
}

fn encode_poll(enc: &mut Encoder, poll: &Poll) -> Result<()> {
    enc.map_begin()?;
    field(enc, "min_results", |e| Ok(e.u64(u64::from(poll.min_results()))?))?;
    field(enc, "max_results", |e| Ok(e.u64(u64::from(poll.max_results()))?))?;
    field(enc, "max_wait", |e| encode_duration(e, poll.max_wait()))?;
    field(enc, "calls", |e| {
        e.list_begin()?;
        for call in poll.calls() {
            encode_call(e, call)?;
        }
        Ok(e.list_end()?)
    })?;
    field(enc, "coroutine_state", |e| encode_any(e, poll.coroutine_state()))?;
    enc.map_end()?;
    Ok(())
}

fn decode_poll(dec: &mut Decoder<'_>) -> Result<Poll> {
    let mut map = dec.map()?;
    let mut min_results = None;
    let mut max_results = None;
    let mut max_wait = None;
    let mut calls = Vec::new();
    let mut state = Any::empty();
    while let Some((key, mut val)) = map.next()? {
        match key {
            "min_results" => min_results = Some(decode_count(&mut val, "min_results")?),
            "max_results" => max_results = Some(decode_count(&mut val, "max_results")?),
            "max_wait" => max_wait = Some(decode_duration(&mut val)?),
            "calls" => {
                let mut items = val.list()?;
                while let Some(mut item) = items.next()? {
                    calls.push(decode_call(&mut item)?);
                }
            }
            "coroutine_state" => state = decode_any(&mut val)?,
            _ => val.skip()?,
        }
    }

    Ok(Poll::new(
        required(min_results, "min_results")?,
        required(max_results, "max_results")?,
        required(max_wait, "max_wait")?,
    )
    .with_calls(calls)
    .with_coroutine_state(state))
}

fn encode_poll_result(enc: &mut Encoder, result: &PollResult) -> Result<()> {
    enc.map_begin()?;
    field(enc, "results", |e| {
        e.list_begin()?;
        for r in result.results() {
            encode_call_result(e, r)?;
        }
        Ok(e.list_end()?)
    })?;
    field(enc, "coroutine_state", |e| encode_any(e, result.coroutine_state()))?;
    if let Some(error) = result.error() {
        field(enc, "error", |e| encode_remote_error(e, error))?;
    }
    enc.map_end()?;
    Ok(())
}

fn decode_poll_result(dec: &mut Decoder<'_>) -> Result<PollResult> {
    let mut map = dec.map()?;
    let mut results = Vec::new();
    let mut state = Any::empty();
    let mut error = None;
    while let Some((key, mut val)) = map.next()? {
        match key {
            "results" => {
                let mut items = val.list()?;
                while let Some(mut item) = items.next()? {
                    results.push(decode_call_result(&mut item)?);
                }
            }
            "coroutine_state" => state = decode_any(&mut val)?,
            "error" => error = Some(decode_remote_error(&mut val)?),
            _ => val.skip()?,
        }
    }

    let result = PollResult::new(state).with_results(results);
    Ok(match error {
        Some(error) => result.with_error(error),
        None => result,
    })
}

fn encode_exit(enc: &mut Encoder, exit: &Exit) -> Result<()> {
    enc.map_begin()?;
    field(enc, "result", |e| encode_call_result(e, exit.result()))?;
    if let Some(call) = exit.tail_call() {
        field(enc, "tail_call", |e| encode_call(e, call))?;
    }
    enc.map_end()?;
    Ok(())
}

fn decode_exit(dec: &mut Decoder<'_>) -> Result<Exit> {
    let mut map = dec.map()?;
    let mut result = None;
    let mut tail_call = None;
    while let Some((key, mut val)) = map.next()? {
        match key {
            "result" => result = Some(decode_call_result(&mut val)?),
            "tail_call" => tail_call = Some(decode_call(&mut val)?),
            _ => val.skip()?,
        }
    }

    let exit = Exit::new(required(result, "exit result")?);
    Ok(match tail_call {
        Some(call) => exit.with_tail_call(call),
        None => exit,
    })
}

// ============================================================================
//  HELPERS
// ============================================================================

fn field(enc: &mut Encoder, name: &str, body: impl FnOnce(&mut Encoder) -> Result<()>) -> Result<()> {
    enc.variant_begin(name)?;
    body(enc)?;
    enc.variant_end()?;
    Ok(())
}

fn required<T>(value: Option<T>, name: &str) -> Result<T> {
    value.ok_or_else(|| Error::ProtocolViolation(format!("missing {}", name)))
}

fn encode_time(enc: &mut Encoder, t: std::time::SystemTime) -> Result<()> {
    let (secs, nanos) = timestamp_parts(t)?;
    Ok(enc.timestamp(secs, nanos)?)
}

fn decode_time(dec: &mut Decoder<'_>) -> Result<std::time::SystemTime> {
    let (secs, nanos) = dec.timestamp()?;
    timestamp_from_parts(secs, nanos)
}

fn encode_duration(enc: &mut Encoder, d: Duration) -> Result<()> {
    let secs = i64::try_from(d.as_secs())
        .map_err(|_| Error::Marshal(format!("duration {:?} out of range", d)))?;
    // subsec_nanos is below one billion, which always fits an i32.
    Ok(enc.duration(secs, d.subsec_nanos() as i32)?)
}

fn decode_duration(dec: &mut Decoder<'_>) -> Result<Duration> {
    let (secs, nanos) = dec.duration()?;
    if secs < 0 || nanos < 0 {
        return Err(Error::ProtocolViolation(format!("negative duration {}s{}ns", secs, nanos)));
    }
    Ok(Duration::new(secs as u64, nanos as u32))
}

fn decode_count(dec: &mut Decoder<'_>, name: &str) -> Result<u32> {
    let n = dec.u64()?;
    u32::try_from(n).map_err(|_| Error::ProtocolViolation(format!("{} {} out of range", name, n)))
}
