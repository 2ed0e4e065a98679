use std::error::Error as StdError;
use std::net::Ipv4Addr;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use wirepack::Encoder;

use crate::*;

// ============================================================================
//  BOXING PRIMITIVES
// ============================================================================

#[test]
fn test_primitive_roundtrip() -> Result<()> {
    assert_eq!(Any::new(&0i8)?.unbox::<i8>()?, 0);
    assert_eq!(Any::new(&-128i8)?.unbox::<i8>()?, -128);
    assert_eq!(Any::new(&127i8)?.unbox::<i8>()?, 127);
    assert_eq!(Any::new(&i64::MIN)?.unbox::<i64>()?, i64::MIN);
    assert_eq!(Any::new(&u64::MAX)?.unbox::<u64>()?, u64::MAX);
    assert_eq!(Any::new(&usize::MAX)?.unbox::<usize>()?, usize::MAX);
    assert_eq!(Any::new(&-0.25f64)?.unbox::<f64>()?, -0.25);
    assert_eq!(Any::new(&1.5f32)?.unbox::<f32>()?, 1.5);
    assert!(Any::new(&true)?.unbox::<bool>()?);
    assert_eq!(Any::new("hello")?.unbox::<String>()?, "hello");
    assert_eq!(Any::new(&vec![1u8, 2, 3])?.unbox::<Vec<u8>>()?, vec![1, 2, 3]);
    assert_eq!(Any::new(&Duration::new(3, 5))?.unbox::<Duration>()?, Duration::new(3, 5));
    Ok(())
}

#[test]
fn test_every_width_boxes_as_64_bits() -> Result<()> {
    assert_eq!(Any::new(&7i8)?, Any::new(&7i64)?);
    assert_eq!(Any::new(&7u16)?, Any::new(&7u64)?);
    assert_eq!(Any::new(&0.5f32)?, Any::new(&0.5f64)?);
    assert_eq!(Any::new(&7i32)?.tag(), Tag::Int);
    assert_eq!(Any::new(&7u32)?.tag(), Tag::Uint);
    assert_eq!(Any::new(&0.5f32)?.tag(), Tag::Double);
    Ok(())
}

#[test]
fn test_timestamps_before_and_after_epoch() -> Result<()> {
    let after = UNIX_EPOCH + Duration::new(1_700_000_000, 123);
    let before = UNIX_EPOCH - Duration::new(5, 250);
    assert_eq!(Any::new(&after)?.unbox::<SystemTime>()?, after);
    assert_eq!(Any::new(&before)?.unbox::<SystemTime>()?, before);
    assert_eq!(Any::new(&UNIX_EPOCH)?.unbox::<SystemTime>()?, UNIX_EPOCH);
    Ok(())
}

// ============================================================================
//  NARROWING
// ============================================================================

#[test]
fn test_signed_overflow_boundaries() -> Result<()> {
    assert_eq!(Any::new(&127i64)?.unbox::<i8>()?, 127);
    assert_eq!(Any::new(&-128i64)?.unbox::<i8>()?, -128);

    let err = Any::new(&128i64)?.unbox::<i8>().unwrap_err();
    assert_eq!(err, Error::Overflow { tag: Tag::Int, value: "128".into(), target: Kind::Int(8) });
    assert_eq!(err.to_string(), "cannot unbox int64 of 128 into i8: overflow");

    let err = Any::new(&-129i64)?.unbox::<i8>().unwrap_err();
    assert_eq!(err.to_string(), "cannot unbox int64 of -129 into i8: overflow");
    Ok(())
}

#[test]
fn test_unsigned_and_float_overflow() -> Result<()> {
    assert_eq!(Any::new(&255u64)?.unbox::<u8>()?, 255);
    let err = Any::new(&256u64)?.unbox::<u8>().unwrap_err();
    assert_eq!(err.to_string(), "cannot unbox uint64 of 256 into u8: overflow");

    let err = Any::new(&1e300f64)?.unbox::<f32>().unwrap_err();
    assert!(matches!(err, Error::Overflow { tag: Tag::Double, target: Kind::Float(32), .. }));
    Ok(())
}

#[test]
fn test_mismatch_names_tag_and_kind() -> Result<()> {
    let err = Any::new(&1u64)?.unbox::<i64>().unwrap_err();
    assert_eq!(err, Error::TypeMismatch { tag: Tag::Uint, target: Kind::Int(64) });
    assert_eq!(err.to_string(), "cannot unbox uint64 into i64: type mismatch");

    let err = Any::new("x")?.unbox::<bool>().unwrap_err();
    assert_eq!(err.to_string(), "cannot unbox string into bool: type mismatch");
    Ok(())
}

// ============================================================================
//  NULL HANDLING
// ============================================================================

#[test]
fn test_null_pointer_roundtrip() -> Result<()> {
    let none: Option<i32> = None;
    let boxed = Any::new(&none)?;
    assert!(boxed.is_empty());
    assert_eq!(boxed.unbox::<Option<i32>>()?, None);
    assert_eq!(boxed.unbox::<Native>()?, Native::Null);
    assert_eq!(boxed.unbox::<Value>()?, Value::Null);
    assert_eq!(boxed.unbox::<Option<Json<Point>>>()?, None);
    assert_eq!(Any::new(&())?, Any::empty());

    let some = Any::new(&Some(5i32))?;
    assert_eq!(some.unbox::<Option<i32>>()?, Some(5));
    Ok(())
}

#[test]
fn test_null_into_non_nullable_is_mismatch() {
    let err = Any::empty().unbox::<i32>().unwrap_err();
    assert_eq!(err, Error::TypeMismatch { tag: Tag::Empty, target: Kind::Int(32) });
}

#[test]
fn test_untyped_target_accepts_every_tag() -> Result<()> {
    assert_eq!(Any::new(&7u16)?.unbox::<Native>()?, Native::Uint(7));
    assert_eq!(Any::new("s")?.unbox::<Native>()?, Native::String("s".into()));
    assert_eq!(Any::new(&json!([1, "a"]))?.unbox::<Native>()?, Native::Structure(json!([1, "a"])));
    Ok(())
}

// ============================================================================
//  CAPABILITIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Point {
    x: i64,
    y: i64,
    label: String,
}

#[test]
fn test_structured_capability() -> Result<()> {
    let p = Point { x: 1, y: -2, label: "origin".into() };
    let boxed = Any::new(&Json(p.clone()))?;
    assert_eq!(boxed.tag(), Tag::Structure);
    assert_eq!(boxed.unbox::<Json<Point>>()?.0, p);
    assert_eq!(boxed.unbox::<Value>()?, json!({"label": "origin", "x": 1, "y": -2}));
    Ok(())
}

#[test]
fn test_structured_capability_reports_bad_shape() -> Result<()> {
    let err = Any::new(&json!({"x": 1}))?.unbox::<Json<Point>>().unwrap_err();
    assert!(matches!(err, Error::Marshal(_)));
    Ok(())
}

#[test]
fn test_text_capability() -> Result<()> {
    let boxed = Any::new(&Text(Ipv4Addr::LOCALHOST))?;
    assert_eq!(boxed.tag(), Tag::String);
    assert_eq!(boxed.unbox::<String>()?, "127.0.0.1");
    assert_eq!(boxed.unbox::<Text<Ipv4Addr>>()?.0, Ipv4Addr::LOCALHOST);

    let err = Any::new("not an address")?.unbox::<Text<Ipv4Addr>>().unwrap_err();
    assert!(matches!(err, Error::Marshal(_)));
    Ok(())
}

#[derive(Debug, PartialEq)]
struct Pair(u8, u8);

impl Boxable for Pair {
    fn binary(&self) -> Option<Result<Vec<u8>>> {
        Some(Ok(vec![self.0, self.1]))
    }
}

impl Unboxable for Pair {
    fn kind() -> Kind {
        Kind::Opaque("Pair")
    }

    fn from_native(_native: Native) -> Option<Self> {
        None
    }

    fn from_binary(bytes: &[u8]) -> Option<Result<Self>> {
        Some(match bytes {
            [a, b] => Ok(Pair(*a, *b)),
            _ => Err(Error::Marshal(format!("pair needs 2 bytes, got {}", bytes.len()))),
        })
    }
}

#[test]
fn test_binary_capability() -> Result<()> {
    let boxed = Any::new(&Pair(4, 2))?;
    assert_eq!(boxed.tag(), Tag::Bytes);
    assert_eq!(boxed.unbox::<Pair>()?, Pair(4, 2));

    let err = Any::new(&7i64)?.unbox::<Pair>().unwrap_err();
    assert_eq!(err.to_string(), "cannot unbox int64 into Pair: type mismatch");
    Ok(())
}

struct Both;

impl Boxable for Both {
    fn structured(&self) -> Option<Result<Value>> {
        Some(Ok(json!({"via": "structure"})))
    }

    fn text(&self) -> Option<Result<String>> {
        Some(Ok("via text".into()))
    }
}

struct Nothing;

impl Boxable for Nothing {}

#[test]
fn test_capability_order() -> Result<()> {
    assert_eq!(Any::new(&Both)?.tag(), Tag::Structure);

    let err = Any::new(&Nothing).unwrap_err();
    assert!(matches!(err, Error::UnsupportedType(_)));
    assert!(err.to_string().starts_with("cannot box value of type "));
    assert!(err.to_string().ends_with("Nothing: unsupported type"));
    Ok(())
}

#[test]
fn test_boxed_value_passes_through() -> Result<()> {
    let boxed = Any::new(&42u8)?;
    assert_eq!(Any::new(&boxed)?, boxed);
    assert_eq!(Any::new(&Some(boxed.clone()))?, boxed);
    Ok(())
}

// ============================================================================
//  MALFORMED PAYLOADS
// ============================================================================

#[test]
fn test_structure_depth_limit() {
    let mut v = Value::Null;
    for _ in 0..70 {
        v = Value::Array(vec![v]);
    }
    assert_eq!(Any::new(&v).unwrap_err(), Error::RecursionLimitExceeded);
}

#[test]
fn test_negative_wire_duration_overflows() -> Result<()> {
    let mut enc = Encoder::new();
    enc.duration(-1, 0)?;
    let any = Any::from_parts(Tag::Duration, enc.into_bytes()?);
    let err = any.unbox::<Duration>().unwrap_err();
    assert!(matches!(err, Error::Overflow { tag: Tag::Duration, target: Kind::Duration, .. }));
    Ok(())
}

#[test]
fn test_payload_must_match_tag() -> Result<()> {
    let mut enc = Encoder::new();
    enc.s64(1)?;
    enc.s64(2)?;
    let trailing = Any::from_parts(Tag::Int, enc.into_bytes()?);
    assert!(matches!(trailing.unbox::<i64>(), Err(Error::ProtocolViolation(_))));

    let wrong = Any::from_parts(Tag::Bool, Any::new(&1i64)?.payload().to_vec());
    assert!(matches!(wrong.unbox::<bool>(), Err(Error::Wire(_))));
    Ok(())
}

// ============================================================================
//  STATUS CLASSIFICATION
// ============================================================================

#[derive(Debug)]
struct Wrap(Box<dyn StdError + Send + Sync>);

impl std::fmt::Display for Wrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wrapped: {}", self.0)
    }
}

impl StdError for Wrap {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.0.as_ref())
    }
}

fn wrapped(times: usize, inner: impl StdError + Send + Sync + 'static) -> Box<dyn StdError + Send + Sync> {
    let mut err: Box<dyn StdError + Send + Sync> = Box::new(inner);
    for _ in 0..times {
        err = Box::new(Wrap(err));
    }
    err
}

#[test]
fn test_classify_rules() {
    use std::io::Error as IoError;
    use std::io::ErrorKind;

    assert_eq!(classify(&Condition::DeadlineExceeded), Status::Timeout);
    assert_eq!(classify(&Condition::NotFound("fn".into())), Status::NotFound);
    assert_eq!(classify(&Condition::Cancelled), Status::TemporaryError);
    assert_eq!(classify(&Condition::DnsLookup("example.com".into())), Status::DNSError);
    assert_eq!(classify(&Condition::TlsVerification("expired".into())), Status::TLSError);
    assert_eq!(classify(&Condition::UnexpectedEof), Status::TemporaryError);
    assert_eq!(classify(&IoError::from(ErrorKind::TimedOut)), Status::Timeout);
    assert_eq!(classify(&IoError::from(ErrorKind::PermissionDenied)), Status::PermissionDenied);
    assert_eq!(classify(&IoError::from(ErrorKind::ConnectionRefused)), Status::TCPError);
    assert_eq!(classify(&IoError::from(ErrorKind::UnexpectedEof)), Status::TemporaryError);
    assert_eq!(classify(&IoError::other("boom")), Status::Unspecified);

    let json_err = serde_json::from_str::<Value>("{").unwrap_err();
    assert_eq!(classify(&json_err), Status::InvalidResponse);
    assert_eq!(classify(&wirepack::Error::UnexpectedEnd), Status::InvalidResponse);
}

#[test]
fn test_classify_every_condition() {
    let cases = [
        (Condition::Cancelled, Status::TemporaryError),
        (Condition::DeadlineExceeded, Status::Timeout),
        (Condition::NotFound("fn".into()), Status::NotFound),
        (Condition::PermissionDenied("bucket".into()), Status::PermissionDenied),
        (Condition::ConnectionReset, Status::TCPError),
        (Condition::ConnectionRefused, Status::TCPError),
        (Condition::DnsLookup("example.com".into()), Status::DNSError),
        (Condition::TlsVerification("expired".into()), Status::TLSError),
        (Condition::MalformedResponse("truncated json".into()), Status::InvalidResponse),
        (Condition::UnexpectedEof, Status::TemporaryError),
    ];
    for (condition, status) in cases {
        assert_eq!(classify(wrapped(2, condition.clone()).as_ref()), status, "{:?}", condition);
        assert_eq!(classify(&condition), status, "{:?}", condition);
    }
}

#[test]
fn test_classify_explicit_status_wins() {
    let err = StatusError::new(Status::Throttled, Condition::DeadlineExceeded);
    assert_eq!(classify(&err), Status::Throttled);
    assert_eq!(classify(wrapped(2, err).as_ref()), Status::Throttled);
}

#[test]
fn test_classify_aggregates() {
    let agree = Joined::join(vec![Condition::DeadlineExceeded, Condition::DeadlineExceeded]);
    assert_eq!(classify(agree.as_ref()), Status::Timeout);

    let disagree = Joined::join(vec![Condition::DeadlineExceeded, Condition::NotFound("x".into())]);
    assert_eq!(classify(disagree.as_ref()), Status::Unspecified);

    let single = Joined::join(vec![Condition::NotFound("x".into())]);
    assert!(single.downcast_ref::<Condition>().is_some());
    assert_eq!(classify(single.as_ref()), Status::NotFound);
}

#[test]
fn test_classify_follows_sources_up_to_ceiling() {
    assert_eq!(classify(wrapped(3, Condition::DeadlineExceeded).as_ref()), Status::Timeout);
    assert_eq!(classify(wrapped(MAX_DEPTH - 1, Condition::DeadlineExceeded).as_ref()), Status::Timeout);
    assert_eq!(classify(wrapped(MAX_DEPTH, Condition::DeadlineExceeded).as_ref()), Status::Unspecified);
}

#[test]
fn test_status_codes() {
    for status in Status::ALL {
        assert_eq!(Status::from_code(status.code()), status);
    }
    assert_eq!(Status::NotFound.code(), 15);
    assert_eq!(Status::from_code(99), Status::Unspecified);
    assert_eq!(Status::from_http_code(204), Status::OK);
    assert_eq!(Status::from_http_code(404), Status::NotFound);
    assert_eq!(Status::from_http_code(429), Status::Throttled);
    assert_eq!(Status::from_http_code(418), Status::PermanentError);
    assert_eq!(Status::from_http_code(501), Status::PermanentError);
    assert_eq!(Status::from_http_code(503), Status::TemporaryError);
    assert_eq!(Status::from_http_code(302), Status::Unspecified);
}

// ============================================================================
//  RECORDS
// ============================================================================

#[test]
fn test_call_with_copies() -> Result<()> {
    let call = Call::new("endpoint", "greet", Any::new("world")?);
    let amended = call.with([
        CallOption::CorrelationId(9),
        CallOption::Expiration(Duration::from_secs(30)),
        CallOption::Version("v2".into()),
    ]);

    assert_eq!(call.correlation_id(), 0);
    assert_eq!(call.version(), "");
    assert_eq!(amended.correlation_id(), 9);
    assert_eq!(amended.expiration(), Duration::from_secs(30));
    assert_eq!(amended.version(), "v2");
    assert_eq!(amended.input(), call.input());
    Ok(())
}

#[test]
fn test_call_result_may_carry_output_and_error() -> Result<()> {
    let partial = CallResult::output(Any::new(&1u8)?)
        .with([CallResultOption::Error(RemoteError::new("Partial", "stopped early"))]);
    assert!(partial.is_failure());
    assert!(partial.output_value().is_some());
    assert!(!CallResult::output(Any::empty()).is_failure());
    Ok(())
}

#[test]
fn test_error_response_is_classified() {
    let res = Response::error(&Condition::DeadlineExceeded);
    assert_eq!(res.status(), Status::Timeout);

    let exit = res.as_exit().unwrap();
    let err = exit.result().error_value().unwrap();
    assert_eq!(err.kind(), "callproto::Condition");
    assert_eq!(err.message(), "deadline exceeded");
    assert!(exit.tail_call().is_none());
}

#[test]
fn test_remote_error_is_preserved_across_hops() {
    let original = RemoteError::new("ValueError", "bad").with_traceback(b"line 1".to_vec());
    assert_eq!(RemoteError::from_dyn(&original), original);
    assert_eq!(RemoteError::from_error(&original), original);

    let io = RemoteError::from_error(&std::io::Error::other("disk"));
    assert!(io.kind().contains("io"));
    assert_eq!(io.message(), "disk");
}

// ============================================================================
//  FRAMES
// ============================================================================

#[test]
fn test_request_frame_roundtrip() -> Result<()> {
    let input = Request::input("greet", Any::new("world")?)
        .with_dispatch_id("d1")
        .with_root_dispatch_id("d0")
        .with_creation_time(UNIX_EPOCH + Duration::new(1_700_000_000, 5));
    assert_eq!(frame::decode_request(&frame::encode_request(&input)?)?, input);

    let results = vec![
        CallResult::output(Any::new(&1u64)?).with([CallResultOption::CorrelationId(10)]),
        CallResult::error(RemoteError::new("Err", "boom").with_value(vec![1, 2]))
            .with([CallResultOption::CorrelationId(11), CallResultOption::DispatchId("x".into())]),
    ];
    let resume = Request::poll_result(
        "greet",
        PollResult::new(Any::new(&7u64)?).with_results(results),
    );
    assert_eq!(frame::decode_request(&frame::encode_request(&resume)?)?, resume);

    let failed = Request::poll_result(
        "greet",
        PollResult::new(Any::empty()).with_error(RemoteError::new("Dispatch", "no capacity")),
    );
    assert_eq!(frame::decode_request(&frame::encode_request(&failed)?)?, failed);
    Ok(())
}

#[test]
fn test_response_frame_roundtrip() -> Result<()> {
    let call = Call::new("ep", "child", Any::new(&Json(json!({"k": [1, 2]})))?)
        .with([CallOption::CorrelationId(u64::MAX), CallOption::Expiration(Duration::from_millis(1500))]);

    let poll = Response::poll(
        Poll::new(1, 1, Duration::from_secs(300))
            .with_calls(vec![call.clone()])
            .with_coroutine_state(Any::new(&99u64)?),
    );
    assert_eq!(frame::decode_response(&frame::encode_response(&poll)?)?, poll);

    let exit = Response::exit(Status::OK, Exit::new(CallResult::output(Any::empty())).with_tail_call(call));
    assert_eq!(frame::decode_response(&frame::encode_response(&exit)?)?, exit);

    let failed = Response::error(&Condition::NotFound("child".into()));
    assert_eq!(frame::decode_response(&frame::encode_response(&failed)?)?, failed);
    Ok(())
}

#[test]
fn test_frame_skips_unknown_fields() -> Result<()> {
    let mut enc = Encoder::new();
    enc.variant_begin("Request")?;
    enc.map_begin()?;
    enc.variant_begin("added_later")?;
    enc.list_begin()?;
    enc.u64(1)?;
    enc.list_end()?;
    enc.variant_end()?;
    enc.variant_begin("function")?;
    enc.str("greet")?;
    enc.variant_end()?;
    enc.variant_begin("input")?;
    enc.map_begin()?;
    enc.variant_begin("tag")?;
    enc.u64(Tag::Empty.code())?;
    enc.variant_end()?;
    enc.variant_begin("payload")?;
    enc.bytes(&[])?;
    enc.variant_end()?;
    enc.map_end()?;
    enc.variant_end()?;
    enc.map_end()?;
    enc.variant_end()?;

    let req = frame::decode_request(&enc.into_bytes()?)?;
    assert_eq!(req.function(), "greet");
    assert_eq!(req.as_input(), Some(&Any::empty()));
    Ok(())
}

#[test]
fn test_frame_rejects_malformed_input() -> Result<()> {
    let mut enc = Encoder::new();
    enc.variant_begin("Request")?;
    enc.map_begin()?;
    enc.variant_begin("function")?;
    enc.str("greet")?;
    enc.variant_end()?;
    enc.map_end()?;
    enc.variant_end()?;
    let missing = enc.into_bytes()?;
    assert_eq!(
        frame::decode_request(&missing),
        Err(Error::ProtocolViolation("missing directive".into()))
    );

    let bytes = frame::encode_request(&Request::input("greet", Any::new(&1u8)?))?;
    assert!(matches!(frame::decode_response(&bytes), Err(Error::UnknownVariant(_))));
    for cut in 0..bytes.len() {
        assert!(frame::decode_request(&bytes[..cut]).is_err());
    }
    Ok(())
}
