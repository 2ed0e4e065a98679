//! # Status Classification
//!
//! Maps an error to the coarse `Status` attached to a `Response`, which the
//! surrounding scheduler uses to pick a retry policy.
//!
//! ## Order
//!
//! 1. An explicit status ([`StatusError`]) wins.
//! 2. An aggregate ([`Joined`]) classifies each cause; the shared status is
//!    returned only if every cause agrees.
//! 3. The fixed rule table below, first match wins.
//! 4. The wrapped `source()`, if any.
//!
//! Recursion stops at `MAX_DEPTH` and yields `Status::Unspecified`.

use std::error::Error as StdError;
use std::io::ErrorKind;

/// How deep classification follows wrapped and aggregated causes.
pub const MAX_DEPTH: usize = 16;

/// A coarse outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Unspecified,
    OK,
    Timeout,
    Throttled,
    InvalidArgument,
    InvalidResponse,
    TemporaryError,
    PermanentError,
    IncompatibleState,
    DNSError,
    TCPError,
    TLSError,
    HTTPError,
    Unauthenticated,
    PermissionDenied,
    NotFound,
}

impl Status {
    /// Every status, in code order.
    pub const ALL: [Status; 16] = [
        Status::Unspecified,
        Status::OK,
        Status::Timeout,
        Status::Throttled,
        Status::InvalidArgument,
        Status::InvalidResponse,
        Status::TemporaryError,
        Status::PermanentError,
        Status::IncompatibleState,
        Status::DNSError,
        Status::TCPError,
        Status::TLSError,
        Status::HTTPError,
        Status::Unauthenticated,
        Status::PermissionDenied,
        Status::NotFound,
    ];

    /// Stable wire code.
    pub fn code(self) -> u64 {
        // ALL is in code order, so the position is the code.
        Status::ALL.iter().position(|s| *s == self).unwrap_or(0) as u64
    }

    /// Inverse of [`Status::code`]; unknown codes map to `Unspecified`.
    pub fn from_code(code: u64) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|i| Status::ALL.get(i).copied())
            .unwrap_or(Status::Unspecified)
    }

    /// Classifies an HTTP status code returned by a remote endpoint.
    pub fn from_http_code(code: u16) -> Self {
        match code {
            200..=299 => Status::OK,
            400 => Status::InvalidArgument,
            401 => Status::Unauthenticated,
            403 => Status::PermissionDenied,
            404 => Status::NotFound,
            408 => Status::Timeout,
            429 => Status::Throttled,
            501 => Status::PermanentError,
            500..=599 => Status::TemporaryError,
            400..=499 => Status::PermanentError,
            _ => Status::Unspecified,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Status::Unspecified => "Unspecified",
            Status::OK => "OK",
            Status::Timeout => "Timeout",
            Status::Throttled => "Throttled",
            Status::InvalidArgument => "InvalidArgument",
            Status::InvalidResponse => "InvalidResponse",
            Status::TemporaryError => "TemporaryError",
            Status::PermanentError => "PermanentError",
            Status::IncompatibleState => "IncompatibleState",
            Status::DNSError => "DNSError",
            Status::TCPError => "TCPError",
            Status::TLSError => "TLSError",
            Status::HTTPError => "HTTPError",
            Status::Unauthenticated => "Unauthenticated",
            Status::PermissionDenied => "PermissionDenied",
            Status::NotFound => "NotFound",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Conditions reported by collaborators at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Cancelled,
    DeadlineExceeded,
    NotFound(String),
    PermissionDenied(String),
    ConnectionReset,
    ConnectionRefused,
    DnsLookup(String),
    TlsVerification(String),
    MalformedResponse(String),
    UnexpectedEof,
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
            Self::NotFound(what) => write!(f, "not found: {}", what),
            Self::PermissionDenied(what) => write!(f, "permission denied: {}", what),
            Self::ConnectionReset => write!(f, "connection reset by peer"),
            Self::ConnectionRefused => write!(f, "connection refused"),
            Self::DnsLookup(host) => write!(f, "dns lookup failed for {}", host),
            Self::TlsVerification(msg) => write!(f, "tls verification failed: {}", msg),
            Self::MalformedResponse(msg) => write!(f, "malformed response: {}", msg),
            Self::UnexpectedEof => write!(f, "unexpected end of stream"),
        }
    }
}

impl StdError for Condition {}

/// An error carrying an explicit status, which takes precedence over rules.
#[derive(Debug)]
pub struct StatusError {
    status: Status,
    source: Box<dyn StdError + Send + Sync>,
}

impl StatusError {
    pub fn new(status: Status, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self { status, source: source.into() }
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl StdError for StatusError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Several causes reported as one error.
#[derive(Debug)]
pub struct Joined {
    causes: Vec<Box<dyn StdError + Send + Sync>>,
}

impl Joined {
    /// Aggregates `causes`, collapsing a single cause to itself.
    pub fn join<E>(causes: Vec<E>) -> Box<dyn StdError + Send + Sync>
    where
        E: StdError + Send + Sync + 'static,
    {
        let mut causes: Vec<Box<dyn StdError + Send + Sync>> =
            causes.into_iter().map(|c| Box::new(c) as Box<dyn StdError + Send + Sync>).collect();
        if causes.len() == 1 {
            if let Some(only) = causes.pop() {
                return only;
            }
        }
        Box::new(Joined { causes })
    }

    pub fn causes(&self) -> impl Iterator<Item = &(dyn StdError + Send + Sync + 'static)> {
        self.causes.iter().map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.causes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }
}

impl std::fmt::Display for Joined {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, cause) in self.causes.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", cause)?;
        }
        Ok(())
    }
}

impl StdError for Joined {}

/// Classifies an error.
pub fn classify(err: &(dyn StdError + 'static)) -> Status {
    classify_at(err, 0)
}

fn classify_at(err: &(dyn StdError + 'static), depth: usize) -> Status {
    if depth >= MAX_DEPTH {
        return Status::Unspecified;
    }

    if let Some(explicit) = err.downcast_ref::<StatusError>() {
        return explicit.status();
    }

    if let Some(joined) = err.downcast_ref::<Joined>() {
        let mut statuses = joined.causes().map(|c| classify_at(c, depth + 1));
        let Some(first) = statuses.next() else {
            return Status::Unspecified;
        };
        return if statuses.all(|s| s == first) { first } else { Status::Unspecified };
    }

    if let Some(status) = RULES.iter().find_map(|rule| rule(err)) {
        return status;
    }

    match err.source() {
        Some(inner) => classify_at(inner, depth + 1),
        None => Status::Unspecified,
    }
}

type Rule = fn(&(dyn StdError + 'static)) -> Option<Status>;

/// Ordered condition -> status rules.
const RULES: &[Rule] = &[
    cancelled,
    deadline_exceeded,
    not_found,
    permission,
    connection,
    dns,
    tls,
    malformed_response,
    short_read,
];

fn io_kind(err: &(dyn StdError + 'static)) -> Option<ErrorKind> {
    err.downcast_ref::<std::io::Error>().map(|e| e.kind())
}

fn condition<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a Condition> {
    err.downcast_ref::<Condition>()
}

fn cancelled(err: &(dyn StdError + 'static)) -> Option<Status> {
    let hit = matches!(condition(err), Some(Condition::Cancelled))
        || io_kind(err) == Some(ErrorKind::Interrupted)
        || err.downcast_ref::<tokio::task::JoinError>().is_some_and(|e| e.is_cancelled());
    hit.then_some(Status::TemporaryError)
}

fn deadline_exceeded(err: &(dyn StdError + 'static)) -> Option<Status> {
    let hit = matches!(condition(err), Some(Condition::DeadlineExceeded))
        || io_kind(err) == Some(ErrorKind::TimedOut)
        || err.is::<tokio::time::error::Elapsed>();
    hit.then_some(Status::Timeout)
}

fn not_found(err: &(dyn StdError + 'static)) -> Option<Status> {
    let hit = matches!(condition(err), Some(Condition::NotFound(_)))
        || io_kind(err) == Some(ErrorKind::NotFound);
    hit.then_some(Status::NotFound)
}

fn permission(err: &(dyn StdError + 'static)) -> Option<Status> {
    let hit = matches!(condition(err), Some(Condition::PermissionDenied(_)))
        || io_kind(err) == Some(ErrorKind::PermissionDenied);
    hit.then_some(Status::PermissionDenied)
}

fn connection(err: &(dyn StdError + 'static)) -> Option<Status> {
    let hit = matches!(condition(err), Some(Condition::ConnectionReset | Condition::ConnectionRefused))
        || matches!(
            io_kind(err),
            Some(
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::NotConnected
                    | ErrorKind::BrokenPipe
            )
        );
    hit.then_some(Status::TCPError)
}

fn dns(err: &(dyn StdError + 'static)) -> Option<Status> {
    matches!(condition(err), Some(Condition::DnsLookup(_))).then_some(Status::DNSError)
}

fn tls(err: &(dyn StdError + 'static)) -> Option<Status> {
    matches!(condition(err), Some(Condition::TlsVerification(_))).then_some(Status::TLSError)
}

fn malformed_response(err: &(dyn StdError + 'static)) -> Option<Status> {
    let hit = matches!(condition(err), Some(Condition::MalformedResponse(_)))
        || err.is::<wirepack::Error>()
        || err.is::<serde_json::Error>()
        || err.is::<std::str::Utf8Error>()
        || io_kind(err) == Some(ErrorKind::InvalidData);
    hit.then_some(Status::InvalidResponse)
}

fn short_read(err: &(dyn StdError + 'static)) -> Option<Status> {
    let hit = matches!(condition(err), Some(Condition::UnexpectedEof))
        || io_kind(err) == Some(ErrorKind::UnexpectedEof);
    hit.then_some(Status::TemporaryError)
}
