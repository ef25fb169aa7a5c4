//! Configuration constants.
//!
//! This module defines the constants used throughout the probe engine,
//! including default request attributes, timeouts and buffer limits.

use std::time::Duration;

use crate::request::HttpMethod;

/// Default batch deadline when the caller does not supply one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a single readiness wait inside the polling loop.
///
/// The loop re-checks the deadline at least this often even when no socket
/// becomes ready.
pub const POLL_SLICE: Duration = Duration::from_millis(100);

/// Number of readiness events fetched per poll call.
pub const EVENTS_CAPACITY: usize = 256;

/// The HTTP status code expected from responses unless an endpoint overrides it.
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// The Content-type used for requests with a body when no mimetype is given.
pub const DEFAULT_BODY_MIMETYPE: &str = "text/plain";

/// The HTTP verb used for monitoring requests by default.
pub const DEFAULT_HTTP_METHOD: HttpMethod = HttpMethod::Get;

/// The version of HTTP written in the request line by default.
///
/// This only changes the request line, never how the request is transported.
pub const DEFAULT_HTTP_VERSION: &str = "1.0";

/// Default User-Agent header value.
pub const DEFAULT_USER_AGENT: &str = concat!("webservice-probe/", env!("CARGO_PKG_VERSION"));

/// Size of each read from a socket (16KB).
pub const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Maximum size of a response status line plus headers (64KB).
/// Anything larger is treated as a protocol error.
pub const MAX_RESPONSE_HEAD_BYTES: usize = 64 * 1024;

/// Maximum number of response headers parsed.
pub const MAX_RESPONSE_HEADERS: usize = 100;

/// Maximum number of response body bytes read before the response is
/// considered complete (1MB). Bodies are counted, never buffered.
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// Line terminator used on the wire.
pub const EOL: &str = "\r\n";
