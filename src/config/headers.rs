//! HTTP header and node attribute name constants.
//!
//! Header names keep the spelling they are written with on the wire; lookups
//! against response headers are case-insensitive.

/// Connection header
pub const HEADER_CONNECTION: &str = "Connection";
/// Accept header
pub const HEADER_ACCEPT: &str = "Accept";
/// User-Agent header
pub const HEADER_USER_AGENT: &str = "User-Agent";
/// Host header
pub const HEADER_HOST: &str = "Host";
/// Content-type header, derived from `body_mimetype`
pub const HEADER_CONTENT_TYPE: &str = "Content-type";
/// Content-length header, derived from the body size
pub const HEADER_CONTENT_LENGTH: &str = "Content-length";
/// Transfer-Encoding response header
pub const HEADER_TRANSFER_ENCODING: &str = "Transfer-Encoding";

/// Server response header, reported as `http_server`
pub const HEADER_SERVER: &str = "Server";
/// Content-Security-Policy response header, reported as `http_csp`
pub const HEADER_CONTENT_SECURITY_POLICY: &str = "Content-Security-Policy";

// Keys of the flat node attribute map
/// Endpoint URI (required)
pub const ATTR_URI: &str = "uri";
/// Pre-resolved address to connect to instead of the URI host
pub const ATTR_ADDRESS: &str = "address";
/// HTTP verb
pub const ATTR_HTTP_METHOD: &str = "http_method";
/// HTTP version token for the request line
pub const ATTR_HTTP_VERSION: &str = "http_version";
/// Caller-supplied request headers
pub const ATTR_HTTP_HEADERS: &str = "http_headers";
/// Request body
pub const ATTR_BODY: &str = "body";
/// Content-type of the request body
pub const ATTR_BODY_MIMETYPE: &str = "body_mimetype";
/// Expected response status
pub const ATTR_EXPECTED_STATUS: &str = "expected_status";
/// Nested mapping of TLS knobs
pub const ATTR_CONFIG: &str = "config";
