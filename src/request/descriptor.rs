//! Request descriptor construction and request serialization.

use std::fmt::Write as _;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use log::debug;
use serde_json::Value;
use url::{Host, Position, Url};

use super::headers::{validate_header, HeaderList};
use super::method::HttpMethod;
use super::tls_options::TlsOptions;
use crate::config::{
    ProbeConfig, ATTR_ADDRESS, ATTR_BODY, ATTR_BODY_MIMETYPE, ATTR_CONFIG, ATTR_EXPECTED_STATUS,
    ATTR_HTTP_HEADERS, ATTR_HTTP_METHOD, ATTR_HTTP_VERSION, ATTR_URI, DEFAULT_BODY_MIMETYPE,
    DEFAULT_EXPECTED_STATUS, EOL, HEADER_ACCEPT, HEADER_CONNECTION, HEADER_CONTENT_LENGTH,
    HEADER_CONTENT_TYPE, HEADER_HOST, HEADER_USER_AGENT,
};
use crate::error_handling::ConfigurationError;

/// Flat attribute map describing one endpoint, as handed over by the node model.
pub type NodeData = serde_json::Map<String, Value>;

/// URI schemes the engine can probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

/// Everything needed to probe one endpoint for one cycle.
///
/// Built once from node attributes and never modified afterwards; the wire
/// bytes of the request are fully determined by this value.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    identifier: String,
    uri: Url,
    scheme: Scheme,
    server_name: String,
    address: SocketAddr,
    request_target: String,
    method: HttpMethod,
    http_version: String,
    headers: HeaderList,
    body: Option<Vec<u8>>,
    expected_status: u16,
    tls: Option<TlsOptions>,
}

impl RequestDescriptor {
    /// Builds a descriptor from a node's flat attribute map.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the URI is missing or unparsable, the
    /// scheme or method is unsupported, the host isn't a pre-resolved address,
    /// or any attribute has an unusable value. Never touches a socket.
    pub fn from_node_data(
        identifier: &str,
        node: &NodeData,
        config: &ProbeConfig,
    ) -> Result<Self, ConfigurationError> {
        debug!("Creating request descriptor for {identifier}: {node:?}");

        let raw_uri = match node.get(ATTR_URI) {
            Some(Value::String(uri)) => uri.as_str(),
            None | Some(Value::Null) => return Err(ConfigurationError::MissingUri),
            Some(other) => {
                return Err(ConfigurationError::InvalidUri {
                    uri: other.to_string(),
                    reason: "expected a string".to_string(),
                })
            }
        };
        let uri = Url::parse(raw_uri).map_err(|e| ConfigurationError::InvalidUri {
            uri: raw_uri.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = match uri.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(ConfigurationError::UnsupportedScheme(other.to_string())),
        };

        let port = uri
            .port_or_known_default()
            .ok_or_else(|| ConfigurationError::InvalidUri {
                uri: raw_uri.to_string(),
                reason: "no port".to_string(),
            })?;
        let (server_name, host_ip) = match uri.host() {
            Some(Host::Ipv4(ip)) => (ip.to_string(), Some(IpAddr::V4(ip))),
            Some(Host::Ipv6(ip)) => (ip.to_string(), Some(IpAddr::V6(ip))),
            Some(Host::Domain(domain)) => (domain.to_string(), None),
            None => {
                return Err(ConfigurationError::InvalidUri {
                    uri: raw_uri.to_string(),
                    reason: "no host".to_string(),
                })
            }
        };
        let address = match (string_attr(node, ATTR_ADDRESS)?, host_ip) {
            (Some(address), _) => parse_address(&address, port)?,
            (None, Some(ip)) => SocketAddr::new(ip, port),
            (None, None) => return Err(ConfigurationError::UnresolvedHost(server_name)),
        };

        let method = match string_attr(node, ATTR_HTTP_METHOD)? {
            Some(name) => HttpMethod::from_str(&name)
                .map_err(|_| ConfigurationError::UnsupportedMethod(name))?,
            None => config.default_http_method,
        };

        let http_version = match node.get(ATTR_HTTP_VERSION) {
            None | Some(Value::Null) => config.default_http_version.clone(),
            Some(Value::String(version)) => version.clone(),
            Some(Value::Number(version)) => version.to_string(),
            Some(other) => return Err(ConfigurationError::InvalidHttpVersion(other.to_string())),
        };
        if !is_version_token(&http_version) {
            return Err(ConfigurationError::InvalidHttpVersion(http_version));
        }

        let expected_status = match node.get(ATTR_EXPECTED_STATUS) {
            None | Some(Value::Null) => DEFAULT_EXPECTED_STATUS,
            Some(value) => parse_status(value)?,
        };

        let body = body_attr(node)?;
        let request_target = uri[Position::BeforePath..Position::AfterQuery].to_string();
        let headers = make_headers(&uri, node, body.as_deref(), config)?;

        let tls = match scheme {
            Scheme::Https => Some(TlsOptions::from_node_config(node.get(ATTR_CONFIG), config)?),
            Scheme::Http => None,
        };

        Ok(RequestDescriptor {
            identifier: identifier.to_string(),
            uri,
            scheme,
            server_name,
            address,
            request_target,
            method,
            http_version,
            headers,
            body,
            expected_status,
            tls,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host name the TLS layer verifies the certificate against.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// The pre-resolved address connections are made to.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Path and query written in the request line.
    pub fn request_target(&self) -> &str {
        &self.request_target
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn http_version(&self) -> &str {
        &self.http_version
    }

    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn expected_status(&self) -> u16 {
        self.expected_status
    }

    /// TLS knobs; present exactly when the scheme is `https`.
    pub fn tls(&self) -> Option<&TlsOptions> {
        self.tls.as_ref()
    }

    /// Serializes the request exactly as it is written to the socket.
    ///
    /// Request line, headers in insertion order, a blank line, then the body
    /// followed by CRLF when there is one.
    pub fn to_wire(&self) -> Vec<u8> {
        let body_len = self.body.as_ref().map_or(0, |body| body.len() + EOL.len());
        let mut out = Vec::with_capacity(256 + body_len);

        out.extend_from_slice(
            format!(
                "{} {} HTTP/{}{EOL}",
                self.method, self.request_target, self.http_version
            )
            .as_bytes(),
        );
        self.headers.write_to(&mut out);
        out.extend_from_slice(EOL.as_bytes());
        if let Some(body) = &self.body {
            out.extend_from_slice(body);
            out.extend_from_slice(EOL.as_bytes());
        }

        out
    }

    /// One-line description used in log messages.
    pub fn description(&self) -> String {
        let mut desc = format!(
            "{} {} {}/{}",
            self.method,
            self.uri,
            match self.scheme {
                Scheme::Http => "HTTP",
                Scheme::Https => "HTTPS",
            },
            self.http_version
        );

        if let Some(body) = &self.body {
            let _ = write!(
                desc,
                " {{{}}} ({})",
                String::from_utf8_lossy(body),
                self.headers
                    .get(HEADER_CONTENT_TYPE)
                    .unwrap_or(DEFAULT_BODY_MIMETYPE)
            );
        }

        let _ = write!(desc, " -> {} response", self.expected_status);
        desc
    }
}

/// Default headers, overlaid by the caller's, then the derived body headers
/// wherever the caller hasn't set them.
fn make_headers(
    uri: &Url,
    node: &NodeData,
    body: Option<&[u8]>,
    config: &ProbeConfig,
) -> Result<HeaderList, ConfigurationError> {
    let mut headers = HeaderList::new();
    headers.set(HEADER_HOST, host_header(uri));
    headers.set(HEADER_CONNECTION, "close");
    headers.set(HEADER_ACCEPT, "*/*");
    headers.set(HEADER_USER_AGENT, config.user_agent.as_str());

    match node.get(ATTR_HTTP_HEADERS) {
        None | Some(Value::Null) => {}
        Some(Value::Object(caller)) => {
            let mut overlay = HeaderList::new();
            for (name, value) in caller {
                let value = match value {
                    Value::String(text) => text.clone(),
                    Value::Number(number) => number.to_string(),
                    Value::Bool(flag) => flag.to_string(),
                    _ => return Err(ConfigurationError::InvalidHeader(name.clone())),
                };
                validate_header(name, &value)?;
                overlay.set(name.as_str(), value);
            }
            headers.merge(&overlay);
        }
        Some(other) => {
            return Err(ConfigurationError::InvalidAttribute {
                key: ATTR_HTTP_HEADERS.to_string(),
                reason: format!("expected a mapping, got {other}"),
            })
        }
    }

    if let Some(body) = body {
        let mimetype = string_attr(node, ATTR_BODY_MIMETYPE)?
            .unwrap_or_else(|| DEFAULT_BODY_MIMETYPE.to_string());
        validate_header(HEADER_CONTENT_TYPE, &mimetype)?;
        headers.set_default(HEADER_CONTENT_TYPE, mimetype);
        headers.set_default(HEADER_CONTENT_LENGTH, body.len().to_string());
    }

    Ok(headers)
}

fn host_header(uri: &Url) -> String {
    let host = uri.host_str().unwrap_or_default();
    match uri.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Reads an optional string attribute; `null` counts as absent.
fn string_attr(node: &NodeData, key: &str) -> Result<Option<String>, ConfigurationError> {
    match node.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(other) => Err(ConfigurationError::InvalidAttribute {
            key: key.to_string(),
            reason: format!("expected a string, got {other}"),
        }),
    }
}

/// Strings are sent verbatim, structured values as compact JSON. An empty
/// body is the same as no body.
fn body_attr(node: &NodeData) -> Result<Option<Vec<u8>>, ConfigurationError> {
    let bytes = match node.get(ATTR_BODY) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) => text.as_bytes().to_vec(),
        Some(value) => {
            serde_json::to_vec(value).map_err(|e| ConfigurationError::InvalidAttribute {
                key: ATTR_BODY.to_string(),
                reason: e.to_string(),
            })?
        }
    };
    Ok((!bytes.is_empty()).then_some(bytes))
}

fn parse_address(address: &str, port: u16) -> Result<SocketAddr, ConfigurationError> {
    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }
    address
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .map_err(|_| ConfigurationError::InvalidAttribute {
            key: ATTR_ADDRESS.to_string(),
            reason: format!("{address:?} is not an IP address"),
        })
}

fn parse_status(value: &Value) -> Result<u16, ConfigurationError> {
    let status = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    match status {
        Some(code @ 100..=999) => Ok(code as u16),
        _ => Err(ConfigurationError::InvalidExpectedStatus(value.to_string())),
    }
}

fn is_version_token(version: &str) -> bool {
    match version.split_once('.') {
        Some((major, minor)) => {
            !major.is_empty()
                && !minor.is_empty()
                && major.bytes().all(|b| b.is_ascii_digit())
                && minor.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}
