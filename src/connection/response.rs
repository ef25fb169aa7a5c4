//! Incremental HTTP/1.x response parsing.
//!
//! The head is buffered until `httparse` reports it complete; the body is only
//! counted, never kept, since a probe needs to know where the response ends
//! but not what it says.

use httparse::Status;

use crate::config::{
    HEADER_CONTENT_LENGTH, HEADER_TRANSFER_ENCODING, MAX_RESPONSE_HEAD_BYTES, MAX_RESPONSE_HEADERS,
};
use crate::error_handling::TransportError;

const MAX_CHUNK_LINE_BYTES: usize = 4096;

/// A complete response, minus its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code from the status line
    pub status: u16,
    /// Reason phrase from the status line (may be empty)
    pub reason: String,
    /// Protocol version the server answered with, e.g. `1.1`
    pub http_version: String,
    /// Response headers in the order they were received
    pub headers: Vec<(String, String)>,
    /// Number of body bytes received
    pub body_length: usize,
    /// Set when the body went past the size cap and reading stopped early
    pub truncated: bool,
}

impl Response {
    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data(u64),
    DataEnd,
    Trailer,
    Done,
}

/// Tracks `Transfer-Encoding: chunked` framing, counting payload bytes.
#[derive(Debug)]
struct ChunkedDecoder {
    state: ChunkState,
    line: Vec<u8>,
}

impl ChunkedDecoder {
    fn new() -> Self {
        Self {
            state: ChunkState::Size,
            line: Vec::new(),
        }
    }

    fn is_done(&self) -> bool {
        self.state == ChunkState::Done
    }

    /// Consumes wire bytes and returns how many of them were payload.
    fn feed(&mut self, mut data: &[u8]) -> Result<usize, TransportError> {
        let mut payload = 0;
        while !data.is_empty() {
            match self.state {
                ChunkState::Size => {
                    if let Some(line) = self.take_line(&mut data)? {
                        let size = parse_chunk_size(&line)?;
                        self.state = if size == 0 {
                            ChunkState::Trailer
                        } else {
                            ChunkState::Data(size)
                        };
                    }
                }
                ChunkState::Data(remaining) => {
                    let n = remaining.min(data.len() as u64) as usize;
                    payload += n;
                    data = &data[n..];
                    self.state = if n as u64 == remaining {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data(remaining - n as u64)
                    };
                }
                ChunkState::DataEnd => {
                    if let Some(line) = self.take_line(&mut data)? {
                        if !line.is_empty() {
                            return Err(TransportError::Protocol(
                                "missing CRLF after chunk data".to_string(),
                            ));
                        }
                        self.state = ChunkState::Size;
                    }
                }
                ChunkState::Trailer => {
                    if let Some(line) = self.take_line(&mut data)? {
                        if line.is_empty() {
                            self.state = ChunkState::Done;
                        }
                    }
                }
                ChunkState::Done => break,
            }
        }
        Ok(payload)
    }

    /// Returns the next CRLF-terminated line, or `None` if `data` ran out
    /// first (the partial line is kept for the next call).
    fn take_line(&mut self, data: &mut &[u8]) -> Result<Option<String>, TransportError> {
        match data.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                self.line.extend_from_slice(&data[..pos]);
                *data = &data[pos + 1..];
                let mut line = std::mem::take(&mut self.line);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                Ok(Some(String::from_utf8_lossy(&line).into_owned()))
            }
            None => {
                self.line.extend_from_slice(data);
                *data = &[];
                if self.line.len() > MAX_CHUNK_LINE_BYTES {
                    return Err(TransportError::Protocol("chunk line too long".to_string()));
                }
                Ok(None)
            }
        }
    }
}

fn parse_chunk_size(line: &str) -> Result<u64, TransportError> {
    let size = line.split(';').next().unwrap_or_default().trim();
    u64::from_str_radix(size, 16)
        .map_err(|_| TransportError::Protocol(format!("invalid chunk size {size:?}")))
}

/// How the end of the body is found.
#[derive(Debug)]
enum Framing {
    NoBody,
    Length(u64),
    Chunked(ChunkedDecoder),
    UntilClose,
}

/// Accumulates response bytes until a complete response has been seen.
#[derive(Debug)]
pub(crate) struct ResponseReader {
    head_request: bool,
    max_body_bytes: usize,
    head: Vec<u8>,
    body: Option<(Response, Framing)>,
}

impl ResponseReader {
    /// `head_request` must be set for HEAD requests, whose responses never
    /// carry a body whatever their headers say.
    pub(crate) fn new(head_request: bool, max_body_bytes: usize) -> Self {
        Self {
            head_request,
            max_body_bytes,
            head: Vec::new(),
            body: None,
        }
    }

    /// Whether the status line and headers have been parsed.
    pub(crate) fn has_head(&self) -> bool {
        self.body.is_some()
    }

    /// Feeds bytes read from the transport.
    ///
    /// Returns the response once its framing says it is complete.
    pub(crate) fn feed(&mut self, data: &[u8]) -> Result<Option<Response>, TransportError> {
        if self.body.is_none() {
            self.head.extend_from_slice(data);
            return match self.parse_head()? {
                Some(rest) => self.consume_body(&rest),
                None => Ok(None),
            };
        }
        self.consume_body(data)
    }

    /// Called when the peer closes the connection.
    ///
    /// Only a close-delimited body may legitimately end here.
    pub(crate) fn finish(&mut self) -> Result<Response, TransportError> {
        match self.body.take() {
            Some((response, Framing::UntilClose)) => Ok(response),
            Some((response, Framing::NoBody)) => Ok(response),
            _ => Err(TransportError::ConnectionClosed),
        }
    }

    /// Parses the head out of the buffered bytes, skipping interim (1xx)
    /// responses. Returns the bytes following the head once it is complete.
    fn parse_head(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            let mut headers = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
            let mut parsed = httparse::Response::new(&mut headers);
            let head_len = match parsed.parse(&self.head) {
                Ok(Status::Complete(len)) => len,
                Ok(Status::Partial) => {
                    if self.head.len() > MAX_RESPONSE_HEAD_BYTES {
                        return Err(TransportError::HeadTooLarge(MAX_RESPONSE_HEAD_BYTES));
                    }
                    return Ok(None);
                }
                Err(e) => return Err(TransportError::Protocol(e.to_string())),
            };

            let status = parsed
                .code
                .ok_or_else(|| TransportError::Protocol("missing status code".to_string()))?;
            if (100..200).contains(&status) && status != 101 {
                log::debug!("Skipping interim {status} response");
                self.head.drain(..head_len);
                continue;
            }

            let response = Response {
                status,
                reason: parsed.reason.unwrap_or_default().to_string(),
                http_version: format!("1.{}", parsed.version.unwrap_or(1)),
                headers: parsed
                    .headers
                    .iter()
                    .map(|h| {
                        (
                            h.name.to_string(),
                            String::from_utf8_lossy(h.value).trim().to_string(),
                        )
                    })
                    .collect(),
                body_length: 0,
                truncated: false,
            };
            let framing = self.framing(&response)?;
            let rest = self.head.split_off(head_len);
            self.head = Vec::new();
            self.body = Some((response, framing));
            return Ok(Some(rest));
        }
    }

    fn framing(&self, response: &Response) -> Result<Framing, TransportError> {
        if self.head_request
            || (100..200).contains(&response.status)
            || response.status == 204
            || response.status == 304
        {
            return Ok(Framing::NoBody);
        }
        if let Some(encoding) = response.header(HEADER_TRANSFER_ENCODING) {
            let last = encoding.rsplit(',').next().unwrap_or_default().trim();
            if last.eq_ignore_ascii_case("chunked") {
                return Ok(Framing::Chunked(ChunkedDecoder::new()));
            }
            return Ok(Framing::UntilClose);
        }
        if let Some(length) = response.header(HEADER_CONTENT_LENGTH) {
            let length = length
                .parse::<u64>()
                .map_err(|_| TransportError::Protocol(format!("invalid Content-Length {length:?}")))?;
            return Ok(Framing::Length(length));
        }
        Ok(Framing::UntilClose)
    }

    fn consume_body(&mut self, data: &[u8]) -> Result<Option<Response>, TransportError> {
        let Some((response, framing)) = self.body.as_mut() else {
            return Ok(None);
        };

        let done = match framing {
            Framing::NoBody => true,
            Framing::Length(remaining) => {
                let n = (*remaining).min(data.len() as u64);
                *remaining -= n;
                response.body_length += n as usize;
                *remaining == 0
            }
            Framing::Chunked(decoder) => {
                response.body_length += decoder.feed(data)?;
                decoder.is_done()
            }
            Framing::UntilClose => {
                response.body_length += data.len();
                false
            }
        };

        if response.body_length > self.max_body_bytes {
            log::debug!(
                "Response body passed {} bytes, not reading further",
                self.max_body_bytes
            );
            response.truncated = true;
        } else if !done {
            return Ok(None);
        }
        Ok(self.body.take().map(|(response, _)| response))
    }
}
