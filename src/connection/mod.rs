//! Per-endpoint connection state machine.
//!
//! A `Connection` owns one non-blocking socket (plus an optional TLS session)
//! and walks it through connect, handshake, request and response. It never
//! blocks: each call to [`Connection::drive`] performs as much I/O as the
//! socket allows and then returns, leaving the connection registered with the
//! poller for whatever readiness it needs next.

mod response;
mod transport;

use std::io;
use std::sync::Arc;

use log::{debug, trace};
use mio::net::TcpStream;
use mio::{Interest, Registry, Token};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection};

use crate::config::READ_CHUNK_SIZE;
use crate::error_handling::TransportError;
use crate::request::{RequestDescriptor, Scheme};
use crate::tls::{tls_facts, TlsFacts};
use crate::utils::{ConnectionTiming, TimingRecorder};

pub use response::Response;
pub(crate) use response::ResponseReader;
use transport::Transport;

/// Where a connection is in its life.
///
/// Transitions only move forward; `Failed` can be reached from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Unstarted,
    Connecting,
    TlsHandshaking,
    Connected,
    RequestSent,
    ReadingResponse,
    Complete,
    Failed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Complete | ConnectionState::Failed)
    }
}

/// What a call to [`Connection::drive`] achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Nothing could be done; the socket wasn't actually ready.
    Pending,
    /// The connection moved forward and is waiting on I/O again.
    Advanced,
    /// The connection reached `Complete` or `Failed`.
    Finished,
}

/// Result of one step of the state machine.
enum Step {
    Blocked,
    Moved,
}

/// One probe of one endpoint.
pub struct Connection {
    descriptor: RequestDescriptor,
    token: Token,
    state: ConnectionState,
    tls_config: Option<Arc<ClientConfig>>,
    transport: Option<Transport>,
    interest: Option<Interest>,
    request: Vec<u8>,
    written: usize,
    reader: ResponseReader,
    timing: TimingRecorder,
    tls_facts: Option<TlsFacts>,
    outcome: Option<Result<Response, TransportError>>,
}

impl Connection {
    /// Creates an unstarted connection.
    ///
    /// `tls_config` is required for `https` descriptors and ignored for
    /// `http` ones. Response bodies past `max_response_bytes` are not read.
    pub fn new(
        descriptor: RequestDescriptor,
        token: Token,
        tls_config: Option<Arc<ClientConfig>>,
        max_response_bytes: usize,
    ) -> Self {
        let request = descriptor.to_wire();
        let reader = ResponseReader::new(descriptor.method().is_head(), max_response_bytes);
        Self {
            descriptor,
            token,
            state: ConnectionState::Unstarted,
            tls_config,
            transport: None,
            interest: None,
            request,
            written: 0,
            reader,
            timing: TimingRecorder::start(),
            tls_facts: None,
            outcome: None,
        }
    }

    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    pub fn identifier(&self) -> &str {
        self.descriptor.identifier()
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn timing(&self) -> ConnectionTiming {
        self.timing.timing()
    }

    /// Session and certificate facts, once a TLS handshake has completed.
    pub fn tls_facts(&self) -> Option<&TlsFacts> {
        self.tls_facts.as_ref()
    }

    /// Takes the terminal outcome. `None` until the connection finished, and
    /// after the outcome has been taken once.
    pub fn take_outcome(&mut self) -> Option<Result<Response, TransportError>> {
        self.outcome.take()
    }

    /// The readiness this connection is waiting for, if any.
    pub fn wants(&self) -> Option<Interest> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => Some(Interest::WRITABLE),
            ConnectionState::TlsHandshaking => {
                if self.transport.as_ref().is_some_and(Transport::wants_write) {
                    Some(Interest::WRITABLE)
                } else {
                    Some(Interest::READABLE)
                }
            }
            ConnectionState::RequestSent | ConnectionState::ReadingResponse => {
                Some(Interest::READABLE)
            }
            ConnectionState::Unstarted | ConnectionState::Complete | ConnectionState::Failed => {
                None
            }
        }
    }

    /// Issues the non-blocking connect and registers the socket.
    ///
    /// Failures here (an unroutable address, a bad server name) finish the
    /// connection immediately rather than being returned.
    pub fn start(&mut self, registry: &Registry) -> Progress {
        if self.state != ConnectionState::Unstarted {
            return self.progress(false);
        }
        self.timing = TimingRecorder::start();

        let transport = match self.open() {
            Ok(transport) => transport,
            Err(e) => {
                self.fail(e);
                return Progress::Finished;
            }
        };
        debug!(
            "Connecting to {} for {}",
            self.descriptor.address(),
            self.identifier()
        );
        self.transport = Some(transport);
        self.state = ConnectionState::Connecting;
        self.drive(registry)
    }

    /// Makes as much progress as the socket allows.
    ///
    /// Safe to call when the socket isn't ready: no bytes move and
    /// `Progress::Pending` is returned. Errors never escape; they finish the
    /// connection as `Failed`.
    pub fn drive(&mut self, registry: &Registry) -> Progress {
        if self.is_terminal() {
            return Progress::Finished;
        }

        let mut moved = false;
        loop {
            match self.step() {
                Ok(Step::Moved) => {
                    moved = true;
                    if self.is_terminal() {
                        break;
                    }
                }
                Ok(Step::Blocked) => break,
                Err(e) => {
                    self.fail(e);
                    break;
                }
            }
        }

        if !self.is_terminal() {
            if let Err(e) = self.update_registration(registry) {
                self.fail(TransportError::Io(e));
            }
        }
        self.progress(moved)
    }

    /// Deregisters and closes the socket. Called exactly once per connection
    /// whether it finished, failed or was cut off.
    pub fn release(&mut self, registry: &Registry) -> io::Result<()> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };
        let deregistered = match self.interest.take() {
            Some(_) => registry.deregister(transport.socket_mut()),
            None => Ok(()),
        };
        let shut_down = transport.shutdown();
        trace!("Released socket for {}", self.identifier());
        deregistered.and(shut_down)
    }

    fn progress(&self, moved: bool) -> Progress {
        if self.is_terminal() {
            Progress::Finished
        } else if moved {
            Progress::Advanced
        } else {
            Progress::Pending
        }
    }

    fn open(&self) -> Result<Transport, TransportError> {
        let addr = self.descriptor.address();
        let session = match self.descriptor.scheme() {
            Scheme::Http => None,
            Scheme::Https => Some(self.tls_session()?),
        };
        let sock =
            TcpStream::connect(addr).map_err(|source| TransportError::Connect { addr, source })?;
        Ok(match session {
            Some(tls) => Transport::Tls {
                sock,
                tls: Box::new(tls),
            },
            None => Transport::Plain(sock),
        })
    }

    fn tls_session(&self) -> Result<ClientConnection, TransportError> {
        let config = self.tls_config.clone().ok_or_else(|| {
            TransportError::Tls(rustls::Error::General(
                "no TLS configuration for https endpoint".to_string(),
            ))
        })?;
        let name = ServerName::try_from(self.descriptor.server_name().to_string()).map_err(|e| {
            TransportError::Tls(rustls::Error::General(format!(
                "invalid server name {:?}: {e}",
                self.descriptor.server_name()
            )))
        })?;
        Ok(ClientConnection::new(config, name)?)
    }

    fn step(&mut self) -> Result<Step, TransportError> {
        match self.state {
            ConnectionState::Connecting => self.finish_connect(),
            ConnectionState::TlsHandshaking => self.continue_handshake(),
            ConnectionState::Connected => self.send_request(),
            ConnectionState::RequestSent | ConnectionState::ReadingResponse => {
                self.read_response()
            }
            ConnectionState::Unstarted | ConnectionState::Complete | ConnectionState::Failed => {
                Ok(Step::Blocked)
            }
        }
    }

    fn transport(&mut self) -> Result<&mut Transport, TransportError> {
        let state = self.state;
        self.transport
            .as_mut()
            .ok_or_else(|| TransportError::NotFinished(format!("{state} without a socket")))
    }

    fn finish_connect(&mut self) -> Result<Step, TransportError> {
        let addr = self.descriptor.address();
        let sock = self.transport()?.socket();
        if let Some(source) = sock.take_error()? {
            return Err(TransportError::Connect { addr, source });
        }
        match sock.peer_addr() {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotConnected => return Ok(Step::Blocked),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Step::Blocked),
            Err(source) => return Err(TransportError::Connect { addr, source }),
        }

        self.timing.connected();
        self.state = match self.descriptor.scheme() {
            Scheme::Http => ConnectionState::Connected,
            Scheme::Https => ConnectionState::TlsHandshaking,
        };
        debug!("Connected to {addr} for {}", self.identifier());
        Ok(Step::Moved)
    }

    fn continue_handshake(&mut self) -> Result<Step, TransportError> {
        let transport = self.transport()?;
        if !transport
            .handshake()
            .map_err(TransportError::from_transport_io)?
        {
            return Ok(Step::Blocked);
        }

        let facts = transport.tls_session().map(tls_facts);
        self.timing.tls_established();
        if let Some(facts) = &facts {
            debug!(
                "TLS handshake complete for {} ({})",
                self.identifier(),
                facts.tls_version.as_deref().unwrap_or("unknown version")
            );
        }
        self.tls_facts = facts;
        self.state = ConnectionState::Connected;
        Ok(Step::Moved)
    }

    fn send_request(&mut self) -> Result<Step, TransportError> {
        let Self {
            transport,
            request,
            written,
            ..
        } = &mut *self;
        let Some(transport) = transport.as_mut() else {
            return Err(TransportError::NotFinished("connected without a socket".to_string()));
        };

        while *written < request.len() {
            match transport.write(&request[*written..]) {
                Ok(0) => return Err(TransportError::Io(io::ErrorKind::WriteZero.into())),
                Ok(n) => *written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Step::Blocked),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(TransportError::from_transport_io(e)),
            }
        }
        match transport.flush() {
            Ok(true) => {}
            Ok(false) => return Ok(Step::Blocked),
            Err(e) => return Err(TransportError::from_transport_io(e)),
        }

        self.timing.request_sent();
        self.state = ConnectionState::RequestSent;
        debug!(
            "Sent {} request ({} bytes) for {}",
            self.descriptor.method(),
            self.request.len(),
            self.identifier()
        );
        Ok(Step::Moved)
    }

    fn read_response(&mut self) -> Result<Step, TransportError> {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        let mut moved = false;
        loop {
            let read = match self.transport()?.read(&mut buf) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(if moved { Step::Moved } else { Step::Blocked });
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::from_transport_io(e)),
            };

            if read == 0 {
                trace!(
                    "Peer closed the stream for {} {} the response head",
                    self.identifier(),
                    if self.reader.has_head() { "after" } else { "before" }
                );
                let response = self.reader.finish()?;
                self.complete(response);
                return Ok(Step::Moved);
            }

            moved = true;
            self.timing.first_byte();
            self.state = ConnectionState::ReadingResponse;
            if let Some(response) = self.reader.feed(&buf[..read])? {
                self.complete(response);
                return Ok(Step::Moved);
            }
        }
    }

    fn update_registration(&mut self, registry: &Registry) -> io::Result<()> {
        let wanted = self.wants();
        if wanted == self.interest {
            return Ok(());
        }
        let token = self.token;
        let Some(transport) = self.transport.as_mut() else {
            return Ok(());
        };
        match (self.interest, wanted) {
            (None, Some(interest)) => registry.register(transport.socket_mut(), token, interest)?,
            (Some(_), Some(interest)) => {
                registry.reregister(transport.socket_mut(), token, interest)?
            }
            (Some(_), None) => registry.deregister(transport.socket_mut())?,
            (None, None) => {}
        }
        trace!(
            "{} now waiting for {wanted:?} in state {}",
            self.descriptor.identifier(),
            self.state
        );
        self.interest = wanted;
        Ok(())
    }

    fn complete(&mut self, response: Response) {
        self.timing.finished();
        debug!(
            "Received {} {} for {} (HTTP/{}, {} body bytes)",
            response.status,
            response.reason,
            self.identifier(),
            response.http_version,
            response.body_length
        );
        self.state = ConnectionState::Complete;
        self.outcome = Some(Ok(response));
    }

    fn fail(&mut self, error: TransportError) {
        self.timing.finished();
        debug!(
            "Probe of {} failed in state {}: {error}",
            self.identifier(),
            self.state
        );
        self.state = ConnectionState::Failed;
        self.outcome = Some(Err(error));
    }
}
