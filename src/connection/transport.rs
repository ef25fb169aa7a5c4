//! Byte transport for one connection: a non-blocking TCP socket, optionally
//! wrapped in a rustls client session.
//!
//! Every operation follows the non-blocking contract: `WouldBlock` means "try
//! again after the next readiness event" and never indicates failure.

use std::io::{self, Read, Write};
use std::net::Shutdown;

use mio::net::TcpStream;
use rustls::ClientConnection;

pub(crate) enum Transport {
    Plain(TcpStream),
    Tls {
        sock: TcpStream,
        tls: Box<ClientConnection>,
    },
}

impl Transport {
    pub(crate) fn socket(&self) -> &TcpStream {
        match self {
            Transport::Plain(sock) => sock,
            Transport::Tls { sock, .. } => sock,
        }
    }

    pub(crate) fn socket_mut(&mut self) -> &mut TcpStream {
        match self {
            Transport::Plain(sock) => sock,
            Transport::Tls { sock, .. } => sock,
        }
    }

    pub(crate) fn tls_session(&self) -> Option<&ClientConnection> {
        match self {
            Transport::Plain(_) => None,
            Transport::Tls { tls, .. } => Some(&**tls),
        }
    }

    /// Whether TLS records are waiting to go out on the socket.
    pub(crate) fn wants_write(&self) -> bool {
        match self {
            Transport::Plain(_) => false,
            Transport::Tls { tls, .. } => tls.wants_write(),
        }
    }

    /// Drives the TLS handshake as far as the socket allows.
    ///
    /// Returns `Ok(true)` once the handshake is complete; plain transports
    /// are always complete.
    pub(crate) fn handshake(&mut self) -> io::Result<bool> {
        let Transport::Tls { sock, tls } = self else {
            return Ok(true);
        };

        loop {
            if !flush_tls(sock, tls)? {
                return Ok(false);
            }
            if !tls.is_handshaking() {
                return Ok(true);
            }
            if !tls.wants_read() {
                return Ok(false);
            }
            match tls.read_tls(sock) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(_) => process_packets(sock, tls)?,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Writes application bytes.
    ///
    /// For TLS the bytes are accepted into the session and as much ciphertext
    /// as possible is pushed out; call [`Transport::flush`] until it reports
    /// completion before waiting for the response.
    pub(crate) fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(sock) => sock.write(buf),
            Transport::Tls { sock, tls } => {
                let written = tls.writer().write(buf)?;
                flush_tls(sock, tls)?;
                if written == 0 && !buf.is_empty() {
                    return Err(io::ErrorKind::WouldBlock.into());
                }
                Ok(written)
            }
        }
    }

    /// Returns `Ok(true)` when no buffered TLS records remain.
    pub(crate) fn flush(&mut self) -> io::Result<bool> {
        match self {
            Transport::Plain(_) => Ok(true),
            Transport::Tls { sock, tls } => flush_tls(sock, tls),
        }
    }

    /// Reads application bytes; `Ok(0)` means the peer closed the stream.
    pub(crate) fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (sock, tls) = match self {
            Transport::Plain(sock) => return sock.read(buf),
            Transport::Tls { sock, tls } => (sock, tls),
        };

        loop {
            match tls.reader().read(buf) {
                Ok(n) => return Ok(n),
                // Closed without close_notify, which HTTP/1.x servers commonly do.
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(0),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }
            match tls.read_tls(sock) {
                Ok(_) => process_packets(sock, tls)?,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Closes the stream, sending `close_notify` first on TLS sessions.
    pub(crate) fn shutdown(&mut self) -> io::Result<()> {
        if let Transport::Tls { sock, tls } = self {
            tls.send_close_notify();
            let _ = flush_tls(sock, tls);
        }
        match self.socket().shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

/// Writes pending TLS records; `Ok(false)` if the socket filled up first.
fn flush_tls(sock: &mut TcpStream, tls: &mut ClientConnection) -> io::Result<bool> {
    while tls.wants_write() {
        match tls.write_tls(sock) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Processes received records, sending any alert rustls queued on failure.
fn process_packets(sock: &mut TcpStream, tls: &mut ClientConnection) -> io::Result<()> {
    if let Err(e) = tls.process_new_packets() {
        let _ = flush_tls(sock, tls);
        return Err(io::Error::new(io::ErrorKind::InvalidData, e));
    }
    Ok(())
}
