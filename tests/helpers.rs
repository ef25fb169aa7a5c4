// Shared test helpers: stub HTTP/1.x servers and node construction.
//
// Every stub binds an ephemeral port on 127.0.0.1 and serves from plain
// threads, so tests never depend on the network.

#![allow(dead_code)] // Not every test file uses every helper

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use serde_json::Value;

use webservice_probe::NodeData;

/// Builds a batch from a JSON object of node attribute maps.
pub fn nodes(value: Value) -> HashMap<String, NodeData> {
    serde_json::from_value(value).expect("batch should be a JSON object of objects")
}

/// A status line plus headers and body, with `Content-Length` filled in.
pub fn http_response(status: &str, headers: &[(&str, &str)], body: &str) -> Vec<u8> {
    let mut response = format!("HTTP/1.1 {status}\r\n");
    for (name, value) in headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str(&format!("Content-Length: {}\r\n\r\n{body}", body.len()));
    response.into_bytes()
}

/// Reads one request: the head, plus as many body bytes as its
/// `Content-length` announces.
pub fn read_request<S: Read>(stream: &mut S) -> Vec<u8> {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        if let Some(head_end) = find_head_end(&request) {
            let wanted = head_end + content_length(&request[..head_end]);
            if request.len() >= wanted {
                return request;
            }
        }
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return request,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
}

fn find_head_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

fn content_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// A plain HTTP stub answering a fixed number of connections.
pub struct StubServer {
    pub addr: SocketAddr,
    handle: thread::JoinHandle<Vec<Vec<u8>>>,
}

impl StubServer {
    /// Serves `response` to each of `connections` connections, then closes.
    pub fn serve(response: Vec<u8>, connections: usize) -> Self {
        Self::serve_with_delay(response, connections, Duration::ZERO)
    }

    /// Like [`StubServer::serve`], waiting `delay` before each response.
    pub fn serve_with_delay(response: Vec<u8>, connections: usize, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut requests = Vec::new();
            for _ in 0..connections {
                let Ok((mut stream, _)) = listener.accept() else {
                    break;
                };
                requests.push(read_request(&mut stream));
                thread::sleep(delay);
                let _ = stream.write_all(&response);
            }
            requests
        });
        Self { addr, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Waits for the server thread and returns the raw requests it received.
    pub fn requests(self) -> Vec<Vec<u8>> {
        self.handle.join().expect("stub server panicked")
    }
}

/// A listening socket that never accepts: connects succeed through the
/// kernel backlog, but no byte ever comes back.
pub struct SilentServer {
    pub addr: SocketAddr,
    _listener: TcpListener,
}

impl SilentServer {
    pub fn new() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind silent server");
        Self {
            addr: listener.local_addr().unwrap(),
            _listener: listener,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }
}

/// An address nothing listens on.
pub fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().unwrap()
}

/// Serves each connection on its own thread, recording the highest number
/// of connections handled at once.
pub struct ConcurrencyServer {
    pub addr: SocketAddr,
    pub max_active: Arc<AtomicUsize>,
    handle: thread::JoinHandle<()>,
}

impl ConcurrencyServer {
    pub fn new(connections: usize, hold: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().unwrap();
        let max_active = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        let max = max_active.clone();

        let handle = thread::spawn(move || {
            let mut workers = Vec::new();
            for _ in 0..connections {
                let Ok((mut stream, _)) = listener.accept() else {
                    break;
                };
                let active = active.clone();
                let max = max.clone();
                workers.push(thread::spawn(move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max.fetch_max(now, Ordering::SeqCst);
                    read_request(&mut stream);
                    thread::sleep(hold);
                    active.fetch_sub(1, Ordering::SeqCst);
                    let _ = stream.write_all(&http_response("200 OK", &[], "ok"));
                }));
            }
            for worker in workers {
                let _ = worker.join();
            }
        });

        Self {
            addr,
            max_active,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn join(self) {
        self.handle.join().expect("concurrency server panicked");
    }
}

/// A test CA and a leaf certificate for `localhost` and `127.0.0.1`.
pub struct TestPki {
    pub ca_pem: String,
    pub leaf: CertificateDer<'static>,
    pub leaf_key: PrivateKeyDer<'static>,
}

impl TestPki {
    pub fn new() -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "webservice_probe test CA");
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let leaf_key = KeyPair::generate().unwrap();
        let mut leaf_params =
            CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])
                .unwrap();
        leaf_params
            .distinguished_name
            .push(DnType::CommonName, "localhost");
        let leaf_cert = leaf_params
            .signed_by(&leaf_key, &ca_cert, &ca_key)
            .unwrap();

        Self {
            ca_pem: ca_cert.pem(),
            leaf: leaf_cert.der().clone(),
            leaf_key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(leaf_key.serialize_der())),
        }
    }

    /// `sha256//<base64>` pin of the leaf's SubjectPublicKeyInfo.
    pub fn leaf_pin(&self) -> String {
        let (_, cert) = x509_parser::parse_x509_certificate(self.leaf.as_ref()).unwrap();
        let hash = ring::digest::digest(&ring::digest::SHA256, cert.public_key().raw);
        format!("sha256//{}", BASE64.encode(hash.as_ref()))
    }
}

/// An HTTPS stub answering a fixed number of connections.
///
/// Connections whose handshake fails (the client rejected the certificate)
/// still count towards `connections`.
pub struct TlsStubServer {
    pub addr: SocketAddr,
    handle: thread::JoinHandle<()>,
}

impl TlsStubServer {
    pub fn serve(pki: &TestPki, response: Vec<u8>, connections: usize) -> Self {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![pki.leaf.clone()], pki.leaf_key.clone_key())
            .unwrap();
        let config = Arc::new(config);

        let listener = TcpListener::bind("127.0.0.1:0").expect("bind TLS stub");
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            for _ in 0..connections {
                let Ok((stream, _)) = listener.accept() else {
                    break;
                };
                serve_tls(config.clone(), stream, &response);
            }
        });
        Self { addr, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("https://{}{}", self.addr, path)
    }

    pub fn join(self) {
        self.handle.join().expect("TLS stub panicked");
    }
}

fn serve_tls(config: Arc<rustls::ServerConfig>, stream: TcpStream, response: &[u8]) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let Ok(conn) = rustls::ServerConnection::new(config) else {
        return;
    };
    let mut tls = rustls::StreamOwned::new(conn, stream);
    let request = read_request(&mut tls);
    if request.is_empty() {
        return;
    }
    let _ = tls.write_all(response);
    tls.conn.send_close_notify();
    let _ = tls.flush();
}
