//! One run of the readiness loop.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use mio::{Events, Poll, Token};

use super::ProbeResults;
use crate::config::{ProbeConfig, EVENTS_CAPACITY};
use crate::connection::{Connection, Progress};
use crate::error_handling::{InitializationError, TransportError};
use crate::request::{RequestDescriptor, Scheme};
use crate::result::{classify, ProbeResult};
use crate::tls::TlsConfigCache;

/// State owned by a single `probe` call: the poller, the connections in
/// flight, the endpoints still waiting for a slot and the results so far.
///
/// Everything here lives on the calling thread and is dropped when the batch
/// returns, so nothing is shared between batches.
pub(super) struct Batch<'a> {
    config: &'a ProbeConfig,
    timeout: Duration,
    poll: Poll,
    events: Events,
    tls_configs: TlsConfigCache,
    queued: VecDeque<(String, RequestDescriptor)>,
    live: HashMap<Token, (String, Connection)>,
    results: ProbeResults,
    limit: usize,
    next_token: usize,
}

impl<'a> Batch<'a> {
    pub(super) fn new(
        config: &'a ProbeConfig,
        descriptors: HashMap<String, RequestDescriptor>,
        timeout: Duration,
    ) -> Result<Self, InitializationError> {
        let poll = Poll::new().map_err(InitializationError::PollerError)?;
        let total = descriptors.len();
        Ok(Self {
            config,
            timeout,
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            tls_configs: TlsConfigCache::new(),
            queued: descriptors.into_iter().collect(),
            live: HashMap::new(),
            results: HashMap::with_capacity(total),
            limit: config.max_concurrency.filter(|&n| n > 0).unwrap_or(usize::MAX),
            next_token: 0,
        })
    }

    /// Drives every endpoint to a result, finishing no later than `timeout`
    /// after the connections were started.
    pub(super) fn run(mut self) -> ProbeResults {
        self.start_queued();
        // `None` when the timeout is too large for an `Instant`; the batch then
        // runs until every endpoint finishes.
        let deadline = Instant::now().checked_add(self.timeout);
        if deadline.is_none() {
            debug!("Timeout of {:?} has no reachable deadline", self.timeout);
        }

        while !self.live.is_empty() || !self.queued.is_empty() {
            let now = Instant::now();
            let wait = match deadline {
                Some(deadline) if now >= deadline => break,
                Some(deadline) => (deadline - now).min(self.config.poll_slice),
                None => self.config.poll_slice,
            };

            if let Err(e) = self.poll.poll(&mut self.events, Some(wait)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!("Readiness poll failed: {e}");
                self.abandon(&e);
                break;
            }

            let ready: Vec<Token> = self.events.iter().map(|event| event.token()).collect();
            for token in ready {
                self.drive(token);
            }
            self.start_queued();
        }

        self.expire();
        self.results
    }

    /// Starts queued endpoints while concurrency slots are free.
    fn start_queued(&mut self) {
        while self.live.len() < self.limit {
            let Some((identifier, descriptor)) = self.queued.pop_front() else {
                break;
            };

            let tls_config = match descriptor.scheme() {
                Scheme::Https => match descriptor
                    .tls()
                    .map(|options| self.tls_configs.get_or_build(options))
                    .transpose()
                {
                    Ok(config) => config,
                    Err(e) => {
                        warn!("Not probing {identifier}: {e}");
                        self.record(identifier, ProbeResult::misconfigured(&e));
                        continue;
                    }
                },
                Scheme::Http => None,
            };

            let token = Token(self.next_token);
            self.next_token += 1;
            let mut connection =
                Connection::new(descriptor, token, tls_config, self.config.max_response_bytes);
            if connection.start(self.poll.registry()) == Progress::Finished {
                self.finish(identifier, connection);
            } else {
                self.live.insert(token, (identifier, connection));
            }
        }
    }

    fn drive(&mut self, token: Token) {
        let Some((_, connection)) = self.live.get_mut(&token) else {
            return;
        };
        if connection.drive(self.poll.registry()) != Progress::Finished {
            return;
        }
        if let Some((identifier, connection)) = self.live.remove(&token) {
            self.finish(identifier, connection);
        }
    }

    /// Releases a terminal connection and records its classified result.
    fn finish(&mut self, identifier: String, mut connection: Connection) {
        let released = connection.release(self.poll.registry());
        if let Err(e) = &released {
            debug!("Error releasing socket for {identifier}: {e}");
        }

        let result = classify(&mut connection).unwrap_or_else(|e| {
            let error = released.err().map(TransportError::Io).unwrap_or(e);
            warn!("Couldn't classify {identifier}: {error}");
            ProbeResult::transport_error(&error)
        });
        self.record(identifier, result);
    }

    /// Cuts off everything still in flight or queued once the deadline passed.
    fn expire(&mut self) {
        let timed_out = self.live.len() + self.queued.len();
        if timed_out > 0 {
            warn!(
                "{timed_out} endpoint(s) timed out after {:.3}s",
                self.timeout.as_secs_f64()
            );
        }

        let live: Vec<_> = self.live.drain().map(|(_, entry)| entry).collect();
        for (identifier, mut connection) in live {
            debug!(
                "Timing out {identifier} in state {}",
                connection.state()
            );
            if let Err(e) = connection.release(self.poll.registry()) {
                debug!("Error releasing socket for {identifier}: {e}");
            }
            self.record(identifier, ProbeResult::timeout(self.timeout));
        }
        while let Some((identifier, _)) = self.queued.pop_front() {
            self.record(identifier, ProbeResult::timeout(self.timeout));
        }
    }

    /// Fails every remaining endpoint after the poller itself broke.
    fn abandon(&mut self, cause: &io::Error) {
        let live: Vec<_> = self.live.drain().map(|(_, entry)| entry).collect();
        for (identifier, mut connection) in live {
            let _ = connection.release(self.poll.registry());
            let error = TransportError::Io(io::Error::new(cause.kind(), cause.to_string()));
            self.record(identifier, ProbeResult::transport_error(&error));
        }
        while let Some((identifier, _)) = self.queued.pop_front() {
            let error = TransportError::Io(io::Error::new(cause.kind(), cause.to_string()));
            self.record(identifier, ProbeResult::transport_error(&error));
        }
    }

    fn record(&mut self, identifier: String, result: ProbeResult) {
        if self.results.insert(identifier.clone(), result).is_some() {
            error!("Endpoint {identifier} was recorded twice");
        }
    }
}
