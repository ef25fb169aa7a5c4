//! Per-connection timing facts.
//!
//! Every phase is measured from the moment the connection was started, so the
//! values are cumulative: `first_byte_ms` includes connect and handshake time.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Timing facts recorded while a connection was driven.
///
/// Phases the connection never reached are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ConnectionTiming {
    /// TCP connect completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_ms: Option<f64>,
    /// TLS handshake completed (https only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_handshake_ms: Option<f64>,
    /// Full request written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_sent_ms: Option<f64>,
    /// First response byte read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_byte_ms: Option<f64>,
    /// Response complete or connection failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ms: Option<f64>,
}

/// Converts a duration to fractional milliseconds.
pub fn duration_to_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Records phase timestamps for one connection.
#[derive(Debug, Clone)]
pub struct TimingRecorder {
    started_at: Instant,
    timing: ConnectionTiming,
}

impl TimingRecorder {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
            timing: ConnectionTiming::default(),
        }
    }

    pub fn connected(&mut self) {
        self.timing.connect_ms = Some(self.elapsed_ms());
    }

    pub fn tls_established(&mut self) {
        self.timing.tls_handshake_ms = Some(self.elapsed_ms());
    }

    pub fn request_sent(&mut self) {
        self.timing.request_sent_ms = Some(self.elapsed_ms());
    }

    /// Only the first call has an effect.
    pub fn first_byte(&mut self) {
        if self.timing.first_byte_ms.is_none() {
            self.timing.first_byte_ms = Some(self.elapsed_ms());
        }
    }

    /// Only the first call has an effect.
    pub fn finished(&mut self) {
        if self.timing.total_ms.is_none() {
            self.timing.total_ms = Some(self.elapsed_ms());
        }
    }

    pub fn timing(&self) -> ConnectionTiming {
        self.timing
    }

    fn elapsed_ms(&self) -> f64 {
        duration_to_ms(self.started_at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_to_ms() {
        assert_eq!(duration_to_ms(Duration::from_millis(1500)), 1500.0);
        assert_eq!(duration_to_ms(Duration::from_micros(250)), 0.25);
    }

    #[test]
    fn test_phases_are_cumulative() {
        let mut recorder = TimingRecorder::start();
        recorder.connected();
        std::thread::sleep(Duration::from_millis(5));
        recorder.first_byte();
        recorder.finished();

        let timing = recorder.timing();
        let connect = timing.connect_ms.unwrap();
        let first_byte = timing.first_byte_ms.unwrap();
        assert!(first_byte >= connect + 5.0);
        assert!(timing.total_ms.unwrap() >= first_byte);
        assert!(timing.tls_handshake_ms.is_none());
    }

    #[test]
    fn test_first_byte_and_finish_are_recorded_once() {
        let mut recorder = TimingRecorder::start();
        recorder.first_byte();
        recorder.finished();
        let before = recorder.timing();

        std::thread::sleep(Duration::from_millis(2));
        recorder.first_byte();
        recorder.finished();
        assert_eq!(recorder.timing(), before);
    }
}
