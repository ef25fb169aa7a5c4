//! Mapping finished connections onto results.

use log::debug;

use super::{ProbeResult, ProbeSuccess};
use crate::connection::Connection;
use crate::error_handling::TransportError;

/// Classifies a connection that reached `Complete` or `Failed`.
///
/// A complete response is a success only when its status equals the
/// descriptor's expected status. Deadline cut-offs never get here; the prober
/// records those as timeouts itself.
///
/// # Errors
///
/// Returns `TransportError::NotFinished` if the connection isn't terminal or
/// its outcome was already taken.
pub fn classify(connection: &mut Connection) -> Result<ProbeResult, TransportError> {
    let state = connection.state();
    if !state.is_terminal() {
        return Err(TransportError::NotFinished(state.to_string()));
    }
    let outcome = connection
        .take_outcome()
        .ok_or_else(|| TransportError::NotFinished(format!("{state}, outcome already taken")))?;

    let response = match outcome {
        Ok(response) => response,
        Err(error) => return Ok(ProbeResult::transport_error(&error)),
    };

    let expected = connection.descriptor().expected_status();
    if response.status != expected {
        debug!(
            "{} answered {} where {} was expected",
            connection.identifier(),
            response.status,
            expected
        );
        return Ok(ProbeResult::unexpected_status(
            response.status,
            &response.reason,
            &response.http_version,
        ));
    }

    Ok(ProbeResult::Success(ProbeSuccess {
        status: response.status,
        http_version: response.http_version,
        headers: response.headers,
        timing: connection.timing(),
        tls: connection.tls_facts().cloned(),
    }))
}
