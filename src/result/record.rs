//! Serialized result records.

use std::collections::HashMap;

use serde::Serialize;

use super::ProbeResult;
use crate::config::{HEADER_CONTENT_SECURITY_POLICY, HEADER_SERVER};
use crate::tls::TlsFacts;
use crate::utils::ConnectionTiming;

/// The flat record reported for one endpoint.
///
/// `error` is present exactly when the probe failed; the remaining fields are
/// filled in where they apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_csp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<(String, String)>>,
    #[serde(flatten)]
    pub timing: Option<ConnectionTiming>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsFacts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
}

impl From<&ProbeResult> for ResultRecord {
    fn from(result: &ProbeResult) -> Self {
        let mut record = ResultRecord {
            error: result.error_message(),
            error_type: result.error_type().map(|t| t.tag()),
            ..ResultRecord::default()
        };

        match result {
            ProbeResult::Success(success) => {
                record.status = Some(success.status);
                record.http_version = Some(success.http_version.clone());
                record.http_server = success.header(HEADER_SERVER).map(str::to_string);
                record.http_csp = success
                    .header(HEADER_CONTENT_SECURITY_POLICY)
                    .map(str::to_string);
                record.headers = Some(success.headers.clone());
                record.timing = Some(success.timing);
                record.tls = success.tls.clone();
            }
            ProbeResult::UnexpectedStatus {
                status,
                status_message,
                http_version,
            } => {
                record.status = Some(*status);
                record.status_message = Some(status_message.clone());
                record.http_version = Some(http_version.clone());
            }
            ProbeResult::Timeout { after } => {
                record.timeout_seconds = Some(after.as_secs_f64());
            }
            ProbeResult::TransportError { .. } | ProbeResult::Misconfigured { .. } => {}
        }
        record
    }
}

/// Converts a batch of results into records keyed by endpoint identifier.
pub fn to_records(results: &HashMap<String, ProbeResult>) -> HashMap<String, ResultRecord> {
    results
        .iter()
        .map(|(identifier, result)| (identifier.clone(), ResultRecord::from(result)))
        .collect()
}
