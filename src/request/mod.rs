//! Request descriptors.
//!
//! This module turns the flat attribute maps owned by the node model into
//! immutable `RequestDescriptor` values:
//! - URI, method and HTTP version validation
//! - Deterministic header merging (defaults, caller overrides, derived body headers)
//! - Extraction of whitelisted TLS knobs for `https` endpoints
//!
//! Nothing in this module performs I/O.

mod descriptor;
mod headers;
mod method;
mod tls_options;

use std::collections::HashMap;

use log::warn;

pub use descriptor::{NodeData, RequestDescriptor, Scheme};
pub use headers::{validate_header, HeaderList};
pub use method::HttpMethod;
pub use tls_options::{TlsKnob, TlsOptions};

use crate::config::ProbeConfig;
use crate::error_handling::ConfigurationError;

/// Descriptors for a batch, plus the endpoints whose configuration was rejected.
#[derive(Debug, Default)]
pub struct PreparedBatch {
    pub descriptors: HashMap<String, RequestDescriptor>,
    pub rejected: HashMap<String, ConfigurationError>,
}

/// Builds a descriptor for every node; a bad node never stops the others.
pub fn prepare_batch<'a, I>(nodes: I, config: &ProbeConfig) -> PreparedBatch
where
    I: IntoIterator<Item = (&'a String, &'a NodeData)>,
{
    let mut batch = PreparedBatch::default();
    for (identifier, node) in nodes {
        match RequestDescriptor::from_node_data(identifier, node, config) {
            Ok(descriptor) => {
                batch.descriptors.insert(identifier.clone(), descriptor);
            }
            Err(e) => {
                warn!("Skipping probe of {identifier}: {e}");
                batch.rejected.insert(identifier.clone(), e);
            }
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prepare_batch_separates_rejected_nodes() {
        let nodes: HashMap<String, NodeData> = serde_json::from_value(json!({
            "good": { "uri": "http://10.0.0.1/" },
            "bad-method": { "uri": "http://10.0.0.2/", "http_method": "TRACE" },
            "no-uri": {},
        }))
        .unwrap();

        let batch = prepare_batch(&nodes, &ProbeConfig::default());
        assert_eq!(batch.descriptors.len(), 1);
        assert!(batch.descriptors.contains_key("good"));
        assert_eq!(
            batch.rejected.get("bad-method"),
            Some(&ConfigurationError::UnsupportedMethod("TRACE".into()))
        );
        assert_eq!(
            batch.rejected.get("no-uri"),
            Some(&ConfigurationError::MissingUri)
        );
    }
}
