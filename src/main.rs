//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `webservice_probe` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - Reading the batch file and pre-resolving host names
//! - Printing the result records as JSON
//!
//! All probing is implemented in the library crate.

use std::collections::{BTreeMap, HashMap};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, warn};
use serde_json::Value;
use tokio::task::JoinSet;
use url::{Host, Url};

use webservice_probe::config::{ATTR_ADDRESS, ATTR_URI};
use webservice_probe::initialization::{init_crypto_provider, init_logger_with};
use webservice_probe::{probe_async, to_records, BatchProber, NodeData, Opt, ProbeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    init_logger_with(opt.log_level.clone().into(), opt.log_format.clone())
        .context("Failed to initialize logger")?;
    init_crypto_provider();
    debug!("{}", webservice_probe::version_string(true));

    match run(&opt).await {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(e) => {
            eprintln!("webservice_probe error: {:#}", e);
            process::exit(1);
        }
    }
}

async fn run(opt: &Opt) -> Result<String> {
    let raw = tokio::fs::read_to_string(&opt.file)
        .await
        .with_context(|| format!("Failed to read {}", opt.file.display()))?;
    let mut nodes: HashMap<String, NodeData> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON object of node attributes", opt.file.display()))?;

    resolve_hosts(&mut nodes).await;

    let prober = BatchProber::new(ProbeConfig::from(opt));
    let results = probe_async(prober, nodes)
        .await
        .context("Probe batch failed")?;

    let records: BTreeMap<_, _> = to_records(&results).into_iter().collect();
    let output = if opt.pretty {
        serde_json::to_string_pretty(&records)
    } else {
        serde_json::to_string(&records)
    }
    .context("Failed to serialize results")?;
    Ok(output)
}

/// Fills in `address` for nodes whose URI names a host rather than an IP.
///
/// Lookups run concurrently; a node whose host doesn't resolve is left alone
/// and gets reported as misconfigured by the prober.
async fn resolve_hosts(nodes: &mut HashMap<String, NodeData>) {
    let mut lookups = JoinSet::new();
    for (identifier, node) in nodes.iter() {
        if node.contains_key(ATTR_ADDRESS) {
            continue;
        }
        let Some(host) = domain_host(node) else {
            continue;
        };
        let identifier = identifier.clone();
        lookups.spawn(async move {
            // Port is irrelevant here; the descriptor takes it from the URI
            let resolved = tokio::net::lookup_host((host.as_str(), 0))
                .await
                .map(|mut addrs| addrs.next());
            (identifier, host, resolved)
        });
    }

    while let Some(joined) = lookups.join_next().await {
        let Ok((identifier, host, resolved)) = joined else {
            continue;
        };
        match resolved {
            Ok(Some(addr)) => {
                debug!("Resolved {host} to {} for {identifier}", addr.ip());
                if let Some(node) = nodes.get_mut(&identifier) {
                    node.insert(ATTR_ADDRESS.to_string(), Value::String(addr.ip().to_string()));
                }
            }
            Ok(None) => warn!("{host} has no addresses"),
            Err(e) => warn!("Couldn't resolve {host} for {identifier}: {e}"),
        }
    }
}

fn domain_host(node: &NodeData) -> Option<String> {
    let uri = Url::parse(node.get(ATTR_URI)?.as_str()?).ok()?;
    match uri.host()? {
        Host::Domain(domain) => Some(domain.to_string()),
        Host::Ipv4(_) | Host::Ipv6(_) => None,
    }
}
