//! Process-level setup for the command-line binary.
//!
//! This module provides:
//! - Logger installation (plain or JSON lines)
//! - Installation of the process-wide rustls crypto provider
//!
//! The library itself never calls into this module; embedding schedulers
//! bring their own logger.

mod logger;

use rustls::crypto::{ring::default_provider, CryptoProvider};

// Re-export public API
pub use logger::init_logger_with;

/// Installs `ring` as the process-wide crypto provider for `rustls`.
///
/// Client configurations built by this crate name their provider explicitly,
/// so this only matters to other rustls users in the same process.
pub fn init_crypto_provider() {
    // Keeps any provider installed earlier
    let _ = CryptoProvider::install_default(default_provider());
}
