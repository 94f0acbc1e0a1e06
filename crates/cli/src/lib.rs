//! `rs-select`: offline replication server selection.
//!
//! Provides commands for:
//! - Evaluating a recorded topology scenario
//! - Encoding and decoding CSNs

pub mod commands;
pub mod config;

pub use commands::{evaluate, Cli, Command, CsnAction};
pub use config::Scenario;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the fmt subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // a second call keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
