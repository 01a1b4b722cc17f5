//! Minimal logging setup for a one-shot binary — `RUST_LOG` or a sane
//! default, no file rotation or OpenTelemetry (those belong to a
//! long-running server, not a CLI that exits after one validation run).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "conform_cli=info,conform_validator=info".into()))
        .with(fmt::layer())
        .init();
}
