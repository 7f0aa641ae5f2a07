// Tirelire - Money Box Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod denomination;
pub mod deposit;
pub mod error;
pub mod money_box;
pub mod service;
pub mod wealth;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::{AppConfig, ConfigError};
pub use db::{seed_catalog, setup_database, BoxStore, SqliteStore};
pub use denomination::{CashType, Currency, Denomination, DenominationCatalog};
pub use deposit::{parse_batch, parse_value, CashRequest, DepositEngine, DepositRequest};
pub use error::{MoneyBoxError, Result};
pub use money_box::{BoxState, BoxSummary, Holdings, LineItem, MoneyBox};
pub use service::MoneyBoxService;
pub use wealth::{format_money, ContentLine, WealthView};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the tracing subscriber used by both binaries.
///
/// Honors `RUST_LOG`; defaults to `info,tirelire=debug`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tirelire=debug".into());

    // try_init: tests and embedders may already have a subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
