//! Group Ledger - Migration Binary
//!
//! Applies the embedded schema migrations and checks the store is reachable.
//!
//! # Usage
//!
//! ```bash
//! LEDGER_DATABASE_URL=postgres://... cargo run --bin ledger-migrate
//! ```
//!
//! # Environment Variables
//!
//! * `LEDGER_DATABASE_URL` - PostgreSQL connection string (`DATABASE_URL` also accepted)
//! * `LEDGER_MAX_CONNECTIONS` - Pool size (default: 10)
//! * `LEDGER_CONNECT_TIMEOUT_SECS` - Pool acquire timeout (default: 30)
//! * `LEDGER_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `LEDGER_LOG_JSON` - Emit JSON log lines (default: false)

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::HealthCheckable;
use infra_db::{create_pool, run_migrations, LedgerConfig, PostgresLedgerStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = LedgerConfig::from_env().context("failed to load ledger configuration")?;
    config.validate()?;

    init_tracing(&config.log_level, config.log_json);

    let pool = create_pool(config.database_config())
        .await
        .context("failed to connect to the ledger database")?;
    run_migrations(&pool).await?;

    let health = PostgresLedgerStore::new(pool.clone()).health_check().await;
    tracing::info!(
        status = ?health.status,
        latency_ms = health.latency_ms,
        "Ledger store checked"
    );
    if !health.is_healthy() {
        anyhow::bail!(
            "ledger store is unhealthy: {}",
            health.message.unwrap_or_default()
        );
    }

    pool.close().await;
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}
