//! Ports and Adapters Infrastructure
//!
//! Marker and health-check traits shared by every storage adapter. The ledger
//! store port itself lives in `domain_billing::store`; adapters for it exist
//! for PostgreSQL (`infra_db`) and for in-process use (tests, tooling).
//!
//! ```text
//!        BillingEngine
//!              │
//!              ▼
//!        LedgerStore (port)
//!         ▲          ▲
//!         │          │
//!  PostgresLedger   InMemoryLedger
//!      Store            Store
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker trait for domain ports
///
/// Adapters must be shareable across tasks.
pub trait DomainPort: Send + Sync + 'static {}

/// Health status for an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    /// Adapter is healthy and operational
    Healthy,
    /// Adapter is unhealthy and not operational
    Unhealthy,
}

/// Health check result for an adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Adapter identifier
    pub adapter_id: String,
    /// Current health status
    pub status: AdapterHealth,
    /// Latency of the health check in milliseconds
    pub latency_ms: u64,
    /// Optional message with additional details
    pub message: Option<String>,
    /// Timestamp of the health check
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    /// Builds a healthy result
    pub fn healthy(adapter_id: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        }
    }

    /// Builds an unhealthy result carrying the failure reason
    pub fn unhealthy(adapter_id: impl Into<String>, latency_ms: u64, message: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(message.into()),
            checked_at: Utc::now(),
        }
    }

    /// Returns true if the adapter reported itself healthy
    pub fn is_healthy(&self) -> bool {
        self.status == AdapterHealth::Healthy
    }
}

/// Trait for adapters that support health checks
#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    /// Performs a health check on the adapter
    async fn health_check(&self) -> HealthCheckResult;
}
