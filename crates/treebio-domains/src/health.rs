//! Reachability probing for active domains
//!
//! Health checks are diagnostic reads. They never touch verification
//! state, and an unreachable domain is a result, not an error.

use crate::verification::HttpFetcher;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use treebio_core::UtcDateTime;
use treebio_entities::custom_domains;

/// Result of a single reachability probe.
#[derive(Debug, Clone)]
pub struct DomainHealth {
    pub is_accessible: bool,
    /// Round-trip time of the probe; absent when the domain never answered.
    pub response_time_ms: Option<u64>,
    pub checked_at: UtcDateTime,
}

/// Issues HEAD-equivalent probes with a bounded deadline.
pub struct HealthProber {
    fetcher: Arc<dyn HttpFetcher>,
    timeout: Duration,
}

impl HealthProber {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// Probe `https://<domain>` once. Any HTTP answer counts as reachable;
    /// the status code itself is the origin's business.
    pub async fn probe(&self, domain: &str) -> DomainHealth {
        let url = format!("https://{}", domain);
        let started = Instant::now();

        let result = tokio::time::timeout(self.timeout, self.fetcher.head(&url)).await;
        let checked_at = chrono::Utc::now();

        match result {
            Ok(Ok(status)) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                debug!(
                    "Health probe for {} answered {} in {}ms",
                    domain, status, elapsed_ms
                );
                DomainHealth {
                    is_accessible: true,
                    response_time_ms: Some(elapsed_ms),
                    checked_at,
                }
            }
            Ok(Err(e)) => {
                debug!("Health probe for {} failed: {}", domain, e);
                DomainHealth {
                    is_accessible: false,
                    response_time_ms: None,
                    checked_at,
                }
            }
            Err(_) => {
                debug!(
                    "Health probe for {} timed out after {:?}",
                    domain, self.timeout
                );
                DomainHealth {
                    is_accessible: false,
                    response_time_ms: None,
                    checked_at,
                }
            }
        }
    }
}

/// Optional background monitor sweeping all active domains on a fixed
/// interval and reporting results through tracing.
pub struct HealthMonitor {
    db: Arc<DatabaseConnection>,
    prober: Arc<HealthProber>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(db: Arc<DatabaseConnection>, prober: Arc<HealthProber>, interval: Duration) -> Self {
        Self {
            db,
            prober,
            interval,
        }
    }

    /// Run forever. Intended for `tokio::spawn`.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep().await {
                warn!("Health sweep failed: {}", e);
            }
        }
    }

    /// Probe every active domain once.
    pub async fn sweep(&self) -> Result<Vec<(String, DomainHealth)>, sea_orm::DbErr> {
        let active = custom_domains::Entity::find()
            .filter(custom_domains::Column::IsActive.eq(true))
            .all(self.db.as_ref())
            .await?;

        let mut results = Vec::with_capacity(active.len());
        for record in active {
            let health = self.prober.probe(&record.domain).await;
            info!(
                domain = %record.domain,
                accessible = health.is_accessible,
                response_time_ms = health.response_time_ms,
                "Health probe completed"
            );
            results.push((record.domain, health));
        }

        Ok(results)
    }
}
