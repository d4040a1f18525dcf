//! Policy parameters for the domain lifecycle

use std::time::Duration;

/// Tunable limits for domain registration and checking.
///
/// The defaults match the free tier; paid plans construct their own policy.
#[derive(Debug, Clone)]
pub struct DomainPolicy {
    /// Maximum number of custom domains a single owner may hold.
    pub max_domains_per_owner: u64,
    /// Hard deadline for a single ownership-proof check (DNS or HTTP).
    pub verify_timeout: Duration,
    /// Hard deadline for a reachability probe.
    pub health_timeout: Duration,
    /// Host the owner's CNAME record should point at.
    pub cname_target: String,
}

impl Default for DomainPolicy {
    fn default() -> Self {
        Self {
            max_domains_per_owner: 3,
            verify_timeout: Duration::from_secs(5),
            health_timeout: Duration::from_secs(5),
            cname_target: "domains.treebio.app".to_string(),
        }
    }
}
