use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, SqlErr,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use treebio_entities::custom_domains;

use crate::health::{DomainHealth, HealthProber};
use crate::policy::DomainPolicy;
use crate::token::generate_verification_token;
use crate::verification::{VerificationChecker, VerificationMethod, TXT_RECORD_LABEL};

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Invalid domain format: {0}")]
    InvalidFormat(String),
    #[error("Domain already registered: {0}")]
    AlreadyRegistered(String),
    #[error("Domain quota exceeded: {current} of {limit} in use")]
    QuotaExceeded { current: u64, limit: u64 },
    #[error("Domain not found: {0}")]
    NotFound(i32),
    #[error("Caller does not own this domain")]
    Forbidden,
    #[error("Domain is not verified")]
    NotVerified,
}

/// Quota snapshot for an owner. Counts are read from the store on every
/// call; there is no cached counter to drift.
#[derive(Debug, Clone)]
pub struct DomainQuota {
    pub can_add: bool,
    pub current: u64,
    pub limit: u64,
}

/// One DNS record the owner should publish, as structured data the UI can
/// render verbatim.
#[derive(Debug, Clone)]
pub struct DnsRecord {
    pub record_type: String,
    pub name: String,
    pub value: String,
}

/// Outcome of a verification attempt. A failed check is a normal result
/// carrying everything the owner needs to retry.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub domain_id: i32,
    pub domain: String,
    pub verified: bool,
    pub method: VerificationMethod,
    pub diagnostics: Vec<String>,
    pub dns_records: Vec<DnsRecord>,
}

/// Lifecycle manager for custom domains.
///
/// Sole owner of record mutation: registration, verification transitions,
/// activation toggling and removal all go through here, and every mutating
/// call authorizes against the record's `owner_id`.
pub struct DomainService {
    db: Arc<DatabaseConnection>,
    checker: Arc<dyn VerificationChecker>,
    prober: Arc<HealthProber>,
    policy: DomainPolicy,
}

impl DomainService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        checker: Arc<dyn VerificationChecker>,
        prober: Arc<HealthProber>,
        policy: DomainPolicy,
    ) -> Self {
        Self {
            db,
            checker,
            prober,
            policy,
        }
    }

    /// Register a domain for an owner. The record starts unverified and
    /// inactive; no network I/O happens here.
    pub async fn add_domain(
        &self,
        owner_id: i32,
        raw_domain: &str,
    ) -> Result<custom_domains::Model, DomainError> {
        let domain = raw_domain.trim().to_lowercase();

        if !self.is_valid_domain(&domain) {
            return Err(DomainError::InvalidFormat(domain));
        }

        info!("Registering domain {} for owner {}", domain, owner_id);

        // Pre-checks give good errors without burning an insert; the unique
        // index stays authoritative for the concurrent case.
        if custom_domains::Entity::find()
            .filter(custom_domains::Column::Domain.eq(&domain))
            .one(self.db.as_ref())
            .await?
            .is_some()
        {
            return Err(DomainError::AlreadyRegistered(domain));
        }

        let quota = self.can_add_domain(owner_id).await?;
        if !quota.can_add {
            return Err(DomainError::QuotaExceeded {
                current: quota.current,
                limit: quota.limit,
            });
        }

        let new_domain = custom_domains::ActiveModel {
            owner_id: Set(owner_id),
            domain: Set(domain.clone()),
            verification_method: Set(VerificationMethod::Dns.as_str().to_string()),
            verification_token: Set(generate_verification_token()),
            is_verified: Set(false),
            is_active: Set(false),
            ..Default::default()
        };

        match new_domain.insert(self.db.as_ref()).await {
            Ok(record) => {
                debug!(
                    "Domain {} registered with ID {} for owner {}",
                    domain, record.id, owner_id
                );
                Ok(record)
            }
            Err(e) => match e.sql_err() {
                // Another caller won the race on the unique domain index
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    warn!("Concurrent registration of domain {}", domain);
                    Err(DomainError::AlreadyRegistered(domain))
                }
                _ => Err(DomainError::Database(e)),
            },
        }
    }

    /// Run the ownership proof for a registered domain.
    ///
    /// Success transitions the record to verified and active in a single
    /// update. Failure leaves the record untouched and returns diagnostics
    /// plus the exact records the owner should have published. Idempotent:
    /// an already-verified record re-confirms without another check.
    pub async fn verify_domain(&self, domain_id: i32) -> Result<VerificationResult, DomainError> {
        let record = custom_domains::Entity::find_by_id(domain_id)
            .one(self.db.as_ref())
            .await?
            .ok_or(DomainError::NotFound(domain_id))?;

        let method = VerificationMethod::from_db(&record.verification_method);

        if record.is_verified {
            debug!(
                "Domain {} already verified, re-confirming without a check",
                record.domain
            );
            return Ok(VerificationResult {
                domain_id: record.id,
                domain: record.domain.clone(),
                verified: true,
                method,
                diagnostics: Vec::new(),
                dns_records: self.dns_records_for(&record),
            });
        }

        let outcome = self
            .checker
            .check(&record.domain, method, &record.verification_token)
            .await;

        if outcome.verified {
            let domain_name = record.domain.clone();
            let mut active: custom_domains::ActiveModel = record.into();
            active.is_verified = Set(true);
            active.is_active = Set(true);
            let updated = active.update(self.db.as_ref()).await?;

            info!(
                "Domain {} verified via {} and activated",
                domain_name, outcome.method
            );

            Ok(VerificationResult {
                domain_id: updated.id,
                domain: updated.domain.clone(),
                verified: true,
                method: outcome.method,
                diagnostics: Vec::new(),
                dns_records: self.dns_records_for(&updated),
            })
        } else {
            info!(
                "Verification of {} via {} not yet successful: {:?}",
                record.domain, outcome.method, outcome.diagnostics
            );

            Ok(VerificationResult {
                domain_id: record.id,
                domain: record.domain.clone(),
                verified: false,
                method: outcome.method,
                diagnostics: outcome.diagnostics,
                dns_records: self.dns_records_for(&record),
            })
        }
    }

    /// Flip a verified domain between active and inactive.
    pub async fn toggle_domain_status(
        &self,
        owner_id: i32,
        domain_id: i32,
    ) -> Result<custom_domains::Model, DomainError> {
        let record = self.find_owned(owner_id, domain_id).await?;

        // Activation only ever starts from a successful verification
        if !record.is_verified && !record.is_active {
            return Err(DomainError::NotVerified);
        }

        let next_state = !record.is_active;
        let domain_name = record.domain.clone();

        let mut active: custom_domains::ActiveModel = record.into();
        active.is_active = Set(next_state);
        let updated = active.update(self.db.as_ref()).await?;

        info!(
            "Domain {} is now {}",
            domain_name,
            if next_state { "active" } else { "inactive" }
        );
        Ok(updated)
    }

    /// Delete a domain record. Terminal; there is no soft delete.
    pub async fn remove_domain(&self, owner_id: i32, domain_id: i32) -> Result<(), DomainError> {
        let record = self.find_owned(owner_id, domain_id).await?;

        custom_domains::Entity::delete_by_id(record.id)
            .exec(self.db.as_ref())
            .await?;

        info!("Domain {} removed by owner {}", record.domain, owner_id);
        Ok(())
    }

    /// All domains registered by an owner, oldest first.
    pub async fn list_domains(
        &self,
        owner_id: i32,
    ) -> Result<Vec<custom_domains::Model>, DomainError> {
        let records = custom_domains::Entity::find()
            .filter(custom_domains::Column::OwnerId.eq(owner_id))
            .order_by_asc(custom_domains::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(records)
    }

    /// Owner-scoped single-record read.
    pub async fn get_domain(
        &self,
        owner_id: i32,
        domain_id: i32,
    ) -> Result<custom_domains::Model, DomainError> {
        self.find_owned(owner_id, domain_id).await
    }

    /// Whether the owner may register another domain. Pure read; the same
    /// check runs again inside `add_domain`.
    pub async fn can_add_domain(&self, owner_id: i32) -> Result<DomainQuota, DomainError> {
        let current = custom_domains::Entity::find()
            .filter(custom_domains::Column::OwnerId.eq(owner_id))
            .count(self.db.as_ref())
            .await?;

        let limit = self.policy.max_domains_per_owner;
        Ok(DomainQuota {
            can_add: current < limit,
            current,
            limit,
        })
    }

    /// Single reachability probe. Never mutates verification state and
    /// never fails: an unreachable domain is reported, not raised.
    pub async fn get_domain_health(&self, domain: &str) -> DomainHealth {
        self.prober.probe(domain).await
    }

    /// The DNS records the owner should publish for this domain, as
    /// structured data for the UI.
    pub fn dns_records_for(&self, record: &custom_domains::Model) -> Vec<DnsRecord> {
        vec![
            DnsRecord {
                record_type: "TXT".to_string(),
                name: format!("{}.{}", TXT_RECORD_LABEL, record.domain),
                value: record.verification_token.clone(),
            },
            DnsRecord {
                record_type: "CNAME".to_string(),
                name: record.domain.clone(),
                value: self.policy.cname_target.clone(),
            },
        ]
    }

    async fn find_owned(
        &self,
        owner_id: i32,
        domain_id: i32,
    ) -> Result<custom_domains::Model, DomainError> {
        let record = custom_domains::Entity::find_by_id(domain_id)
            .one(self.db.as_ref())
            .await?
            .ok_or(DomainError::NotFound(domain_id))?;

        if record.owner_id != owner_id {
            warn!(
                "Owner {} attempted to access domain {} owned by {}",
                owner_id, record.id, record.owner_id
            );
            return Err(DomainError::Forbidden);
        }

        Ok(record)
    }

    fn is_valid_domain(&self, domain: &str) -> bool {
        if domain.is_empty() || domain.len() > 253 {
            return false;
        }

        if domain.starts_with('.') || domain.ends_with('.') {
            return false;
        }

        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 {
            return false;
        }

        for label in &labels {
            if label.is_empty() || label.len() > 63 {
                return false;
            }

            if !label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
            {
                return false;
            }

            if label.starts_with('-') || label.ends_with('-') {
                return false;
            }
        }

        // TLD must be at least two alphabetic characters
        let tld = labels[labels.len() - 1];
        tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::{
        FetchedBody, HttpFetcher, LookupError, VerificationOutcome,
    };
    use async_trait::async_trait;
    use std::time::Duration;
    use treebio_database::test_utils::TestDatabase;

    /// Deterministic checker standing in for real DNS/HTTP proofs.
    struct StaticChecker {
        verified: bool,
    }

    #[async_trait]
    impl VerificationChecker for StaticChecker {
        async fn check(
            &self,
            _domain: &str,
            method: VerificationMethod,
            _token: &str,
        ) -> VerificationOutcome {
            if self.verified {
                VerificationOutcome {
                    verified: true,
                    method,
                    diagnostics: Vec::new(),
                }
            } else {
                VerificationOutcome {
                    verified: false,
                    method,
                    diagnostics: vec!["TXT record not found".to_string()],
                }
            }
        }
    }

    struct UnreachableFetcher;

    #[async_trait]
    impl HttpFetcher for UnreachableFetcher {
        async fn get(&self, _url: &str) -> Result<FetchedBody, LookupError> {
            Err(LookupError::Transport("connection refused".to_string()))
        }

        async fn head(&self, _url: &str) -> Result<u16, LookupError> {
            Err(LookupError::Transport("connection refused".to_string()))
        }
    }

    async fn service_with_checker(verified: bool) -> (TestDatabase, DomainService) {
        let test_db = TestDatabase::with_migrations().await.unwrap();
        let service = build_service(&test_db, verified);
        (test_db, service)
    }

    fn build_service(test_db: &TestDatabase, verified: bool) -> DomainService {
        let prober = HealthProber::new(Arc::new(UnreachableFetcher), Duration::from_millis(100));
        DomainService::new(
            test_db.db.clone(),
            Arc::new(StaticChecker { verified }),
            Arc::new(prober),
            DomainPolicy::default(),
        )
    }

    #[tokio::test]
    async fn add_domain_creates_unverified_inactive_record() {
        let (_db, service) = service_with_checker(true).await;

        let record = service.add_domain(1, "Blog.Example.COM").await.unwrap();
        assert_eq!(record.domain, "blog.example.com");
        assert!(!record.is_verified);
        assert!(!record.is_active);
        assert_eq!(record.verification_method, "dns");
        assert!(record.verification_token.starts_with("treebio-verify-"));

        let listed = service.list_domains(1).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].domain, "blog.example.com");
    }

    #[tokio::test]
    async fn add_domain_rejects_malformed_names() {
        let (_db, service) = service_with_checker(true).await;

        for bad in [
            "",
            "example",
            ".example.com",
            "example.com.",
            "-example.com",
            "example-.com",
            "exa mple.com",
            "*.example.com",
            "example.c",
            "example.c0m",
        ] {
            let result = service.add_domain(1, bad).await;
            assert!(
                matches!(result, Err(DomainError::InvalidFormat(_))),
                "expected InvalidFormat for {:?}",
                bad
            );
        }

        for good in ["example.com", "sub.example.com", "test-site.example.co.uk"] {
            assert!(service.is_valid_domain(good), "expected valid: {:?}", good);
        }
    }

    #[tokio::test]
    async fn duplicate_registration_fails_for_any_owner() {
        let (_db, service) = service_with_checker(true).await;

        service.add_domain(1, "example.com").await.unwrap();

        let same_owner = service.add_domain(1, "example.com").await;
        assert!(matches!(same_owner, Err(DomainError::AlreadyRegistered(_))));

        let other_owner = service.add_domain(2, "example.com").await;
        assert!(matches!(other_owner, Err(DomainError::AlreadyRegistered(_))));

        // Uniqueness is on the normalized form
        let different_case = service.add_domain(2, "EXAMPLE.com").await;
        assert!(matches!(
            different_case,
            Err(DomainError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_registration_has_exactly_one_winner() {
        let (db, service) = service_with_checker(true).await;

        let (first, second) = tokio::join!(
            service.add_domain(1, "race.example.com"),
            service.add_domain(2, "race.example.com")
        );

        let winners = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one registration may succeed");

        let loser = if first.is_ok() { second } else { first };
        assert!(matches!(loser, Err(DomainError::AlreadyRegistered(_))));

        let stored = custom_domains::Entity::find()
            .filter(custom_domains::Column::Domain.eq("race.example.com"))
            .all(db.db.as_ref())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn unique_index_backstops_the_registration_pre_check() {
        let (db, service) = service_with_checker(true).await;

        service.add_domain(1, "taken.example.com").await.unwrap();

        // An insert that slips past the existence pre-check still hits the
        // unique index, and that error is what add_domain maps to
        // AlreadyRegistered.
        let collision = custom_domains::ActiveModel {
            owner_id: Set(2),
            domain: Set("taken.example.com".to_string()),
            verification_method: Set(VerificationMethod::Dns.as_str().to_string()),
            verification_token: Set(generate_verification_token()),
            is_verified: Set(false),
            is_active: Set(false),
            ..Default::default()
        }
        .insert(db.db.as_ref())
        .await;

        let err = collision.unwrap_err();
        assert!(matches!(
            err.sql_err(),
            Some(SqlErr::UniqueConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn quota_is_enforced_and_reported() {
        let (_db, service) = service_with_checker(true).await;

        service.add_domain(1, "one.example.com").await.unwrap();
        service.add_domain(1, "two.example.com").await.unwrap();

        let quota = service.can_add_domain(1).await.unwrap();
        assert!(quota.can_add);
        assert_eq!(quota.current, 2);
        assert_eq!(quota.limit, 3);

        service.add_domain(1, "three.example.com").await.unwrap();

        let quota = service.can_add_domain(1).await.unwrap();
        assert!(!quota.can_add);
        assert_eq!(quota.current, 3);

        let fourth = service.add_domain(1, "four.example.com").await;
        assert!(matches!(
            fourth,
            Err(DomainError::QuotaExceeded {
                current: 3,
                limit: 3
            })
        ));

        // Another owner is unaffected
        assert!(service.can_add_domain(2).await.unwrap().can_add);
    }

    #[tokio::test]
    async fn verify_success_transitions_to_verified_and_active() {
        let (_db, service) = service_with_checker(true).await;

        let record = service.add_domain(1, "blog.example.com").await.unwrap();
        let result = service.verify_domain(record.id).await.unwrap();

        assert!(result.verified);
        assert_eq!(result.method, VerificationMethod::Dns);

        let updated = service.get_domain(1, record.id).await.unwrap();
        assert!(updated.is_verified);
        assert!(updated.is_active);
        assert!(updated.updated_at >= record.updated_at);
    }

    #[tokio::test]
    async fn verify_failure_leaves_record_untouched_with_diagnostics() {
        let (_db, service) = service_with_checker(false).await;

        let record = service.add_domain(1, "blog.example.com").await.unwrap();
        let result = service.verify_domain(record.id).await.unwrap();

        assert!(!result.verified);
        assert!(!result.diagnostics.is_empty());

        // The failure is actionable: it carries the records to publish
        let txt = result
            .dns_records
            .iter()
            .find(|r| r.record_type == "TXT")
            .unwrap();
        assert_eq!(txt.name, "_treebio-verification.blog.example.com");
        assert_eq!(txt.value, record.verification_token);
        let cname = result
            .dns_records
            .iter()
            .find(|r| r.record_type == "CNAME")
            .unwrap();
        assert_eq!(cname.name, "blog.example.com");

        let unchanged = service.get_domain(1, record.id).await.unwrap();
        assert!(!unchanged.is_verified);
        assert!(!unchanged.is_active);
    }

    #[tokio::test]
    async fn verify_unknown_id_is_not_found() {
        let (_db, service) = service_with_checker(true).await;
        let result = service.verify_domain(999).await;
        assert!(matches!(result, Err(DomainError::NotFound(999))));
    }

    #[tokio::test]
    async fn repeated_verify_reconfirms_without_revoking() {
        let (db, service) = service_with_checker(true).await;

        let record = service.add_domain(1, "blog.example.com").await.unwrap();
        assert!(service.verify_domain(record.id).await.unwrap().verified);

        // A later check that would fail must not revoke prior verification
        let failing = build_service(&db, false);
        let result = failing.verify_domain(record.id).await.unwrap();
        assert!(result.verified);

        let still_verified = service.get_domain(1, record.id).await.unwrap();
        assert!(still_verified.is_verified);
        assert!(still_verified.is_active);
    }

    #[tokio::test]
    async fn toggle_requires_verification() {
        let (_db, service) = service_with_checker(true).await;

        let record = service.add_domain(1, "blog.example.com").await.unwrap();
        let result = service.toggle_domain_status(1, record.id).await;
        assert!(matches!(result, Err(DomainError::NotVerified)));

        let unchanged = service.get_domain(1, record.id).await.unwrap();
        assert!(!unchanged.is_verified);
        assert!(!unchanged.is_active);
    }

    #[tokio::test]
    async fn toggle_flips_active_state_for_verified_domain() {
        let (_db, service) = service_with_checker(true).await;

        let record = service.add_domain(1, "blog.example.com").await.unwrap();
        service.verify_domain(record.id).await.unwrap();

        let toggled = service.toggle_domain_status(1, record.id).await.unwrap();
        assert!(!toggled.is_active);
        assert!(toggled.is_verified);

        let toggled_back = service.toggle_domain_status(1, record.id).await.unwrap();
        assert!(toggled_back.is_active);
        assert!(toggled_back.is_verified);
    }

    #[tokio::test]
    async fn mutations_by_non_owner_are_forbidden() {
        let (_db, service) = service_with_checker(true).await;

        let record = service.add_domain(1, "blog.example.com").await.unwrap();
        service.verify_domain(record.id).await.unwrap();

        let toggle = service.toggle_domain_status(2, record.id).await;
        assert!(matches!(toggle, Err(DomainError::Forbidden)));

        let remove = service.remove_domain(2, record.id).await;
        assert!(matches!(remove, Err(DomainError::Forbidden)));

        // Record survives the rejected removal
        assert_eq!(service.list_domains(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_is_terminal() {
        let (_db, service) = service_with_checker(true).await;

        let record = service.add_domain(1, "blog.example.com").await.unwrap();
        service.remove_domain(1, record.id).await.unwrap();

        assert!(service.list_domains(1).await.unwrap().is_empty());
        let again = service.remove_domain(1, record.id).await;
        assert!(matches!(again, Err(DomainError::NotFound(_))));

        // The name is free to register again
        service.add_domain(2, "blog.example.com").await.unwrap();
    }

    #[tokio::test]
    async fn active_always_implies_verified() {
        let (_db, service) = service_with_checker(true).await;

        let record = service.add_domain(1, "blog.example.com").await.unwrap();

        let assert_invariant = |m: &custom_domains::Model| {
            assert!(!m.is_active || m.is_verified, "active but not verified");
        };

        assert_invariant(&service.get_domain(1, record.id).await.unwrap());
        service.verify_domain(record.id).await.unwrap();
        assert_invariant(&service.get_domain(1, record.id).await.unwrap());
        service.toggle_domain_status(1, record.id).await.unwrap();
        assert_invariant(&service.get_domain(1, record.id).await.unwrap());
        service.toggle_domain_status(1, record.id).await.unwrap();
        assert_invariant(&service.get_domain(1, record.id).await.unwrap());
    }

    #[tokio::test]
    async fn tokens_are_unique_per_registration() {
        let (_db, service) = service_with_checker(true).await;

        let a = service.add_domain(1, "one.example.com").await.unwrap();
        let b = service.add_domain(1, "two.example.com").await.unwrap();
        assert_ne!(a.verification_token, b.verification_token);
    }

    #[tokio::test]
    async fn health_check_reports_unreachable_without_error() {
        let (_db, service) = service_with_checker(true).await;

        let health = service.get_domain_health("blog.example.com").await;
        assert!(!health.is_accessible);
        assert!(health.response_time_ms.is_none());
    }

    #[tokio::test]
    async fn full_owner_lifecycle_scenario() {
        let (_db, service) = service_with_checker(true).await;

        // u1 registers a domain; it starts unverified
        let record = service.add_domain(1, "blog.example.com").await.unwrap();
        assert!(!record.is_verified);

        // u1 publishes the TXT record and verifies
        let result = service.verify_domain(record.id).await.unwrap();
        assert!(result.verified);

        // u1 deactivates, then reactivates
        let off = service.toggle_domain_status(1, record.id).await.unwrap();
        assert!(!off.is_active);
        let on = service.toggle_domain_status(1, record.id).await.unwrap();
        assert!(on.is_active);

        // u2 cannot remove u1's domain
        let result = service.remove_domain(2, record.id).await;
        assert!(matches!(result, Err(DomainError::Forbidden)));
    }
}
