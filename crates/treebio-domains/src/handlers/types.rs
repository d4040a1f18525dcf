use crate::health::DomainHealth;
use crate::service::{DnsRecord, DomainQuota, DomainService, VerificationResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

pub struct DomainAppState {
    pub domain_service: Arc<DomainService>,
}

pub fn create_domain_app_state(domain_service: Arc<DomainService>) -> Arc<DomainAppState> {
    Arc::new(DomainAppState { domain_service })
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AddDomainRequest {
    /// Fully-qualified domain name to attach, e.g. "blog.example.com"
    pub domain: String,
}

/// A DNS record the owner should publish, rendered verbatim by the UI.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DnsRecordResponse {
    pub record_type: String,
    pub name: String,
    pub value: String,
}

impl From<DnsRecord> for DnsRecordResponse {
    fn from(record: DnsRecord) -> Self {
        Self {
            record_type: record.record_type,
            name: record.name,
            value: record.value,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct DomainResponse {
    pub id: i32,
    pub domain: String,
    pub verification_method: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
    /// Records to publish for verification and routing
    pub dns_records: Vec<DnsRecordResponse>,
}

impl DomainResponse {
    pub fn from_model(
        record: treebio_entities::custom_domains::Model,
        dns_records: Vec<DnsRecord>,
    ) -> Self {
        Self {
            id: record.id,
            domain: record.domain,
            verification_method: record.verification_method,
            is_verified: record.is_verified,
            is_active: record.is_active,
            created_at: record.created_at.timestamp_millis(),
            updated_at: record.updated_at.timestamp_millis(),
            dns_records: dns_records.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ListDomainsResponse {
    pub domains: Vec<DomainResponse>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct QuotaResponse {
    pub can_add: bool,
    pub current: u64,
    pub limit: u64,
}

impl From<DomainQuota> for QuotaResponse {
    fn from(quota: DomainQuota) -> Self {
        Self {
            can_add: quota.can_add,
            current: quota.current,
            limit: quota.limit,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct VerificationResponse {
    pub domain_id: i32,
    pub domain: String,
    pub verified: bool,
    pub method: String,
    /// Why verification has not succeeded yet; empty on success
    pub diagnostics: Vec<String>,
    pub dns_records: Vec<DnsRecordResponse>,
}

impl From<VerificationResult> for VerificationResponse {
    fn from(result: VerificationResult) -> Self {
        Self {
            domain_id: result.domain_id,
            domain: result.domain,
            verified: result.verified,
            method: result.method.as_str().to_string(),
            diagnostics: result.diagnostics,
            dns_records: result.dns_records.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub domain: String,
    pub is_accessible: bool,
    pub response_time_ms: Option<u64>,
    /// ISO 8601 timestamp of the probe
    pub checked_at: String,
}

impl HealthResponse {
    pub fn from_health(domain: String, health: DomainHealth) -> Self {
        Self {
            domain,
            is_accessible: health.is_accessible,
            response_time_ms: health.response_time_ms,
            checked_at: health.checked_at.to_rfc3339(),
        }
    }
}
