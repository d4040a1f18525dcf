//! Custom domain verification and lifecycle services

pub mod handlers;
pub mod health;
pub mod policy;
pub mod service;
pub mod token;
pub mod verification;

// Re-export commonly used types
pub use handlers::{configure_routes, create_domain_app_state, DomainApiDoc, DomainAppState};
pub use health::{DomainHealth, HealthMonitor, HealthProber};
pub use policy::DomainPolicy;
pub use service::{
    DnsRecord, DomainError, DomainQuota, DomainService, VerificationResult,
};
pub use token::generate_verification_token;
pub use verification::{
    DomainVerifier, FetchedBody, HickoryTxtResolver, HttpFetcher, LookupError, ReqwestFetcher,
    TxtResolver, VerificationChecker, VerificationMethod, VerificationOutcome,
};
