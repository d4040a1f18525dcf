mod domain_handler;
mod types;

pub use domain_handler::{configure_routes, DomainApiDoc};
pub use types::{
    create_domain_app_state, AddDomainRequest, DnsRecordResponse, DomainAppState, DomainResponse,
    HealthResponse, ListDomainsResponse, QuotaResponse, VerificationResponse,
};
