use super::types::{
    AddDomainRequest, DnsRecordResponse, DomainAppState, DomainResponse, HealthResponse,
    ListDomainsResponse, QuotaResponse, VerificationResponse,
};
use crate::service::DomainError;
use treebio_auth::RequireAuth;
use treebio_core::error_builder::ErrorBuilder;
use treebio_core::problemdetails::Problem;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;

// Convert DomainError to Problem for consistent error handling
impl From<DomainError> for Problem {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Database(e) => ErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
                .title("Database Error")
                .detail(e.to_string())
                .build(),
            DomainError::InvalidFormat(domain) => ErrorBuilder::new(StatusCode::BAD_REQUEST)
                .title("Invalid Domain")
                .detail(format!("'{}' is not a fully-qualified domain name", domain))
                .value("domain", domain)
                .build(),
            DomainError::AlreadyRegistered(domain) => ErrorBuilder::new(StatusCode::CONFLICT)
                .title("Domain Already Registered")
                .detail(format!("The domain '{}' is already registered", domain))
                .value("domain", domain)
                .build(),
            DomainError::QuotaExceeded { current, limit } => {
                ErrorBuilder::new(StatusCode::BAD_REQUEST)
                    .title("Quota Exceeded")
                    .detail("Remove another domain before adding a new one")
                    .value("current", current)
                    .value("limit", limit)
                    .build()
            }
            DomainError::NotFound(id) => ErrorBuilder::new(StatusCode::NOT_FOUND)
                .title("Domain Not Found")
                .detail(format!("No domain with ID {}", id))
                .build(),
            DomainError::Forbidden => ErrorBuilder::new(StatusCode::FORBIDDEN)
                .title("Forbidden")
                .detail("You do not own this domain")
                .build(),
            DomainError::NotVerified => ErrorBuilder::new(StatusCode::BAD_REQUEST)
                .title("Domain Not Verified")
                .detail("Verify domain ownership before changing its status")
                .build(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        add_domain,
        list_domains,
        get_domain,
        check_quota,
        verify_domain,
        toggle_domain_status,
        remove_domain,
        get_domain_health
    ),
    components(schemas(
        AddDomainRequest,
        DomainResponse,
        DnsRecordResponse,
        ListDomainsResponse,
        QuotaResponse,
        VerificationResponse,
        HealthResponse
    )),
    info(
        title = "Custom Domains API",
        description = "API endpoints for attaching custom domains to Treebio profiles. \
        Handles registration, ownership verification via DNS TXT record or well-known \
        file, activation toggling, and reachability checks.",
        version = "1.0.0"
    ),
    tags(
        (name = "Domains", description = "Custom domain management endpoints")
    )
)]
pub struct DomainApiDoc;

/// Register a custom domain
///
/// Creates an unverified domain record and returns the DNS records the
/// caller must publish to prove ownership. No verification happens here.
#[utoipa::path(
    post,
    path = "/domains",
    request_body = AddDomainRequest,
    responses(
        (status = 201, description = "Domain registered", body = DomainResponse),
        (status = 400, description = "Invalid domain or quota exceeded"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Domain already registered")
    ),
    tag = "Domains",
    security(("bearer_auth" = []))
)]
async fn add_domain(
    RequireAuth(user): RequireAuth,
    State(app_state): State<Arc<DomainAppState>>,
    Json(request): Json<AddDomainRequest>,
) -> Result<impl IntoResponse, Problem> {
    info!("Registering domain {} for user {}", request.domain, user.id);

    let record = app_state
        .domain_service
        .add_domain(user.id, &request.domain)
        .await
        .map_err(|e| {
            error!("Failed to register domain {}: {}", request.domain, e);
            e
        })?;

    let dns_records = app_state.domain_service.dns_records_for(&record);
    Ok((
        StatusCode::CREATED,
        Json(DomainResponse::from_model(record, dns_records)),
    ))
}

/// List the caller's domains
#[utoipa::path(
    get,
    path = "/domains",
    responses(
        (status = 200, description = "Domains retrieved", body = ListDomainsResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Domains",
    security(("bearer_auth" = []))
)]
async fn list_domains(
    RequireAuth(user): RequireAuth,
    State(app_state): State<Arc<DomainAppState>>,
) -> Result<impl IntoResponse, Problem> {
    let records = app_state.domain_service.list_domains(user.id).await?;

    let domains = records
        .into_iter()
        .map(|record| {
            let dns_records = app_state.domain_service.dns_records_for(&record);
            DomainResponse::from_model(record, dns_records)
        })
        .collect();

    Ok((StatusCode::OK, Json(ListDomainsResponse { domains })))
}

/// Get one of the caller's domains by ID
#[utoipa::path(
    get,
    path = "/domains/{id}",
    responses(
        (status = 200, description = "Domain retrieved", body = DomainResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller does not own this domain"),
        (status = 404, description = "Domain not found")
    ),
    params(("id" = i32, Path, description = "Domain ID")),
    tag = "Domains",
    security(("bearer_auth" = []))
)]
async fn get_domain(
    RequireAuth(user): RequireAuth,
    State(app_state): State<Arc<DomainAppState>>,
    Path(domain_id): Path<i32>,
) -> Result<impl IntoResponse, Problem> {
    let record = app_state
        .domain_service
        .get_domain(user.id, domain_id)
        .await?;

    let dns_records = app_state.domain_service.dns_records_for(&record);
    Ok((
        StatusCode::OK,
        Json(DomainResponse::from_model(record, dns_records)),
    ))
}

/// Check whether the caller may register another domain
#[utoipa::path(
    get,
    path = "/domains/quota",
    responses(
        (status = 200, description = "Quota retrieved", body = QuotaResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Domains",
    security(("bearer_auth" = []))
)]
async fn check_quota(
    RequireAuth(user): RequireAuth,
    State(app_state): State<Arc<DomainAppState>>,
) -> Result<impl IntoResponse, Problem> {
    let quota = app_state.domain_service.can_add_domain(user.id).await?;
    Ok((StatusCode::OK, Json(QuotaResponse::from(quota))))
}

/// Run the ownership proof for a domain
///
/// A failed check is a 200 with `verified=false` and diagnostics - DNS
/// propagation takes time and the caller is expected to retry.
#[utoipa::path(
    post,
    path = "/domains/{id}/verify",
    responses(
        (status = 200, description = "Verification attempted", body = VerificationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Domain not found")
    ),
    params(("id" = i32, Path, description = "Domain ID")),
    tag = "Domains",
    security(("bearer_auth" = []))
)]
async fn verify_domain(
    RequireAuth(_user): RequireAuth,
    State(app_state): State<Arc<DomainAppState>>,
    Path(domain_id): Path<i32>,
) -> Result<impl IntoResponse, Problem> {
    let result = app_state.domain_service.verify_domain(domain_id).await?;
    Ok((StatusCode::OK, Json(VerificationResponse::from(result))))
}

/// Toggle a verified domain between active and inactive
#[utoipa::path(
    post,
    path = "/domains/{id}/toggle",
    responses(
        (status = 200, description = "Status toggled", body = DomainResponse),
        (status = 400, description = "Domain not verified"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller does not own this domain"),
        (status = 404, description = "Domain not found")
    ),
    params(("id" = i32, Path, description = "Domain ID")),
    tag = "Domains",
    security(("bearer_auth" = []))
)]
async fn toggle_domain_status(
    RequireAuth(user): RequireAuth,
    State(app_state): State<Arc<DomainAppState>>,
    Path(domain_id): Path<i32>,
) -> Result<impl IntoResponse, Problem> {
    let record = app_state
        .domain_service
        .toggle_domain_status(user.id, domain_id)
        .await?;

    let dns_records = app_state.domain_service.dns_records_for(&record);
    Ok((
        StatusCode::OK,
        Json(DomainResponse::from_model(record, dns_records)),
    ))
}

/// Remove a domain
///
/// Terminal: the record is hard-deleted and the name becomes free again.
#[utoipa::path(
    delete,
    path = "/domains/{id}",
    responses(
        (status = 204, description = "Domain removed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller does not own this domain"),
        (status = 404, description = "Domain not found")
    ),
    params(("id" = i32, Path, description = "Domain ID")),
    tag = "Domains",
    security(("bearer_auth" = []))
)]
async fn remove_domain(
    RequireAuth(user): RequireAuth,
    State(app_state): State<Arc<DomainAppState>>,
    Path(domain_id): Path<i32>,
) -> Result<impl IntoResponse, Problem> {
    app_state
        .domain_service
        .remove_domain(user.id, domain_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Probe a domain's reachability
///
/// Diagnostic read: never mutates verification state, and an unreachable
/// domain is reported in the body rather than as an error status.
#[utoipa::path(
    get,
    path = "/domains/{id}/health",
    responses(
        (status = 200, description = "Probe completed", body = HealthResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller does not own this domain"),
        (status = 404, description = "Domain not found")
    ),
    params(("id" = i32, Path, description = "Domain ID")),
    tag = "Domains",
    security(("bearer_auth" = []))
)]
async fn get_domain_health(
    RequireAuth(user): RequireAuth,
    State(app_state): State<Arc<DomainAppState>>,
    Path(domain_id): Path<i32>,
) -> Result<impl IntoResponse, Problem> {
    let record = app_state
        .domain_service
        .get_domain(user.id, domain_id)
        .await?;

    let health = app_state.domain_service.get_domain_health(&record.domain).await;
    Ok((
        StatusCode::OK,
        Json(HealthResponse::from_health(record.domain, health)),
    ))
}

pub fn configure_routes() -> Router<Arc<DomainAppState>> {
    Router::new()
        .route("/domains", post(add_domain))
        .route("/domains", get(list_domains))
        .route("/domains/quota", get(check_quota))
        .route("/domains/{id}", get(get_domain))
        .route("/domains/{id}", delete(remove_domain))
        .route("/domains/{id}/verify", post(verify_domain))
        .route("/domains/{id}/toggle", post(toggle_domain_status))
        .route("/domains/{id}/health", get(get_domain_health))
}
