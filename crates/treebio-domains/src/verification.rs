//! Domain ownership verification
//!
//! Two proof methods are supported: a DNS TXT record at a well-known
//! subdomain, or a file served from a well-known HTTPS path. Both compare
//! against the secret token stored with the domain record. Resolution and
//! transport failures are normal "not yet verified" outcomes with
//! diagnostics, never hard errors - DNS propagation legitimately takes
//! minutes to hours.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Subdomain label queried for TXT proofs: `_treebio-verification.<domain>`.
pub const TXT_RECORD_LABEL: &str = "_treebio-verification";

/// Path fetched for FILE proofs, relative to the domain root.
pub const WELL_KNOWN_PATH: &str = ".well-known/treebio-verification.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMethod {
    Dns,
    File,
}

impl VerificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationMethod::Dns => "dns",
            VerificationMethod::File => "file",
        }
    }

    /// Parse the stored column value, defaulting to DNS on anything
    /// unrecognized.
    pub fn from_db(value: &str) -> Self {
        match value {
            "file" => VerificationMethod::File,
            "dns" => VerificationMethod::Dns,
            other => {
                warn!(
                    "Unknown verification method '{}' on record, treating as dns",
                    other
                );
                VerificationMethod::Dns
            }
        }
    }
}

impl std::fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a collaborator call (DNS resolution or HTTP transport).
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("DNS resolution failed: {0}")]
    Resolve(String),
    #[error("HTTP request failed: {0}")]
    Transport(String),
}

/// DNS resolver collaborator.
#[async_trait]
pub trait TxtResolver: Send + Sync {
    async fn resolve_txt(&self, name: &str) -> Result<Vec<String>, LookupError>;
}

/// Response body from the HTTP fetch collaborator.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status: u16,
    pub body: String,
}

/// HTTP fetch collaborator. `head` exists for reachability probes that do
/// not need a body.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedBody, LookupError>;
    async fn head(&self, url: &str) -> Result<u16, LookupError>;
}

/// System-configured resolver backed by hickory.
pub struct HickoryTxtResolver {
    resolver: hickory_resolver::TokioResolver,
}

impl HickoryTxtResolver {
    pub fn from_system_conf() -> anyhow::Result<Self> {
        let resolver = hickory_resolver::TokioResolver::builder_tokio()?.build();
        Ok(Self { resolver })
    }
}

#[async_trait]
impl TxtResolver for HickoryTxtResolver {
    async fn resolve_txt(&self, name: &str) -> Result<Vec<String>, LookupError> {
        let lookup = self
            .resolver
            .txt_lookup(name)
            .await
            .map_err(|e| LookupError::Resolve(e.to_string()))?;

        Ok(lookup.iter().map(|txt| txt.to_string()).collect())
    }
}

/// reqwest-backed fetcher with a client-level timeout.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<FetchedBody, LookupError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        Ok(FetchedBody { status, body })
    }

    async fn head(&self, url: &str) -> Result<u16, LookupError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        Ok(response.status().as_u16())
    }
}

/// Verdict of a single ownership check.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub verified: bool,
    pub method: VerificationMethod,
    /// Human-readable reasons when not verified; empty on success.
    pub diagnostics: Vec<String>,
}

impl VerificationOutcome {
    fn pass(method: VerificationMethod) -> Self {
        Self {
            verified: true,
            method,
            diagnostics: Vec::new(),
        }
    }

    fn fail(method: VerificationMethod, diagnostics: Vec<String>) -> Self {
        Self {
            verified: false,
            method,
            diagnostics,
        }
    }
}

/// Narrow seam between the lifecycle manager and the actual proof I/O, so
/// state-transition logic can be tested with a deterministic fake.
#[async_trait]
pub trait VerificationChecker: Send + Sync {
    async fn check(
        &self,
        domain: &str,
        method: VerificationMethod,
        token: &str,
    ) -> VerificationOutcome;
}

/// Production checker combining the DNS and HTTP collaborators under one
/// hard deadline per check.
pub struct DomainVerifier {
    resolver: Arc<dyn TxtResolver>,
    fetcher: Arc<dyn HttpFetcher>,
    check_timeout: Duration,
}

impl DomainVerifier {
    pub fn new(
        resolver: Arc<dyn TxtResolver>,
        fetcher: Arc<dyn HttpFetcher>,
        check_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            check_timeout,
        }
    }

    /// Construct with the system resolver and a fresh HTTP client.
    pub fn from_system(check_timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self::new(
            Arc::new(HickoryTxtResolver::from_system_conf()?),
            Arc::new(ReqwestFetcher::new(check_timeout)?),
            check_timeout,
        ))
    }

    async fn check_dns(&self, domain: &str, token: &str) -> VerificationOutcome {
        let name = format!("{}.{}", TXT_RECORD_LABEL, domain);
        debug!("Checking TXT record at {} for domain {}", name, domain);

        let values = match self.resolver.resolve_txt(&name).await {
            Ok(values) => values,
            Err(e) => {
                // NXDOMAIN and friends are expected while DNS propagates
                return VerificationOutcome::fail(
                    VerificationMethod::Dns,
                    vec![format!("TXT lookup for {} failed: {}", name, e)],
                );
            }
        };

        if values.iter().any(|v| v == token) {
            return VerificationOutcome::pass(VerificationMethod::Dns);
        }

        let diagnostic = if values.is_empty() {
            format!("TXT record not found at {}", name)
        } else {
            format!(
                "none of {} TXT record(s) at {} match the verification token",
                values.len(),
                name
            )
        };
        VerificationOutcome::fail(VerificationMethod::Dns, vec![diagnostic])
    }

    async fn check_file(&self, domain: &str, token: &str) -> VerificationOutcome {
        let url = format!("https://{}/{}", domain, WELL_KNOWN_PATH);
        debug!("Fetching verification file at {}", url);

        let response = match self.fetcher.get(&url).await {
            Ok(response) => response,
            Err(e) => {
                return VerificationOutcome::fail(
                    VerificationMethod::File,
                    vec![format!("could not fetch {}: {}", url, e)],
                );
            }
        };

        if !(200..300).contains(&response.status) {
            return VerificationOutcome::fail(
                VerificationMethod::File,
                vec![format!(
                    "verification file request returned status {}",
                    response.status
                )],
            );
        }

        if response.body.trim() == token {
            VerificationOutcome::pass(VerificationMethod::File)
        } else {
            VerificationOutcome::fail(
                VerificationMethod::File,
                vec!["verification file content mismatch".to_string()],
            )
        }
    }
}

#[async_trait]
impl VerificationChecker for DomainVerifier {
    async fn check(
        &self,
        domain: &str,
        method: VerificationMethod,
        token: &str,
    ) -> VerificationOutcome {
        let check = async {
            match method {
                VerificationMethod::Dns => self.check_dns(domain, token).await,
                VerificationMethod::File => self.check_file(domain, token).await,
            }
        };

        match tokio::time::timeout(self.check_timeout, check).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    "Verification check for {} via {} exceeded {:?}",
                    domain, method, self.check_timeout
                );
                VerificationOutcome::fail(
                    method,
                    vec!["verification check timed out".to_string()],
                )
            }
        }
    }
}
