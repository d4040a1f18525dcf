//! Canonical datetime types shared across all Treebio crates

use chrono::{DateTime as ChronoDateTime, Utc};

/// Database DateTime type used for TIMESTAMPTZ columns across all crates
pub type DBDateTime = ChronoDateTime<Utc>;

/// Standard UTC DateTime type for API responses
///
/// Serializes as ISO 8601 with a 'Z' suffix, e.g. `2026-08-28T12:15:47.609192Z`.
/// When used with utoipa, annotate the field:
/// ```rust
/// use treebio_core::UtcDateTime;
/// use serde::Serialize;
/// use utoipa::ToSchema;
///
/// #[derive(Serialize, ToSchema)]
/// pub struct Response {
///     #[schema(value_type = String, format = DateTime)]
///     pub checked_at: UtcDateTime,
/// }
/// ```
pub type UtcDateTime = ChronoDateTime<Utc>;
