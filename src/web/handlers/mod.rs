pub mod account_handlers;
pub mod analytics_handlers;
pub mod application_handlers;
pub mod job_handlers;
pub mod matching_handlers;
pub mod resume_handlers;
pub mod system_handlers;

pub use account_handlers::*;
pub use analytics_handlers::*;
pub use application_handlers::*;
pub use job_handlers::*;
pub use matching_handlers::*;
pub use resume_handlers::*;
pub use system_handlers::*;

use crate::error::ServiceError;
use crate::web::types::ApiError;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Parse a path or body identifier, reporting a 422 on garbage
pub(crate) fn parse_id(raw: &str, conversation_id: Option<String>) -> Result<Uuid, ApiError> {
    crate::utils::parse_uuid(raw)
        .map_err(|e| ApiError::service(ServiceError::validation(e.to_string()), conversation_id))
}

/// Parse an optional RFC 3339 timestamp query parameter
pub(crate) fn parse_timestamp(
    name: &str,
    raw: Option<&str>,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    raw.map(|value| {
        DateTime::parse_from_rfc3339(value)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|_| {
                ApiError::from(ServiceError::validation(format!(
                    "'{}' must be an RFC 3339 timestamp",
                    name
                )))
            })
    })
    .transpose()
}
