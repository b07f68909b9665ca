// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert domain error types to ApiError
impl From<crate::database::manager::StoreError> for ApiError {
    fn from(err: crate::database::manager::StoreError) -> Self {
        match err {
            crate::database::manager::StoreError::NotFound(msg) => ApiError::not_found(msg),
            crate::database::manager::StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::service_unavailable("Storage temporarily unavailable")
            }
            other => {
                tracing::error!("Store manager error: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::database::router::RoutingError> for ApiError {
    fn from(err: crate::database::router::RoutingError) -> Self {
        // Routing violations are wiring errors, not client errors
        tracing::error!("Routing violation: {}", err);
        ApiError::internal_server_error("Request could not be routed to a backing store")
    }
}

impl From<crate::services::registry::RegistryError> for ApiError {
    fn from(err: crate::services::registry::RegistryError) -> Self {
        match err {
            crate::services::registry::RegistryError::DuplicateTenant(slug) => {
                ApiError::conflict(format!("Tenant '{}' already exists", slug))
            }
            crate::services::registry::RegistryError::InvalidSlug(msg) => {
                ApiError::bad_request(msg)
            }
            crate::services::registry::RegistryError::NotFound(slug) => {
                ApiError::not_found(format!("Tenant '{}' not found", slug))
            }
            crate::services::registry::RegistryError::Sqlx(sqlx_err) => {
                tracing::error!("Registry query error: {}", sqlx_err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            crate::services::registry::RegistryError::Store(e) => e.into(),
        }
    }
}

impl From<crate::services::lifecycle::LifecycleError> for ApiError {
    fn from(err: crate::services::lifecycle::LifecycleError) -> Self {
        use crate::services::lifecycle::LifecycleError;
        match err {
            LifecycleError::Duplicate(slug) => {
                ApiError::conflict(format!("Tenant '{}' already exists", slug))
            }
            LifecycleError::InFlight(store_id) => ApiError::conflict(format!(
                "A lifecycle operation for store '{}' is already in progress",
                store_id
            )),
            LifecycleError::NotConfirmed => {
                ApiError::bad_request("Tenant deletion requires explicit confirmation")
            }
            LifecycleError::SourceNotProvisioned(slug) => {
                ApiError::conflict(format!("Tenant '{}' has no provisioned store to clone", slug))
            }
            LifecycleError::UnknownPlan(plan) => {
                ApiError::bad_request(format!("Unknown plan '{}'", plan))
            }
            LifecycleError::OwnerNotFound(email) => {
                ApiError::bad_request(format!("Owner principal '{}' not found", email))
            }
            LifecycleError::Registry(e) => e.into(),
            other => {
                tracing::error!("Lifecycle error: {}", other);
                ApiError::internal_server_error("Tenant lifecycle operation failed")
            }
        }
    }
}

impl From<crate::services::principal::PrincipalError> for ApiError {
    fn from(err: crate::services::principal::PrincipalError) -> Self {
        use crate::services::principal::PrincipalError;
        match err {
            PrincipalError::DuplicateEmail(email) => {
                ApiError::conflict(format!("An account already exists for {}", email))
            }
            PrincipalError::Store(e) => e.into(),
            PrincipalError::Sqlx(e) => e.into(),
        }
    }
}

impl From<crate::services::membership::MembershipError> for ApiError {
    fn from(err: crate::services::membership::MembershipError) -> Self {
        use crate::services::membership::MembershipError;
        match err {
            MembershipError::AlreadyMember(_, _) => {
                ApiError::conflict("Principal already holds a membership in this tenant")
            }
            MembershipError::UnknownRole(role) => {
                tracing::error!("Stored role '{}' failed to parse", role);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            MembershipError::Store(e) => e.into(),
            MembershipError::Sqlx(e) => e.into(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found("Record not found"),
            other => {
                tracing::error!("Database error: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
