// Public authentication endpoints: principal registration and login.
// Both run shared-only; no tenant context exists on these paths.

use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{generate_jwt, Claims};
use crate::config;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::services::membership::MembershipService;
use crate::services::principal::PrincipalService;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/register - create an application-wide principal
pub async fn register(
    Json(payload): Json<RegisterRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    if payload.email.is_empty() || !payload.email.contains('@') {
        return Err(ApiError::bad_request("A valid email is required"));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    let principals = PrincipalService::new().await?;
    let principal = principals
        .create(&payload.email, &payload.display_name, &payload.password)
        .await?;

    Ok(ApiResponse::created(json!({
        "id": principal.id,
        "email": principal.email,
        "display_name": principal.display_name,
    })))
}

/// POST /auth/login - verify credentials and issue a JWT. The token carries
/// the principal's default tenant (if any) as the session resolution signal.
pub async fn login(Json(payload): Json<LoginRequest>) -> Result<ApiResponse<Value>, ApiError> {
    let principals = PrincipalService::new().await?;
    let principal = principals
        .verify_login(&payload.email, &payload.password)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let memberships = MembershipService::new().await?;
    let default_tenant = memberships
        .memberships_of(principal.id)
        .await?
        .into_iter()
        .find(|m| m.is_default)
        .map(|m| m.tenant_id);

    let claims = Claims::new(
        principal.id,
        principal.email.clone(),
        principal.is_root,
        default_tenant,
    );
    let token = generate_jwt(&claims).map_err(|e| {
        tracing::error!("Token generation failed: {}", e);
        ApiError::internal_server_error("An error occurred while processing your request")
    })?;

    Ok(ApiResponse::success(json!({
        "token": token,
        "principal": {
            "id": principal.id,
            "email": principal.email,
            "display_name": principal.display_name,
        },
        "default_tenant_id": default_tenant,
        "expires_in": config::config().security.jwt_expiry_hours * 3600,
    })))
}
