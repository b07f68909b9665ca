use axum::extract::Extension;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthPrincipal, MemberRole, ResolvedTenant};

/// GET /api/auth/whoami - the caller's identity, resolved tenant and role
pub async fn whoami(
    Extension(principal): Extension<AuthPrincipal>,
    Extension(tenant): Extension<ResolvedTenant>,
    Extension(role): Extension<MemberRole>,
) -> Result<ApiResponse<Value>, ApiError> {
    Ok(ApiResponse::success(json!({
        "principal": {
            "id": principal.id,
            "email": principal.email,
            "is_root": principal.is_root,
        },
        "tenant": {
            "id": tenant.0.id,
            "name": tenant.0.name,
            "slug": tenant.0.slug,
            "plan": tenant.0.plan,
        },
        "role": role.0.as_str(),
    })))
}
