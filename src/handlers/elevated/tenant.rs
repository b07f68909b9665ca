// Operator tenant-lifecycle endpoints. Root access only; all registry reads
// and lifecycle operations run against the shared store, so these routes sit
// on the resolver bypass list.

use axum::extract::{Json, Path, Query};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::Tenant;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::services::lifecycle::{CloneTenant, CreateOutcome, CreateTenant, TenantLifecycle};
use crate::services::membership::MembershipService;
use crate::services::principal::PrincipalService;
use crate::services::registry::TenantRegistry;

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
    pub contact_email: String,
    pub slug: Option<String>,
    pub owner_email: Option<String>,
    pub plan: Option<String>,
    pub custom_domain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CloneTenantRequest {
    pub name: String,
    pub slug: Option<String>,
    pub plan: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteTenantQuery {
    #[serde(default)]
    pub confirm: bool,
}

fn tenant_json(tenant: &Tenant) -> Value {
    json!({
        "id": tenant.id,
        "name": tenant.name,
        "slug": tenant.slug,
        "custom_domain": tenant.custom_domain,
        "backing_store_id": tenant.backing_store_id,
        "plan": tenant.plan,
        "is_active": tenant.is_active,
        "is_verified": tenant.is_verified,
        "is_provisioned": tenant.is_provisioned,
        "created_at": tenant.created_at,
    })
}

/// POST /api/root/tenant - provision a new tenant and its isolated store
pub async fn tenant_create(
    Json(payload): Json<CreateTenantRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let lifecycle = TenantLifecycle::new().await?;
    let (tenant, outcome) = lifecycle
        .create(CreateTenant {
            name: payload.name,
            contact_email: payload.contact_email,
            slug: payload.slug,
            owner_email: payload.owner_email,
            plan: payload.plan,
            custom_domain: payload.custom_domain,
        })
        .await?;

    let body = json!({
        "tenant": tenant_json(&tenant),
        "outcome": match outcome {
            CreateOutcome::Created => "created",
            CreateOutcome::Resumed => "resumed",
            CreateOutcome::NoOp => "already-provisioned",
        },
    });

    let status = match outcome {
        CreateOutcome::NoOp => StatusCode::OK,
        _ => StatusCode::CREATED,
    };
    Ok(ApiResponse::with_status(body, status))
}

/// GET /api/root/tenant - list all tenants
pub async fn tenant_list() -> Result<ApiResponse<Value>, ApiError> {
    let registry = TenantRegistry::new().await?;
    let tenants = registry.list().await?;
    let items: Vec<Value> = tenants.iter().map(tenant_json).collect();
    Ok(ApiResponse::success(json!({ "tenants": items })))
}

/// GET /api/root/tenant/:slug - show one tenant
pub async fn tenant_show(Path(slug): Path<String>) -> Result<ApiResponse<Value>, ApiError> {
    let registry = TenantRegistry::new().await?;
    let tenant = registry
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Tenant '{}' not found", slug)))?;
    Ok(ApiResponse::success(tenant_json(&tenant)))
}

/// DELETE /api/root/tenant/:slug?confirm=true - tear down store and registry row
pub async fn tenant_delete(
    Path(slug): Path<String>,
    Query(query): Query<DeleteTenantQuery>,
) -> Result<ApiResponse<Value>, ApiError> {
    let lifecycle = TenantLifecycle::new().await?;
    lifecycle.delete(&slug, query.confirm).await?;
    Ok(ApiResponse::success(json!({ "deleted": slug })))
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// PUT /api/root/tenant/:slug/active - activate or deactivate a tenant.
/// Deactivation hides the tenant from resolution; the backing store is
/// untouched and reactivation restores it as-is.
pub async fn tenant_set_active(
    Path(slug): Path<String>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let registry = TenantRegistry::new().await?;
    let tenant = registry
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Tenant '{}' not found", slug)))?;
    registry.set_active(tenant.id, payload.is_active).await?;
    Ok(ApiResponse::success(json!({
        "slug": slug,
        "is_active": payload.is_active,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RevokeMemberRequest {
    pub email: String,
}

/// DELETE /api/root/tenant/:slug/member - revoke a principal's membership
pub async fn member_revoke(
    Path(slug): Path<String>,
    Json(payload): Json<RevokeMemberRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let registry = TenantRegistry::new().await?;
    let tenant = registry
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Tenant '{}' not found", slug)))?;

    let principals = PrincipalService::new().await?;
    let principal = principals
        .find_by_email(&payload.email)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No account for {}", payload.email)))?;

    MembershipService::new()
        .await?
        .revoke(principal.id, tenant.id)
        .await?;

    Ok(ApiResponse::success(json!({
        "revoked": payload.email,
        "tenant": slug,
    })))
}

/// POST /api/root/tenant/:slug/clone - copy a tenant's store into a new tenant
pub async fn tenant_clone(
    Path(slug): Path<String>,
    Json(payload): Json<CloneTenantRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let lifecycle = TenantLifecycle::new().await?;
    let (tenant, _) = lifecycle
        .clone_from(CloneTenant {
            source_slug: slug,
            name: payload.name,
            slug: payload.slug,
            plan: payload.plan,
        })
        .await?;
    Ok(ApiResponse::created(json!({ "tenant": tenant_json(&tenant) })))
}
