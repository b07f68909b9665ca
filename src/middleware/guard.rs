use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::database::context::StoreContext;
use crate::database::models::Role;
use crate::error::ApiError;
use crate::middleware::auth::AuthPrincipal;
use crate::middleware::resolve_tenant::ResolvedTenant;
use crate::services::membership::MembershipService;

/// Role the guard resolved for the current (principal, tenant) pair.
#[derive(Clone, Copy, Debug)]
pub struct MemberRole(pub Role);

/// Access guard for tenant-scoped routes. Order of checks is fixed:
/// unauthenticated principals are rejected before any membership lookup,
/// and non-members are rejected before any tenant-scoped handler runs.
///
/// Non-members receive the same response as for an unknown resource, so a
/// rejection does not confirm the tenant exists.
pub async fn access_guard_middleware(mut request: Request, next: Next) -> Response {
    let tenant = match request.extensions().get::<ResolvedTenant>() {
        Some(t) => t.0.clone(),
        // Tenant-scoped route reached with nothing resolved
        None => return ApiError::not_found("Not found").into_response(),
    };

    let principal = match request.extensions().get::<AuthPrincipal>() {
        Some(p) => p.clone(),
        None => return ApiError::unauthorized("Authentication required").into_response(),
    };

    let memberships = match MembershipService::new().await {
        Ok(m) => m,
        Err(e) => {
            tracing::error!("Membership service unavailable: {}", e);
            return ApiError::internal_server_error("An error occurred while processing your request")
                .into_response();
        }
    };

    match memberships.role_of(principal.id, tenant.id).await {
        Ok(Some(role)) => {
            request.extensions_mut().insert(MemberRole(role));
            // Re-enter the store-context scope with the role attached; the
            // inner scope shadows the resolver's for the rest of the request.
            match StoreContext::current() {
                Some(ctx) => ctx.with_role(role).scope(next.run(request)).await,
                None => {
                    tracing::error!("Access guard ran outside a resolved store context");
                    ApiError::internal_server_error(
                        "An error occurred while processing your request",
                    )
                    .into_response()
                }
            }
        }
        Ok(None) => {
            warn!(
                principal = %principal.id,
                tenant = %tenant.slug,
                "Forbidden: principal holds no membership; responding as not-found"
            );
            ApiError::not_found("Not found").into_response()
        }
        Err(e) => {
            tracing::error!("Membership lookup failed: {}", e);
            ApiError::internal_server_error("An error occurred while processing your request")
                .into_response()
        }
    }
}
