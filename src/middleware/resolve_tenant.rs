use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;
use uuid::Uuid;

use crate::config::{self, TenancyConfig};
use crate::database::context::StoreContext;
use crate::database::models::Tenant;
use crate::error::ApiError;
use crate::middleware::auth::AuthPrincipal;
use crate::services::registry::{RegistryError, TenantRegistry};

/// Tenant resolved for the current request, injected for downstream
/// middleware and handlers.
#[derive(Clone, Debug)]
pub struct ResolvedTenant(pub Tenant);

/// Raw request signals the resolver works from.
#[derive(Debug, Clone, Default)]
pub struct RequestSignals {
    pub host: Option<String>,
    pub path: String,
    pub custom_domain_header: Option<String>,
    pub session_tenant: Option<Uuid>,
}

/// One candidate tenant reference, in resolution precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantHint {
    PathSlug(String),
    Subdomain(String),
    CustomDomain(String),
    Session(Uuid),
}

/// Paths that never resolve a tenant: static assets, health checks, public
/// registration and the shared-admin surface.
const BYPASS_PREFIXES: &[&str] = &["/static/", "/auth/", "/api/root"];
const BYPASS_EXACT: &[&str] = &["/", "/health", "/favicon.ico"];

pub fn is_bypassed(path: &str) -> bool {
    BYPASS_EXACT.contains(&path) || BYPASS_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Extract candidate hints in precedence order:
/// path slug > subdomain > custom domain > session.
pub fn extract_hints(signals: &RequestSignals, tenancy: &TenancyConfig) -> Vec<TenantHint> {
    let mut hints = Vec::new();

    // (1) First path segment as slug, unless reserved
    if let Some(segment) = signals.path.split('/').find(|s| !s.is_empty()) {
        if !tenancy
            .reserved_path_segments
            .iter()
            .any(|r| r == segment)
        {
            hints.push(TenantHint::PathSlug(segment.to_string()));
        }
    }

    // (2) Subdomain of the host, excluding reserved subdomains. A bare
    // apex or localhost has no subdomain signal.
    if let Some(host) = &signals.host {
        let host = host.split(':').next().unwrap_or(host);
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() >= 3 {
            let sub = labels[0];
            if !tenancy.reserved_subdomains.iter().any(|r| r == sub) {
                hints.push(TenantHint::Subdomain(sub.to_string()));
            }
        }
    }

    // (3) Exact custom-domain match: explicit header wins over Host
    if let Some(domain) = &signals.custom_domain_header {
        hints.push(TenantHint::CustomDomain(domain.clone()));
    } else if let Some(host) = &signals.host {
        let host = host.split(':').next().unwrap_or(host).to_string();
        hints.push(TenantHint::CustomDomain(host));
    }

    // (4) Session-held tenant id, for hosts with no URL signal
    if let Some(id) = signals.session_tenant {
        hints.push(TenantHint::Session(id));
    }

    hints
}

/// Walk the hints in order; the first one naming an active, provisioned
/// tenant wins. No match is not an error here: the request proceeds
/// shared-only and any tenant-scoped access fails closed in the router.
pub async fn resolve(
    registry: &TenantRegistry,
    hints: &[TenantHint],
) -> Result<Option<Tenant>, RegistryError> {
    for hint in hints {
        let found = match hint {
            TenantHint::PathSlug(slug) | TenantHint::Subdomain(slug) => {
                registry.find_active_by_slug(slug).await?
            }
            TenantHint::CustomDomain(domain) => {
                registry.find_active_by_custom_domain(domain).await?
            }
            TenantHint::Session(id) => registry.find_active_by_id(*id).await?,
        };
        if let Some(tenant) = found {
            debug!(slug = %tenant.slug, ?hint, "Resolved tenant");
            return Ok(Some(tenant));
        }
    }
    Ok(None)
}

/// Resolver middleware. On a match it wraps the remainder of the request in
/// a task-local store-context scope, which guarantees the context is gone
/// when the response (or error, or cancellation) leaves this frame.
pub async fn resolve_tenant_middleware(mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if is_bypassed(&path) {
        return next.run(request).await;
    }

    let signals = RequestSignals {
        host: request
            .headers()
            .get("host")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
        path,
        custom_domain_header: request
            .headers()
            .get(config::config().tenancy.custom_domain_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
        session_tenant: request
            .extensions()
            .get::<AuthPrincipal>()
            .and_then(|p| p.tenant_id),
    };

    let registry = match TenantRegistry::new().await {
        Ok(r) => r,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let hints = extract_hints(&signals, &config::config().tenancy);
    match resolve(&registry, &hints).await {
        Ok(Some(tenant)) => {
            let ctx = StoreContext::for_tenant(tenant.id, tenant.backing_store_id.clone());
            request.extensions_mut().insert(ResolvedTenant(tenant));
            ctx.scope(next.run(request)).await
        }
        Ok(None) => {
            debug!("No tenant resolved; request runs shared-only");
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn tenancy() -> TenancyConfig {
        AppConfig::from_env().tenancy
    }

    #[test]
    fn bypass_allow_list() {
        assert!(is_bypassed("/"));
        assert!(is_bypassed("/health"));
        assert!(is_bypassed("/static/logo.png"));
        assert!(is_bypassed("/auth/register"));
        assert!(is_bypassed("/api/root/tenant"));
        assert!(!is_bypassed("/api/data/students"));
        assert!(!is_bypassed("/acme/dashboard"));
    }

    #[test]
    fn path_slug_beats_subdomain() {
        let signals = RequestSignals {
            host: Some("other.campus.example.com".into()),
            path: "/acme/dashboard".into(),
            ..Default::default()
        };
        let hints = extract_hints(&signals, &tenancy());
        assert_eq!(hints[0], TenantHint::PathSlug("acme".into()));
        assert_eq!(hints[1], TenantHint::Subdomain("other".into()));
    }

    #[test]
    fn reserved_path_segments_yield_no_path_hint() {
        let signals = RequestSignals {
            host: Some("acme.campus.example.com".into()),
            path: "/api/data/students".into(),
            ..Default::default()
        };
        let hints = extract_hints(&signals, &tenancy());
        assert_eq!(hints[0], TenantHint::Subdomain("acme".into()));
    }

    #[test]
    fn reserved_subdomains_are_skipped() {
        let signals = RequestSignals {
            host: Some("www.campus.example.com".into()),
            path: "/api/data/students".into(),
            ..Default::default()
        };
        let hints = extract_hints(&signals, &tenancy());
        assert!(!hints.iter().any(|h| matches!(h, TenantHint::Subdomain(_))));
    }

    #[test]
    fn apex_and_localhost_have_no_subdomain_signal() {
        for host in ["example.com", "localhost", "localhost:3000"] {
            let signals = RequestSignals {
                host: Some(host.into()),
                path: "/api/data/students".into(),
                ..Default::default()
            };
            let hints = extract_hints(&signals, &tenancy());
            assert!(
                !hints.iter().any(|h| matches!(h, TenantHint::Subdomain(_))),
                "host {} should not produce a subdomain hint",
                host
            );
        }
    }

    #[test]
    fn custom_domain_header_wins_over_host_for_domain_hint() {
        let signals = RequestSignals {
            host: Some("proxy.internal:8080".into()),
            path: "/api/data/students".into(),
            custom_domain_header: Some("learn.acme.edu".into()),
            ..Default::default()
        };
        let hints = extract_hints(&signals, &tenancy());
        assert!(hints.contains(&TenantHint::CustomDomain("learn.acme.edu".into())));
        assert!(!hints.contains(&TenantHint::CustomDomain("proxy.internal".into())));
    }

    #[test]
    fn session_hint_is_last() {
        let id = Uuid::new_v4();
        let signals = RequestSignals {
            host: Some("acme.campus.example.com".into()),
            path: "/acme/dashboard".into(),
            session_tenant: Some(id),
            ..Default::default()
        };
        let hints = extract_hints(&signals, &tenancy());
        assert_eq!(hints.last(), Some(&TenantHint::Session(id)));
        // Full precedence order: path > subdomain > custom domain > session
        assert!(matches!(hints[0], TenantHint::PathSlug(_)));
        assert!(matches!(hints[1], TenantHint::Subdomain(_)));
        assert!(matches!(hints[2], TenantHint::CustomDomain(_)));
        assert!(matches!(hints[3], TenantHint::Session(_)));
    }

    #[test]
    fn host_port_is_stripped() {
        let signals = RequestSignals {
            host: Some("acme.campus.example.com:8443".into()),
            path: "/api/data/students".into(),
            ..Default::default()
        };
        let hints = extract_hints(&signals, &tenancy());
        assert_eq!(hints[0], TenantHint::Subdomain("acme".into()));
    }
}
