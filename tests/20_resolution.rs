// Resolution precedence and bypass behavior, exercised through the pure
// signal-extraction surface (no server or database required).

use campus_api::config::AppConfig;
use campus_api::middleware::resolve_tenant::{
    extract_hints, is_bypassed, RequestSignals, TenantHint,
};
use uuid::Uuid;

fn signals(host: &str, path: &str) -> RequestSignals {
    RequestSignals {
        host: Some(host.to_string()),
        path: path.to_string(),
        custom_domain_header: None,
        session_tenant: None,
    }
}

#[test]
fn precedence_path_over_subdomain_over_domain_over_session() {
    let mut s = signals("north.campus.example.com", "/acme/courses");
    s.custom_domain_header = Some("learn.acme.edu".to_string());
    s.session_tenant = Some(Uuid::new_v4());

    let hints = extract_hints(&s, &AppConfig::from_env().tenancy);

    assert_eq!(hints.len(), 4);
    assert_eq!(hints[0], TenantHint::PathSlug("acme".to_string()));
    assert_eq!(hints[1], TenantHint::Subdomain("north".to_string()));
    assert_eq!(hints[2], TenantHint::CustomDomain("learn.acme.edu".to_string()));
    assert!(matches!(hints[3], TenantHint::Session(_)));
}

#[test]
fn api_paths_resolve_by_host_not_path() {
    let hints = extract_hints(
        &signals("acme.campus.example.com", "/api/data/students"),
        &AppConfig::from_env().tenancy,
    );
    // "api" is a reserved path segment, so the subdomain drives resolution
    assert!(!hints.iter().any(|h| matches!(h, TenantHint::PathSlug(_))));
    assert_eq!(hints[0], TenantHint::Subdomain("acme".to_string()));
}

#[test]
fn session_is_the_only_signal_for_plain_hosts() {
    let id = Uuid::new_v4();
    let s = RequestSignals {
        host: Some("localhost:3000".to_string()),
        path: "/api/data/students".to_string(),
        custom_domain_header: None,
        session_tenant: Some(id),
    };
    let hints = extract_hints(&s, &AppConfig::from_env().tenancy);
    // localhost yields a custom-domain candidate (harmless, will not match)
    // and the session hint; no slug-shaped hints.
    assert!(!hints.iter().any(|h| matches!(h, TenantHint::PathSlug(_))));
    assert!(!hints.iter().any(|h| matches!(h, TenantHint::Subdomain(_))));
    assert_eq!(hints.last(), Some(&TenantHint::Session(id)));
}

#[test]
fn allow_listed_paths_bypass_resolution() {
    for path in ["/", "/health", "/static/app.css", "/auth/login", "/api/root/tenant"] {
        assert!(is_bypassed(path), "{} should bypass resolution", path);
    }
    for path in ["/api/data/students", "/acme", "/acme/courses"] {
        assert!(!is_bypassed(path), "{} should go through resolution", path);
    }
}
