use axum::{
    middleware::from_fn,
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use campus_api::database::context::StoreTarget;
use campus_api::database::manager::StoreManager;
use campus_api::database::router::EntityDomain;
use campus_api::database::schema::{SchemaRunner, SqlSchemaRunner};
use campus_api::handlers;
use campus_api::middleware::{
    access_guard_middleware, jwt_auth_middleware, require_root_middleware,
    resolve_tenant_middleware,
};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Initialize configuration (this loads the config singleton)
    let config = campus_api::config::config();
    tracing::info!("Starting Campus API in {:?} mode", config.environment);

    // Shared-domain schema belongs to the shared store alone; apply it at
    // startup so a fresh deployment can register tenants immediately.
    if let Err(e) = bootstrap_shared_schema().await {
        tracing::warn!("Shared schema bootstrap failed (continuing degraded): {}", e);
    }

    let app = app();

    // Allow tests or deployments to override port via env
    let port = std::env::var("CAMPUS_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    println!("Campus API server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

async fn bootstrap_shared_schema() -> anyhow::Result<()> {
    let pool = StoreManager::shared_pool().await?;
    SqlSchemaRunner
        .apply(&pool, EntityDomain::Shared, &StoreTarget::Shared)
        .await?;
    Ok(())
}

fn app() -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/auth/register", post(handlers::public::auth::register))
        .route("/auth/login", post(handlers::public::auth::login))
        // Tenant-scoped API: auth, then resolution, then the access guard.
        // Every tenant-scoped endpoint goes through this stack; none opts out.
        .merge(tenant_routes())
        // Operator surface (shared-only; on the resolver bypass list)
        .merge(root_routes())
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn tenant_routes() -> Router {
    use handlers::protected::{students, whoami};

    Router::new()
        .route("/api/auth/whoami", get(whoami::whoami))
        .route(
            "/api/data/students",
            get(students::students_list).post(students::student_create),
        )
        .route("/api/data/students/:id", get(students::student_get))
        .route("/api/data/enrollments", get(students::enrollments_list))
        // Innermost to outermost: guard, resolver, auth
        .layer(from_fn(access_guard_middleware))
        .layer(from_fn(resolve_tenant_middleware))
        .layer(from_fn(jwt_auth_middleware))
}

fn root_routes() -> Router {
    use handlers::elevated::tenant;

    Router::new()
        .route(
            "/api/root/tenant",
            get(tenant::tenant_list).post(tenant::tenant_create),
        )
        .route(
            "/api/root/tenant/:slug",
            get(tenant::tenant_show).delete(tenant::tenant_delete),
        )
        .route("/api/root/tenant/:slug/clone", post(tenant::tenant_clone))
        .route("/api/root/tenant/:slug/active", put(tenant::tenant_set_active))
        .route("/api/root/tenant/:slug/member", delete(tenant::member_revoke))
        .layer(from_fn(require_root_middleware))
        .layer(from_fn(jwt_auth_middleware))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Campus API",
            "version": version,
            "description": "Multi-tenant campus platform backend",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "public_auth": "/auth/register, /auth/login (public)",
                "whoami": "/api/auth/whoami (tenant-scoped)",
                "data": "/api/data/* (tenant-scoped)",
                "root": "/api/root/tenant* (restricted, root access)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match StoreManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "shared_store": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "shared store unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "store_error": e.to_string()
                }
            })),
        ),
    }
}
