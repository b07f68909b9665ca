pub mod auth;
pub mod guard;
pub mod resolve_tenant;
pub mod response;

pub use auth::{jwt_auth_middleware, require_root_middleware, AuthPrincipal};
pub use guard::{access_guard_middleware, MemberRole};
pub use resolve_tenant::{resolve_tenant_middleware, ResolvedTenant};
pub use response::ApiResponse;
