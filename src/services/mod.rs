pub mod lifecycle;
pub mod membership;
pub mod principal;
pub mod registry;

pub use lifecycle::{CloneTenant, CreateOutcome, CreateTenant, PrincipalDirectory, TenantLifecycle};
pub use membership::MembershipService;
pub use principal::PrincipalService;
pub use registry::{TenantCatalog, TenantRegistry};
