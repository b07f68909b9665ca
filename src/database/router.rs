use once_cell::sync::Lazy;
use sqlx::PgPool;
use std::collections::HashSet;
use thiserror::Error;
use tracing::error;

use crate::database::context::{StoreContext, StoreTarget};
use crate::database::manager::{StoreError, StoreManager};

/// Which domain an entity belongs to. Fixed at startup; never derived from
/// request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityDomain {
    /// Registry, identity and membership data: always the shared store.
    Shared,
    /// Everything else: the store named by the current request context.
    Tenant,
}

/// Entities owned by the shared store. Anything not listed here is
/// tenant-scoped.
static SHARED_ENTITIES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["tenants", "principals", "memberships"].into_iter().collect());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("tenant-scoped access to '{0}' with no tenant resolved in the request context")]
    Unrouted(String),

    #[error("{domain:?}-domain schema change routed to {target:?} store")]
    DomainMismatch {
        domain: EntityDomain,
        target: StoreTarget,
    },

    #[error("relation between '{0}' and '{1}' would cross store boundaries")]
    CrossStoreRelation(String, String),
}

/// Per-access decision function between the shared store and the current
/// tenant's store. Pure given (entity classification, current context);
/// pool lookup happens only after the decision.
pub struct StoreRouter;

impl StoreRouter {
    /// Classify an entity. The classification is static: a shared entity is
    /// shared for every request, regardless of context.
    pub fn domain_of(entity: &str) -> EntityDomain {
        if SHARED_ENTITIES.contains(entity) {
            EntityDomain::Shared
        } else {
            EntityDomain::Tenant
        }
    }

    /// Decide the target store for one data access.
    ///
    /// Shared entities route to the shared store even when a tenant context
    /// is set. Tenant entities require a tenant context; an empty or
    /// shared-only context fails closed rather than silently reading the
    /// shared store, which would cross tenant boundaries.
    pub fn route(entity: &str) -> Result<StoreTarget, RoutingError> {
        match Self::domain_of(entity) {
            EntityDomain::Shared => Ok(StoreTarget::Shared),
            EntityDomain::Tenant => match StoreContext::current() {
                Some(ctx) => match ctx.target {
                    StoreTarget::Tenant(store_id) => Ok(StoreTarget::Tenant(store_id)),
                    StoreTarget::Shared => {
                        let err = RoutingError::Unrouted(entity.to_string());
                        error!("{}", err);
                        Err(err)
                    }
                },
                None => {
                    let err = RoutingError::Unrouted(entity.to_string());
                    error!("{}", err);
                    Err(err)
                }
            },
        }
    }

    /// Resolve the routed target to a live connection pool.
    pub async fn pool_for(entity: &str) -> Result<PgPool, RouterPoolError> {
        match Self::route(entity)? {
            StoreTarget::Shared => Ok(StoreManager::shared_pool().await?),
            StoreTarget::Tenant(store_id) => Ok(StoreManager::tenant_pool(&store_id).await?),
        }
    }

    /// Relations may only join entities that resolve to the same store, with
    /// one exception: the shared Principal entity may be referenced from
    /// tenant-side data (by id value, never by storage-level foreign key).
    pub fn check_relation(left: &str, right: &str) -> Result<(), RoutingError> {
        if Self::domain_of(left) == Self::domain_of(right) {
            return Ok(());
        }
        if left == "principals" || right == "principals" {
            return Ok(());
        }
        let err = RoutingError::CrossStoreRelation(left.to_string(), right.to_string());
        error!("{}", err);
        Err(err)
    }

    /// Schema changes are routed per target store and must never mix
    /// domains: tenant-domain DDL never touches the shared store and
    /// shared-domain DDL never touches a tenant store.
    pub fn check_schema_target(
        domain: EntityDomain,
        target: &StoreTarget,
    ) -> Result<(), RoutingError> {
        let ok = matches!(
            (domain, target),
            (EntityDomain::Shared, StoreTarget::Shared)
                | (EntityDomain::Tenant, StoreTarget::Tenant(_))
        );
        if ok {
            Ok(())
        } else {
            let err = RoutingError::DomainMismatch {
                domain,
                target: target.clone(),
            };
            error!("{}", err);
            Err(err)
        }
    }
}

#[derive(Debug, Error)]
pub enum RouterPoolError {
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RouterPoolError> for crate::error::ApiError {
    fn from(err: RouterPoolError) -> Self {
        match err {
            RouterPoolError::Routing(e) => e.into(),
            RouterPoolError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::context::StoreContext;
    use uuid::Uuid;

    #[test]
    fn classification_is_static() {
        assert_eq!(StoreRouter::domain_of("tenants"), EntityDomain::Shared);
        assert_eq!(StoreRouter::domain_of("principals"), EntityDomain::Shared);
        assert_eq!(StoreRouter::domain_of("memberships"), EntityDomain::Shared);
        assert_eq!(StoreRouter::domain_of("students"), EntityDomain::Tenant);
        assert_eq!(StoreRouter::domain_of("enrollments"), EntityDomain::Tenant);
    }

    #[tokio::test]
    async fn shared_entity_routes_shared_regardless_of_context() {
        // No context at all
        assert_eq!(StoreRouter::route("tenants"), Ok(StoreTarget::Shared));

        // Tenant context set: shared entity still routes shared
        StoreContext::for_tenant(Uuid::new_v4(), "tenant_abc")
            .scope(async {
                assert_eq!(StoreRouter::route("memberships"), Ok(StoreTarget::Shared));
            })
            .await;
    }

    #[tokio::test]
    async fn tenant_entity_requires_tenant_context() {
        // Empty context fails closed
        assert_eq!(
            StoreRouter::route("students"),
            Err(RoutingError::Unrouted("students".into()))
        );

        // Shared-only context fails closed too
        StoreContext::shared()
            .scope(async {
                assert!(StoreRouter::route("students").is_err());
            })
            .await;

        // Tenant context routes to that tenant's store
        StoreContext::for_tenant(Uuid::new_v4(), "tenant_abc")
            .scope(async {
                assert_eq!(
                    StoreRouter::route("students"),
                    Ok(StoreTarget::Tenant("tenant_abc".into()))
                );
            })
            .await;
    }

    #[test]
    fn relations_stay_within_one_store() {
        assert!(StoreRouter::check_relation("students", "enrollments").is_ok());
        assert!(StoreRouter::check_relation("tenants", "memberships").is_ok());
        // Principal is the one shared entity referencable from tenant data
        assert!(StoreRouter::check_relation("students", "principals").is_ok());
        assert!(StoreRouter::check_relation("students", "memberships").is_err());
    }

    #[test]
    fn schema_changes_never_mix_domains() {
        let tenant_store = StoreTarget::Tenant("tenant_abc".into());
        assert!(StoreRouter::check_schema_target(EntityDomain::Shared, &StoreTarget::Shared).is_ok());
        assert!(StoreRouter::check_schema_target(EntityDomain::Tenant, &tenant_store).is_ok());
        assert!(StoreRouter::check_schema_target(EntityDomain::Shared, &tenant_store).is_err());
        assert!(
            StoreRouter::check_schema_target(EntityDomain::Tenant, &StoreTarget::Shared).is_err()
        );
    }
}
