use uuid::Uuid;

use crate::database::models::membership::Role;

tokio::task_local! {
    static STORE_CONTEXT: StoreContext;
}

/// Where a data access lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    /// The single cross-tenant store (registry, principals, memberships).
    Shared,
    /// One tenant's isolated store, by backing_store_id.
    Tenant(String),
}

/// Ephemeral per-request routing state. Exists only inside the task-local
/// scope wrapped around one in-flight request; dropped with the scope on
/// success, error, and cancellation alike, so it can never leak onto the
/// next request handled by the same worker.
#[derive(Debug, Clone)]
pub struct StoreContext {
    pub target: StoreTarget,
    pub tenant_id: Option<Uuid>,
    pub role: Option<Role>,
}

impl StoreContext {
    /// Context for a request resolved to a tenant.
    pub fn for_tenant(tenant_id: Uuid, backing_store_id: impl Into<String>) -> Self {
        Self {
            target: StoreTarget::Tenant(backing_store_id.into()),
            tenant_id: Some(tenant_id),
            role: None,
        }
    }

    /// Context for shared-only request handling (no tenant resolved).
    pub fn shared() -> Self {
        Self {
            target: StoreTarget::Shared,
            tenant_id: None,
            role: None,
        }
    }

    /// Same context with the access guard's resolved role attached.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Read the context of the current in-flight request, if one is set.
    pub fn current() -> Option<StoreContext> {
        STORE_CONTEXT.try_with(|ctx| ctx.clone()).ok()
    }

    /// Run a future with this context as current. Scopes nest; an inner
    /// scope (e.g. the access guard attaching a role) shadows the outer one
    /// for its duration.
    pub async fn scope<F, T>(self, f: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        STORE_CONTEXT.scope(self, f).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn context_is_empty_outside_scope() {
        assert!(StoreContext::current().is_none());
    }

    #[tokio::test]
    async fn context_visible_inside_scope_and_cleared_after() {
        let tenant_id = Uuid::new_v4();
        let ctx = StoreContext::for_tenant(tenant_id, "tenant_abc");

        ctx.scope(async {
            let current = StoreContext::current().expect("context set");
            assert_eq!(current.target, StoreTarget::Tenant("tenant_abc".into()));
            assert_eq!(current.tenant_id, Some(tenant_id));
            assert!(current.role.is_none());
        })
        .await;

        assert!(StoreContext::current().is_none());
    }

    #[tokio::test]
    async fn context_cleared_even_when_scope_body_panics() {
        let ctx = StoreContext::for_tenant(Uuid::new_v4(), "tenant_abc");
        let result = tokio::spawn(ctx.scope(async {
            panic!("handler blew up");
        }))
        .await;
        assert!(result.is_err());
        assert!(StoreContext::current().is_none());
    }

    #[tokio::test]
    async fn nested_scope_shadows_and_restores() {
        let outer = StoreContext::for_tenant(Uuid::new_v4(), "tenant_outer");
        outer
            .clone()
            .scope(async {
                let inner = StoreContext::current().unwrap().with_role(Role::Admin);
                inner
                    .scope(async {
                        assert_eq!(StoreContext::current().unwrap().role, Some(Role::Admin));
                    })
                    .await;
                // Outer scope restored, role gone
                assert!(StoreContext::current().unwrap().role.is_none());
            })
            .await;
    }

    #[tokio::test]
    async fn concurrent_tasks_carry_independent_contexts() {
        let a = tokio::spawn(
            StoreContext::for_tenant(Uuid::new_v4(), "tenant_a").scope(async {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                match StoreContext::current().unwrap().target {
                    StoreTarget::Tenant(id) => id,
                    StoreTarget::Shared => panic!("wrong target"),
                }
            }),
        );
        let b = tokio::spawn(
            StoreContext::for_tenant(Uuid::new_v4(), "tenant_b").scope(async {
                match StoreContext::current().unwrap().target {
                    StoreTarget::Tenant(id) => id,
                    StoreTarget::Shared => panic!("wrong target"),
                }
            }),
        );
        assert_eq!(a.await.unwrap(), "tenant_a");
        assert_eq!(b.await.unwrap(), "tenant_b");
    }
}
