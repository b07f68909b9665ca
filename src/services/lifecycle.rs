use async_trait::async_trait;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::context::StoreTarget;
use crate::database::manager::{PgStoreAdmin, StoreAdmin, StoreError};
use crate::database::models::tenant::KNOWN_PLANS;
use crate::database::models::{Principal, Role, Tenant};
use crate::database::router::EntityDomain;
use crate::database::schema::{SchemaError, SchemaRunner, SqlSchemaRunner};
use crate::services::membership::{MembershipError, MembershipService};
use crate::services::principal::{PrincipalError, PrincipalService};
use crate::services::registry::{NewTenant, RegistryError, TenantCatalog, TenantRegistry};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Tenant already exists: {0}")]
    Duplicate(String),

    #[error("Lifecycle operation already in progress for store: {0}")]
    InFlight(String),

    #[error("Deletion not confirmed")]
    NotConfirmed,

    #[error("Clone source has no provisioned store: {0}")]
    SourceNotProvisioned(String),

    #[error("Unknown plan: {0}")]
    UnknownPlan(String),

    #[error("Owner principal not found: {0}")]
    OwnerNotFound(String),

    #[error("Provisioning failed for '{slug}': {message}")]
    Provisioning { slug: String, message: String },

    #[error("Deletion failed for '{slug}': {message}; registry row remains for retry")]
    Deletion { slug: String, message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Principal(#[from] PrincipalError),
}

/// Per-store-id serialization of lifecycle operations. Two distinct stores
/// may be provisioned concurrently; the same id never twice at once.
static IN_FLIGHT: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

struct InFlightGuard {
    ids: Vec<String>,
}

impl InFlightGuard {
    fn acquire(ids: &[&str]) -> Result<Self, LifecycleError> {
        let mut set = IN_FLIGHT.lock().expect("in-flight lock poisoned");
        for id in ids {
            if set.contains(*id) {
                return Err(LifecycleError::InFlight(id.to_string()));
            }
        }
        for id in ids {
            set.insert(id.to_string());
        }
        Ok(Self {
            ids: ids.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = IN_FLIGHT.lock() {
            for id in &self.ids {
                set.remove(id);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Fresh store provisioned.
    Created,
    /// Earlier attempt left an unprovisioned row; provisioning was completed.
    Resumed,
    /// Tenant was already fully provisioned; nothing mutated.
    NoOp,
}

pub struct CreateTenant {
    pub name: String,
    pub contact_email: String,
    pub slug: Option<String>,
    pub owner_email: Option<String>,
    pub plan: Option<String>,
    pub custom_domain: Option<String>,
}

pub struct CloneTenant {
    pub source_slug: String,
    pub name: String,
    pub slug: Option<String>,
    pub plan: Option<String>,
}

/// Shared-identity surface consumed during create: the owner principal is
/// looked up before any store mutation, and the grant itself never fails the
/// create.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, PrincipalError>;
    async fn grant_owner(
        &self,
        principal_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<(), MembershipError>;
}

/// Default implementation over the shared store.
pub struct SharedPrincipalDirectory;

#[async_trait]
impl PrincipalDirectory for SharedPrincipalDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, PrincipalError> {
        PrincipalService::new().await?.find_by_email(email).await
    }

    async fn grant_owner(
        &self,
        principal_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<(), MembershipError> {
        let memberships = MembershipService::new().await?;
        let has_default = !memberships.memberships_of(principal_id).await?.is_empty();
        match memberships
            .grant(principal_id, tenant_id, Role::Owner, !has_default)
            .await
        {
            Ok(_) => Ok(()),
            // A resumed create may have granted ownership already
            Err(MembershipError::AlreadyMember(_, _)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Creates, deletes and clones tenant backing stores. The only component
/// that mutates the routable store set; every operation logs set membership
/// before and after for audit.
pub struct TenantLifecycle {
    registry: Arc<dyn TenantCatalog>,
    stores: Arc<dyn StoreAdmin>,
    principals: Arc<dyn PrincipalDirectory>,
    schema: Arc<dyn SchemaRunner>,
}

impl TenantLifecycle {
    pub async fn new() -> Result<Self, LifecycleError> {
        Ok(Self::with_parts(
            Arc::new(TenantRegistry::new().await?),
            Arc::new(PgStoreAdmin),
            Arc::new(SharedPrincipalDirectory),
            Arc::new(SqlSchemaRunner),
        ))
    }

    pub fn with_parts(
        registry: Arc<dyn TenantCatalog>,
        stores: Arc<dyn StoreAdmin>,
        principals: Arc<dyn PrincipalDirectory>,
        schema: Arc<dyn SchemaRunner>,
    ) -> Self {
        Self {
            registry,
            stores,
            principals,
            schema,
        }
    }

    /// Deterministic backing store name for a slug. The hash keeps store
    /// names valid identifiers whatever characters future slug rules allow.
    pub fn derive_store_id(slug: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(slug.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        format!("tenant_{}", &hash[..16])
    }

    fn validate_plan(plan: &str) -> Result<(), LifecycleError> {
        if KNOWN_PLANS.contains(&plan) {
            Ok(())
        } else {
            Err(LifecycleError::UnknownPlan(plan.to_string()))
        }
    }

    async fn log_routable_set(&self, phase: &str, op: &str, slug: &str) {
        let stores = self.stores.registered().await;
        info!(op, slug, phase, routable_stores = ?stores, "Routable store set");
    }

    /// Create a tenant and its isolated store as one logical transaction: a
    /// registry row is only marked provisioned once the store exists and
    /// carries the tenant-domain schema.
    ///
    /// Idempotency: re-running after full success for the same tenant is a
    /// no-op; re-running after a partial failure completes provisioning; a
    /// different tenant asking for a taken slug gets `Duplicate`.
    pub async fn create(
        &self,
        req: CreateTenant,
    ) -> Result<(Tenant, CreateOutcome), LifecycleError> {
        let slug = match &req.slug {
            Some(s) => s.clone(),
            None => TenantRegistry::slugify(&req.name),
        };
        TenantRegistry::validate_slug(&slug)?;

        let plan = req.plan.clone().unwrap_or_else(|| "free".to_string());
        Self::validate_plan(&plan)?;

        // Owner lookup happens before any mutation: an unknown owner fails
        // the create while nothing is half-applied yet.
        let owner = match &req.owner_email {
            Some(email) => Some(
                self.principals
                    .find_by_email(email)
                    .await?
                    .ok_or_else(|| LifecycleError::OwnerNotFound(email.clone()))?,
            ),
            None => None,
        };

        let store_id = Self::derive_store_id(&slug);
        let _guard = InFlightGuard::acquire(&[store_id.as_str()])?;

        self.log_routable_set("before", "create", &slug).await;

        let tenant = match self.registry.find_by_slug(&slug).await? {
            Some(existing) if existing.is_provisioned => {
                if existing.name == req.name {
                    info!(slug, "create-tenant: already provisioned, no-op");
                    return Ok((existing, CreateOutcome::NoOp));
                }
                return Err(LifecycleError::Duplicate(slug));
            }
            Some(partial) => {
                info!(slug, "create-tenant: resuming interrupted provisioning");
                self.provision(&partial).await?;
                self.registry.mark_provisioned(partial.id).await?;
                self.finish_create(owner.as_ref(), &partial).await;
                self.log_routable_set("after", "create", &slug).await;
                return Ok((self.reload(&slug).await?, CreateOutcome::Resumed));
            }
            None => {
                let row = self
                    .registry
                    .insert(NewTenant {
                        name: req.name.clone(),
                        slug: slug.clone(),
                        custom_domain: req.custom_domain.clone(),
                        backing_store_id: store_id.clone(),
                        plan,
                        contact_email: req.contact_email.clone(),
                    })
                    .await
                    .map_err(|e| match e {
                        RegistryError::DuplicateTenant(s) => LifecycleError::Duplicate(s),
                        other => LifecycleError::Registry(other),
                    })?;
                self.provision(&row).await?;
                self.registry.mark_provisioned(row.id).await?;
                self.finish_create(owner.as_ref(), &row).await;
                row
            }
        };

        self.log_routable_set("after", "create", &slug).await;
        Ok((self.reload(&tenant.slug).await?, CreateOutcome::Created))
    }

    /// Create the store if absent, apply tenant-domain schema, register the
    /// pool. Any failure after store creation rolls the store back so no
    /// half-usable store stays routable; the registry row stays
    /// unprovisioned, making the whole operation retryable.
    async fn provision(&self, tenant: &Tenant) -> Result<(), LifecycleError> {
        let store_id = &tenant.backing_store_id;

        if !self.stores.store_exists(store_id).await? {
            self.stores.create_store(store_id).await?;
        } else {
            info!(store_id, "Store already exists; completing provisioning");
        }

        let result: Result<(), LifecycleError> = async {
            let pool = self.stores.register_pool(store_id).await?;
            self.schema
                .apply(
                    &pool,
                    EntityDomain::Tenant,
                    &StoreTarget::Tenant(store_id.clone()),
                )
                .await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!(store_id, error = %e, "Provisioning failed; rolling back store");
            if let Err(rollback_err) = self.stores.drop_store(store_id).await {
                warn!(store_id, error = %rollback_err, "Rollback drop failed; store may be orphaned");
            }
            return Err(LifecycleError::Provisioning {
                slug: tenant.slug.clone(),
                message: e.to_string(),
            });
        }

        Ok(())
    }

    /// Post-provisioning extras: the owner grant. Never fails the create;
    /// the tenant is already usable when this runs.
    async fn finish_create(&self, owner: Option<&Principal>, tenant: &Tenant) {
        if let Some(owner) = owner {
            if let Err(e) = self.principals.grant_owner(owner.id, tenant.id).await {
                warn!(
                    slug = %tenant.slug,
                    owner = %owner.email,
                    error = %e,
                    "Owner grant failed; grant the membership manually"
                );
            }
        }
    }

    async fn reload(&self, slug: &str) -> Result<Tenant, LifecycleError> {
        self.registry
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| LifecycleError::Registry(RegistryError::NotFound(slug.to_string())))
    }

    /// Irreversibly tear down a tenant's store, then remove its registry
    /// row. Requires explicit confirmation; deactivating a tenant never
    /// triggers this.
    pub async fn delete(&self, slug: &str, confirmed: bool) -> Result<(), LifecycleError> {
        if !confirmed {
            return Err(LifecycleError::NotConfirmed);
        }

        let tenant = self
            .registry
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| LifecycleError::Registry(RegistryError::NotFound(slug.to_string())))?;

        let store_id = tenant.backing_store_id.clone();
        let _guard = InFlightGuard::acquire(&[store_id.as_str()])?;

        self.log_routable_set("before", "delete", slug).await;

        // Drop failure leaves the registry row in place so the operator can
        // retry; never silently orphan a store.
        if let Err(e) = self.stores.drop_store(&store_id).await {
            return Err(LifecycleError::Deletion {
                slug: slug.to_string(),
                message: e.to_string(),
            });
        }

        self.registry.delete_row(tenant.id).await?;

        self.log_routable_set("after", "delete", slug).await;
        info!(slug, store_id, "Deleted tenant and backing store");
        Ok(())
    }

    /// Copy an existing tenant's store into a brand-new tenant (staging and
    /// demo use). The clone gets its own backing_store_id and registry row;
    /// it never shares a store with its source.
    pub async fn clone_from(
        &self,
        req: CloneTenant,
    ) -> Result<(Tenant, CreateOutcome), LifecycleError> {
        let source = self
            .registry
            .find_by_slug(&req.source_slug)
            .await?
            .ok_or_else(|| {
                LifecycleError::Registry(RegistryError::NotFound(req.source_slug.clone()))
            })?;
        if !source.is_provisioned {
            return Err(LifecycleError::SourceNotProvisioned(source.slug));
        }

        let slug = match &req.slug {
            Some(s) => s.clone(),
            None => TenantRegistry::slugify(&req.name),
        };
        TenantRegistry::validate_slug(&slug)?;

        let plan = req
            .plan
            .clone()
            .unwrap_or_else(|| source.plan.clone());
        Self::validate_plan(&plan)?;

        let store_id = Self::derive_store_id(&slug);
        if store_id == source.backing_store_id {
            return Err(LifecycleError::Duplicate(slug));
        }

        // Serialize against operations on either store: the source must not
        // be dropped mid-copy.
        let _guard =
            InFlightGuard::acquire(&[store_id.as_str(), source.backing_store_id.as_str()])?;

        self.log_routable_set("before", "clone", &slug).await;

        let row = match self.registry.find_by_slug(&slug).await? {
            Some(existing) if existing.is_provisioned => {
                return Err(LifecycleError::Duplicate(slug));
            }
            Some(partial) => {
                info!(slug, "clone-tenant: resuming interrupted clone");
                partial
            }
            None => {
                self.registry
                    .insert(NewTenant {
                        name: req.name.clone(),
                        slug: slug.clone(),
                        custom_domain: None,
                        backing_store_id: store_id.clone(),
                        plan,
                        contact_email: source.contact_email.clone(),
                    })
                    .await
                    .map_err(|e| match e {
                        RegistryError::DuplicateTenant(s) => LifecycleError::Duplicate(s),
                        other => LifecycleError::Registry(other),
                    })?
            }
        };

        if !self.stores.store_exists(&store_id).await? {
            if let Err(e) = self.stores.clone_store(&source.backing_store_id, &store_id).await {
                return Err(LifecycleError::Provisioning {
                    slug: slug.clone(),
                    message: e.to_string(),
                });
            }
        }

        // Register the clone's pool; failure here rolls the new store back
        if let Err(e) = self.stores.register_pool(&store_id).await {
            warn!(store_id, error = %e, "Clone pool registration failed; rolling back store");
            if let Err(rollback_err) = self.stores.drop_store(&store_id).await {
                warn!(store_id, error = %rollback_err, "Rollback drop failed; store may be orphaned");
            }
            return Err(LifecycleError::Provisioning {
                slug: slug.clone(),
                message: e.to_string(),
            });
        }

        self.registry.mark_provisioned(row.id).await?;

        self.log_routable_set("after", "clone", &slug).await;
        Ok((self.reload(&slug).await?, CreateOutcome::Created))
    }
}
