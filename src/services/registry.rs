use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::database::manager::{StoreError, StoreManager};
use crate::database::models::Tenant;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Tenant already exists: {0}")]
    DuplicateTenant(String),

    #[error("Invalid slug: {0}")]
    InvalidSlug(String),

    #[error("Tenant not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Durable catalog of organizations and their backing stores. All queries
/// run against the shared store; this is the single source of truth the
/// resolver reads.
pub struct TenantRegistry {
    pool: PgPool,
}

/// Insert payload; the registry assigns timestamps and defaults.
pub struct NewTenant {
    pub name: String,
    pub slug: String,
    pub custom_domain: Option<String>,
    pub backing_store_id: String,
    pub plan: String,
    pub contact_email: String,
}

impl TenantRegistry {
    pub async fn new() -> Result<Self, RegistryError> {
        let pool = StoreManager::shared_pool().await?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Slugs are URL path segments and subdomain labels at once: lowercase
    /// alphanumerics and hyphens, 2-63 chars, no leading/trailing hyphen,
    /// and never a reserved subdomain.
    pub fn validate_slug(slug: &str) -> Result<(), RegistryError> {
        if slug.len() < 2 || slug.len() > 63 {
            return Err(RegistryError::InvalidSlug(
                "slug must be between 2 and 63 characters".to_string(),
            ));
        }
        if !slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(RegistryError::InvalidSlug(
                "slug may only contain lowercase letters, digits and hyphens".to_string(),
            ));
        }
        if slug.starts_with('-') || slug.ends_with('-') {
            return Err(RegistryError::InvalidSlug(
                "slug may not start or end with a hyphen".to_string(),
            ));
        }
        if config::config()
            .tenancy
            .reserved_subdomains
            .iter()
            .any(|r| r == slug)
        {
            return Err(RegistryError::InvalidSlug(format!("slug '{}' is reserved", slug)));
        }
        Ok(())
    }

    /// Derive a slug from a display name.
    pub fn slugify(name: &str) -> String {
        let mut slug = String::with_capacity(name.len());
        let mut last_hyphen = true; // suppress leading hyphen
        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
                last_hyphen = false;
            } else if !last_hyphen {
                slug.push('-');
                last_hyphen = true;
            }
        }
        while slug.ends_with('-') {
            slug.pop();
        }
        slug.truncate(63);
        slug
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, RegistryError> {
        let row = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Resolution-facing lookup: only active tenants resolve.
    pub async fn find_active_by_slug(&self, slug: &str) -> Result<Option<Tenant>, RegistryError> {
        let row = sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants WHERE slug = $1 AND is_active = TRUE AND is_provisioned = TRUE",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_active_by_custom_domain(
        &self,
        domain: &str,
    ) -> Result<Option<Tenant>, RegistryError> {
        let row = sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants WHERE custom_domain = $1 AND is_active = TRUE AND is_provisioned = TRUE",
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Tenant>, RegistryError> {
        let row = sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants WHERE id = $1 AND is_active = TRUE AND is_provisioned = TRUE",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list(&self) -> Result<Vec<Tenant>, RegistryError> {
        let rows = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Insert an unprovisioned registry row. Unique violations on slug,
    /// custom_domain or backing_store_id surface as DuplicateTenant before
    /// any store mutation happens.
    pub async fn insert(&self, tenant: NewTenant) -> Result<Tenant, RegistryError> {
        Self::validate_slug(&tenant.slug)?;

        let row = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (name, slug, custom_domain, backing_store_id, plan, contact_email)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&tenant.name)
        .bind(&tenant.slug)
        .bind(&tenant.custom_domain)
        .bind(&tenant.backing_store_id)
        .bind(&tenant.plan)
        .bind(&tenant.contact_email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RegistryError::DuplicateTenant(tenant.slug.clone())
            }
            _ => RegistryError::Sqlx(e),
        })?;

        Ok(row)
    }

    pub async fn mark_provisioned(&self, id: Uuid) -> Result<(), RegistryError> {
        sqlx::query(
            "UPDATE tenants SET is_provisioned = TRUE, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Deactivation only; never touches the backing store.
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<(), RegistryError> {
        sqlx::query("UPDATE tenants SET is_active = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Physical removal of the registry row. Callers must have torn the
    /// backing store down first; the lifecycle manager is the only caller.
    pub async fn delete_row(&self, id: Uuid) -> Result<(), RegistryError> {
        sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Catalog surface the lifecycle manager drives. `TenantRegistry` is the
/// shared-store implementation; tests substitute an in-memory one.
#[async_trait]
pub trait TenantCatalog: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, RegistryError>;
    async fn insert(&self, tenant: NewTenant) -> Result<Tenant, RegistryError>;
    async fn mark_provisioned(&self, id: Uuid) -> Result<(), RegistryError>;
    async fn delete_row(&self, id: Uuid) -> Result<(), RegistryError>;
}

#[async_trait]
impl TenantCatalog for TenantRegistry {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, RegistryError> {
        TenantRegistry::find_by_slug(self, slug).await
    }

    async fn insert(&self, tenant: NewTenant) -> Result<Tenant, RegistryError> {
        TenantRegistry::insert(self, tenant).await
    }

    async fn mark_provisioned(&self, id: Uuid) -> Result<(), RegistryError> {
        TenantRegistry::mark_provisioned(self, id).await
    }

    async fn delete_row(&self, id: Uuid) -> Result<(), RegistryError> {
        TenantRegistry::delete_row(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_validation() {
        assert!(TenantRegistry::validate_slug("acme").is_ok());
        assert!(TenantRegistry::validate_slug("acme-north-42").is_ok());
        assert!(TenantRegistry::validate_slug("a").is_err());
        assert!(TenantRegistry::validate_slug("Acme").is_err());
        assert!(TenantRegistry::validate_slug("-acme").is_err());
        assert!(TenantRegistry::validate_slug("acme-").is_err());
        assert!(TenantRegistry::validate_slug("acme corp").is_err());
        // Reserved subdomains never become slugs
        assert!(TenantRegistry::validate_slug("www").is_err());
        assert!(TenantRegistry::validate_slug("api").is_err());
    }

    #[test]
    fn slugify_produces_valid_slugs() {
        assert_eq!(TenantRegistry::slugify("Acme Corp"), "acme-corp");
        assert_eq!(TenantRegistry::slugify("  North -- Campus 7 "), "north-campus-7");
        assert_eq!(TenantRegistry::slugify("École d'été"), "cole-d-t");
        assert!(TenantRegistry::validate_slug(&TenantRegistry::slugify("Acme Corp")).is_ok());
    }
}
