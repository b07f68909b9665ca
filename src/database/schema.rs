use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use crate::database::context::StoreTarget;
use crate::database::router::{EntityDomain, RoutingError, StoreRouter};

/// Shared-domain DDL: registry, identity, membership. Applied only to the
/// shared store. Idempotent so bootstrap can re-run safely.
const SHARED_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tenants (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        name TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        custom_domain TEXT UNIQUE,
        backing_store_id TEXT NOT NULL UNIQUE,
        plan TEXT NOT NULL DEFAULT 'free',
        max_admins INTEGER NOT NULL DEFAULT 5,
        max_members INTEGER NOT NULL DEFAULT 100,
        max_guests INTEGER NOT NULL DEFAULT 25,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        is_verified BOOLEAN NOT NULL DEFAULT FALSE,
        is_provisioned BOOLEAN NOT NULL DEFAULT FALSE,
        contact_email TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS principals (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        email TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        is_root BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS memberships (
        principal_id UUID NOT NULL REFERENCES principals(id) ON DELETE CASCADE,
        tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        is_default BOOLEAN NOT NULL DEFAULT FALSE,
        joined_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (principal_id, tenant_id)
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS memberships_one_default_per_principal
        ON memberships (principal_id) WHERE is_default
    "#,
];

/// Tenant-domain DDL: applied only to tenant stores, never to the shared
/// store. No storage-level references to shared entities.
const TENANT_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        full_name TEXT NOT NULL,
        email TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS enrollments (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        student_id UUID NOT NULL REFERENCES students(id) ON DELETE CASCADE,
        course_code TEXT NOT NULL,
        enrolled_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

/// Schema application seam. The lifecycle manager consumes this rather than
/// owning DDL directly, so stores can be provisioned against a different
/// migration backend in tests or future deployments.
#[async_trait]
pub trait SchemaRunner: Send + Sync {
    async fn apply(
        &self,
        pool: &PgPool,
        domain: EntityDomain,
        target: &StoreTarget,
    ) -> Result<(), SchemaError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error("schema statement failed: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Default runner executing the embedded domain DDL.
pub struct SqlSchemaRunner;

#[async_trait]
impl SchemaRunner for SqlSchemaRunner {
    async fn apply(
        &self,
        pool: &PgPool,
        domain: EntityDomain,
        target: &StoreTarget,
    ) -> Result<(), SchemaError> {
        StoreRouter::check_schema_target(domain, target)?;

        let statements = match domain {
            EntityDomain::Shared => SHARED_SCHEMA,
            EntityDomain::Tenant => TENANT_SCHEMA,
        };

        for statement in statements {
            sqlx::query(statement).execute(pool).await?;
        }

        info!(?domain, ?target, "Applied domain schema");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_schema_has_no_shared_references() {
        for stmt in TENANT_SCHEMA {
            assert!(!stmt.contains("tenants"), "tenant DDL must not reference registry");
            assert!(!stmt.contains("principals"), "tenant DDL must not reference identity");
            assert!(!stmt.contains("memberships"), "tenant DDL must not reference memberships");
        }
    }

    #[test]
    fn all_ddl_is_idempotent() {
        for stmt in SHARED_SCHEMA.iter().chain(TENANT_SCHEMA) {
            assert!(stmt.contains("IF NOT EXISTS"));
        }
    }
}
