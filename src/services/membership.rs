use sqlx::PgPool;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::database::manager::{StoreError, StoreManager};
use crate::database::models::{Membership, Role};

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("Membership already exists for principal {0} in tenant {1}")]
    AlreadyMember(Uuid, Uuid),

    #[error("stored role '{0}' is not a known role")]
    UnknownRole(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Membership lookups and grants against the shared store. The single
/// `role_of` lookup is the only authorization primitive: handlers branch on
/// the returned Role, never on ad-hoc capability checks.
pub struct MembershipService {
    pool: PgPool,
}

impl MembershipService {
    pub async fn new() -> Result<Self, MembershipError> {
        let pool = StoreManager::shared_pool().await?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The access guard's one question: does this principal hold a role in
    /// this tenant, and which?
    pub async fn role_of(
        &self,
        principal_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<Role>, MembershipError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT role FROM memberships WHERE principal_id = $1 AND tenant_id = $2",
        )
        .bind(principal_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some((role,)) => Role::from_str(&role)
                .map(Some)
                .map_err(|_| MembershipError::UnknownRole(role)),
        }
    }

    pub async fn memberships_of(
        &self,
        principal_id: Uuid,
    ) -> Result<Vec<Membership>, MembershipError> {
        let rows = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE principal_id = $1 ORDER BY joined_at",
        )
        .bind(principal_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Grant a role. `is_default` is only set when the principal has no
    /// default membership yet; the partial unique index enforces at most one.
    pub async fn grant(
        &self,
        principal_id: Uuid,
        tenant_id: Uuid,
        role: Role,
        is_default: bool,
    ) -> Result<Membership, MembershipError> {
        let row = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (principal_id, tenant_id, role, is_default)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(principal_id)
        .bind(tenant_id)
        .bind(role.as_str())
        .bind(is_default)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                MembershipError::AlreadyMember(principal_id, tenant_id)
            }
            _ => MembershipError::Sqlx(e),
        })?;
        Ok(row)
    }

    /// Revoke a membership. Idempotent.
    pub async fn revoke(&self, principal_id: Uuid, tenant_id: Uuid) -> Result<(), MembershipError> {
        sqlx::query("DELETE FROM memberships WHERE principal_id = $1 AND tenant_id = $2")
            .bind(principal_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
