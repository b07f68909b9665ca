use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth;
use crate::database::manager::{StoreError, StoreManager};
use crate::database::models::Principal;

#[derive(Debug, Error)]
pub enum PrincipalError {
    #[error("Principal already exists: {0}")]
    DuplicateEmail(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Identity CRUD against the shared store. Principals are application-wide;
/// tenant association happens only through memberships.
pub struct PrincipalService {
    pool: PgPool,
}

impl PrincipalService {
    pub async fn new() -> Result<Self, PrincipalError> {
        let pool = StoreManager::shared_pool().await?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, PrincipalError> {
        let row = sqlx::query_as::<_, Principal>("SELECT * FROM principals WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, PrincipalError> {
        let row = sqlx::query_as::<_, Principal>("SELECT * FROM principals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn create(
        &self,
        email: &str,
        display_name: &str,
        password: &str,
    ) -> Result<Principal, PrincipalError> {
        // Email doubles as the per-principal salt
        let password_hash = auth::hash_password(password, email);

        let row = sqlx::query_as::<_, Principal>(
            r#"
            INSERT INTO principals (email, display_name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(display_name)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PrincipalError::DuplicateEmail(email.to_string())
            }
            _ => PrincipalError::Sqlx(e),
        })?;
        Ok(row)
    }

    pub async fn verify_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Principal>, PrincipalError> {
        let principal = match self.find_by_email(email).await? {
            Some(p) => p,
            None => return Ok(None),
        };
        if auth::verify_password(password, email, &principal.password_hash) {
            Ok(Some(principal))
        } else {
            Ok(None)
        }
    }
}
