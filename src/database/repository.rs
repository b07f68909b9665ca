use sqlx::{postgres::PgRow, FromRow, PgPool};
use thiserror::Error;
use uuid::Uuid;

use crate::database::router::{RouterPoolError, StoreRouter};

/// Entity-keyed repository. Every call asks the router for the right store,
/// so tenant-scoped entities are unreachable without a resolved context and
/// shared entities always land on the shared store.
pub struct Repository<T> {
    entity: &'static str,
    _phantom: std::marker::PhantomData<T>,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("invalid entity name: {0}")]
    InvalidEntity(&'static str),

    #[error(transparent)]
    Router(#[from] RouterPoolError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl From<RepositoryError> for crate::error::ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Router(e) => e.into(),
            RepositoryError::Sqlx(e) => e.into(),
            RepositoryError::InvalidEntity(name) => {
                tracing::error!("Repository built for invalid entity: {}", name);
                crate::error::ApiError::internal_server_error(
                    "An error occurred while processing your request",
                )
            }
        }
    }
}

impl<T> Repository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Route to the store owning this entity.
    pub async fn pool(&self) -> Result<PgPool, RepositoryError> {
        if !Self::is_valid_entity_name(self.entity) {
            return Err(RepositoryError::InvalidEntity(self.entity));
        }
        Ok(StoreRouter::pool_for(self.entity).await?)
    }

    pub async fn select_all(&self) -> Result<Vec<T>, RepositoryError> {
        let pool = self.pool().await?;
        let rows = sqlx::query_as::<_, T>(&format!("SELECT * FROM {}", self.entity))
            .fetch_all(&pool)
            .await?;
        Ok(rows)
    }

    pub async fn select_by_id(&self, id: Uuid) -> Result<Option<T>, RepositoryError> {
        let pool = self.pool().await?;
        let row = sqlx::query_as::<_, T>(&format!("SELECT * FROM {} WHERE id = $1", self.entity))
            .bind(id)
            .fetch_optional(&pool)
            .await?;
        Ok(row)
    }

    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let pool = self.pool().await?;
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", self.entity))
            .fetch_one(&pool)
            .await?;
        Ok(count.0)
    }

    /// Entity names are compile-time constants, but the check keeps a typo
    /// from ever reaching SQL interpolation.
    fn is_valid_entity_name(name: &str) -> bool {
        !name.is_empty()
            && name.chars().all(|c| c.is_ascii_lowercase() || c == '_')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_entity_names() {
        assert!(Repository::<crate::database::models::Student>::is_valid_entity_name("students"));
        assert!(!Repository::<crate::database::models::Student>::is_valid_entity_name(
            "students; DROP TABLE"
        ));
        assert!(!Repository::<crate::database::models::Student>::is_valid_entity_name(""));
    }
}
