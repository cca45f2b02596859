//! [`RoleRepository`] for SQLite.

use super::SqliteStore;
use crate::error::StoreError;
use crate::repository::RoleRepository;
use async_trait::async_trait;
use sesame_core::{Role, RoleSet};
use uuid::Uuid;

#[async_trait]
impl RoleRepository for SqliteStore {
    async fn role_names(&self, user_id: Uuid) -> Result<RoleSet, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT r.name FROM user_roles ur JOIN roles r ON r.id = ur.role_id WHERE ur.user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let Some(name) = RoleSet::normalize(name) else {
            return Ok(None);
        };
        let row: Option<(i64, String)> = sqlx::query_as("SELECT id, name FROM roles WHERE name = ?")
            .bind(&name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(id, name)| Role { id, name }))
    }

    async fn grant(&self, user_id: Uuid, role_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES (?, ?) ON CONFLICT (user_id, role_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke(&self, user_id: Uuid, role_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role_id = ?")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
