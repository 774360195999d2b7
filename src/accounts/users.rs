// src/accounts/users.rs
use super::{Role, User};
use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

const USER_COLUMNS: &str =
    "id, tenant_id, email, display_name, role, is_active, created_at, last_seen_at";

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    pub async fn create(
        &self,
        tenant_id: i64,
        email: &str,
        display_name: Option<&str>,
        role: Role,
    ) -> Result<User> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (tenant_id, email, display_name, role, is_active, created_at, last_seen_at)
            VALUES (?, ?, ?, ?, TRUE, ?, ?)
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .bind(display_name)
        .bind(role)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            tenant_id,
            email: email.to_string(),
            display_name: display_name.map(str::to_string),
            role,
            is_active: true,
            created_at: now,
            last_seen_at: now,
        })
    }

    /// Record a login: refresh last_seen_at and take the identity's display name when one is supplied
    pub async fn touch_login(&self, user: &mut User, display_name: Option<&str>) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE users
            SET last_seen_at = ?, display_name = COALESCE(?, display_name)
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(display_name)
        .bind(user.id)
        .execute(self.pool)
        .await?;

        user.last_seen_at = now;
        if let Some(name) = display_name {
            user.display_name = Some(name.to_string());
        }
        Ok(())
    }

    pub async fn count_in_tenant(&self, tenant_id: i64) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Change an owner's role or active flag only while another active owner remains.
    /// The owner count and the write happen in one statement, so concurrent demotions
    /// cannot both pass the check. Returns false when the user is the last active owner.
    pub async fn update_owner_keeping_one(
        &self,
        user_id: i64,
        tenant_id: i64,
        role: Role,
        is_active: bool,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET role = ?, is_active = ?
            WHERE id = ? AND tenant_id = ? AND EXISTS (
                SELECT 1 FROM users AS other
                WHERE other.tenant_id = ? AND other.role = ? AND other.is_active = TRUE
                  AND other.id != ?
            )
            "#,
        )
        .bind(role)
        .bind(is_active)
        .bind(user_id)
        .bind(tenant_id)
        .bind(tenant_id)
        .bind(Role::Owner)
        .bind(user_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_by_tenant(&self, tenant_id: i64) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(tenant_id)
        .fetch_all(self.pool)
        .await?;
        Ok(users)
    }

    pub async fn list_ids_by_tenant(&self, tenant_id: i64) -> Result<Vec<(i64, chrono::DateTime<Utc>)>> {
        let rows = sqlx::query_as::<_, (i64, chrono::DateTime<Utc>)>(
            "SELECT id, created_at FROM users WHERE tenant_id = ? AND is_active = TRUE ORDER BY id",
        )
        .bind(tenant_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_role(&self, user_id: i64, role: Role) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_active(&self, user_id: i64, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
