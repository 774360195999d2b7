// src/accounts/tenants.rs
use super::Tenant;
use crate::error::{ServiceError, ServiceResult};
use crate::utils::{email_domain, email_local_part};
use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};

const TENANT_COLUMNS: &str =
    "id, email, domain, tenant_name, created_at, updated_at, is_active";

pub struct TenantRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TenantRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Find tenant that authorizes the given email (exact match wins over domain match)
    pub async fn find_by_email_or_domain(&self, email: &str) -> Result<Option<Tenant>> {
        self.find_matching(email, true).await
    }

    /// Deactivated tenant that would otherwise authorize the given email
    pub async fn find_deactivated_match(&self, email: &str) -> Result<Option<Tenant>> {
        self.find_matching(email, false).await
    }

    async fn find_matching(&self, email: &str, is_active: bool) -> Result<Option<Tenant>> {
        let domain = email_domain(email).unwrap_or("");

        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            r#"
            SELECT {TENANT_COLUMNS}
            FROM tenants
            WHERE is_active = ? AND (
                email = ? COLLATE NOCASE OR domain = ? COLLATE NOCASE
            )
            ORDER BY email NULLS LAST
            LIMIT 1
            "#
        ))
        .bind(is_active)
        .bind(email)
        .bind(domain)
        .fetch_optional(self.pool)
        .await?;

        Ok(tenant)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Tenant>> {
        let tenant =
            sqlx::query_as::<_, Tenant>(&format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(tenant)
    }

    /// Create tenant with specific email
    pub async fn create_email_tenant(&self, email: &str, tenant_name: &str) -> Result<Tenant> {
        let tenant = self.insert(Some(email), None, tenant_name).await?;
        info!("Created email tenant: {} for email: {}", tenant_name, email);
        Ok(tenant)
    }

    /// Create tenant with domain authorization
    pub async fn create_domain_tenant(&self, domain: &str, tenant_name: &str) -> Result<Tenant> {
        let tenant = self.insert(None, Some(domain), tenant_name).await?;
        info!("Created domain tenant: {} for domain: {}", tenant_name, domain);
        Ok(tenant)
    }

    async fn insert(
        &self,
        email: Option<&str>,
        domain: Option<&str>,
        tenant_name: &str,
    ) -> Result<Tenant> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO tenants (email, domain, tenant_name, created_at, updated_at, is_active)
            VALUES (?, ?, ?, ?, ?, TRUE)
            "#,
        )
        .bind(email)
        .bind(domain)
        .bind(tenant_name)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(Tenant {
            id: result.last_insert_rowid(),
            email: email.map(str::to_string),
            domain: domain.map(str::to_string),
            tenant_name: tenant_name.to_string(),
            created_at: now,
            updated_at: now,
            is_active: true,
        })
    }

    /// List all active tenants
    pub async fn list_active(&self) -> Result<Vec<Tenant>> {
        let tenants = sqlx::query_as::<_, Tenant>(&format!(
            r#"
            SELECT {TENANT_COLUMNS}
            FROM tenants
            WHERE is_active = TRUE
            ORDER BY tenant_name ASC, email ASC, domain ASC
            "#
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(tenants)
    }

    pub async fn deactivate_by_email(&self, email: &str) -> Result<bool> {
        let updated = self.deactivate_where("email", email).await?;
        if updated {
            info!("Deactivated tenant for email: {}", email);
        }
        Ok(updated)
    }

    pub async fn deactivate_by_domain(&self, domain: &str) -> Result<bool> {
        let updated = self.deactivate_where("domain", domain).await?;
        if updated {
            info!("Deactivated tenant for domain: {}", domain);
        }
        Ok(updated)
    }

    async fn deactivate_where(&self, column: &'static str, value: &str) -> Result<bool> {
        let result = sqlx::query(&format!(
            "UPDATE tenants SET is_active = FALSE, updated_at = ? WHERE {column} = ? COLLATE NOCASE AND is_active = TRUE"
        ))
        .bind(Utc::now())
        .bind(value)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct TenantService<'a> {
    repo: TenantRepository<'a>,
}

impl<'a> TenantService<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self {
            repo: TenantRepository::new(pool),
        }
    }

    /// Validate user access and get tenant info (email or domain match)
    pub async fn validate_user_access(&self, email: &str) -> Result<Option<Tenant>> {
        match self.repo.find_by_email_or_domain(email).await? {
            Some(tenant) if tenant.authorizes_email(email) => {
                info!(
                    "User {} validated for tenant: {} ({})",
                    email,
                    tenant.tenant_name,
                    tenant.authorization_kind()
                );
                Ok(Some(tenant))
            }
            Some(tenant) => {
                info!(
                    "User {} failed authorization check for tenant: {}",
                    email, tenant.tenant_name
                );
                Ok(None)
            }
            None => {
                info!("No matching tenant or domain for email: {}", email);
                Ok(None)
            }
        }
    }

    /// Auto-create an email tenant named after the local part of the address
    pub async fn auto_create_tenant(&self, email: &str) -> Result<Tenant> {
        let tenant_name = email_local_part(email).to_string();
        info!("Auto-creating tenant '{}' for new user: {}", tenant_name, email);
        self.repo.create_email_tenant(email, &tenant_name).await
    }

    /// Tenant for a first-time user; a deactivated match blocks sign-up instead of spawning a new tenant
    pub async fn get_or_create_tenant(&self, email: &str) -> ServiceResult<Tenant> {
        if let Some(tenant) = self.validate_user_access(email).await? {
            return Ok(tenant);
        }
        if let Some(tenant) = self.repo.find_deactivated_match(email).await? {
            warn!("Rejected sign-up of {} into deactivated tenant {}", email, tenant.tenant_name);
            return Err(ServiceError::forbidden("Tenant is not active"));
        }
        Ok(self.auto_create_tenant(email).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Database;

    #[tokio::test]
    async fn test_email_match_beats_domain_match() {
        let db = Database::in_memory().await.unwrap();
        let repo = TenantRepository::new(db.pool());

        repo.create_domain_tenant("acme.io", "acme").await.unwrap();
        repo.create_email_tenant("ceo@acme.io", "ceo-office").await.unwrap();

        let found = repo.find_by_email_or_domain("ceo@acme.io").await.unwrap().unwrap();
        assert_eq!(found.tenant_name, "ceo-office");

        let found = repo.find_by_email_or_domain("dev@acme.io").await.unwrap().unwrap();
        assert_eq!(found.tenant_name, "acme");
    }

    #[tokio::test]
    async fn test_duplicate_email_tenant_rejected() {
        let db = Database::in_memory().await.unwrap();
        let repo = TenantRepository::new(db.pool());

        repo.create_email_tenant("a@b.io", "a").await.unwrap();
        let err = repo.create_email_tenant("a@b.io", "a2").await.unwrap_err();
        assert!(err.to_string().contains("UNIQUE constraint failed"));
    }

    #[tokio::test]
    async fn test_deactivated_tenant_is_not_matched() {
        let db = Database::in_memory().await.unwrap();
        let repo = TenantRepository::new(db.pool());

        repo.create_domain_tenant("acme.io", "acme").await.unwrap();
        assert!(repo.deactivate_by_domain("acme.io").await.unwrap());
        assert!(!repo.deactivate_by_domain("acme.io").await.unwrap());
        assert!(repo.find_by_email_or_domain("x@acme.io").await.unwrap().is_none());
        assert!(repo.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_ignores_email_case() {
        let db = Database::in_memory().await.unwrap();
        let repo = TenantRepository::new(db.pool());

        repo.create_domain_tenant("acme.io", "acme").await.unwrap();
        repo.create_email_tenant("ceo@acme.io", "ceo-office").await.unwrap();

        let found = repo.find_by_email_or_domain("Dev@ACME.io").await.unwrap().unwrap();
        assert_eq!(found.tenant_name, "acme");
        let found = repo.find_by_email_or_domain("CEO@Acme.IO").await.unwrap().unwrap();
        assert_eq!(found.tenant_name, "ceo-office");

        let err = repo.create_domain_tenant("ACME.io", "acme-2").await.unwrap_err();
        assert!(err.to_string().contains("UNIQUE constraint failed"));
        assert!(repo.deactivate_by_domain("Acme.IO").await.unwrap());
    }

    #[tokio::test]
    async fn test_deactivated_tenant_blocks_sign_up() {
        let db = Database::in_memory().await.unwrap();
        let repo = TenantRepository::new(db.pool());
        let service = TenantService::new(db.pool());

        repo.create_email_tenant("jane@solo.dev", "jane").await.unwrap();
        repo.create_domain_tenant("acme.io", "acme").await.unwrap();
        repo.deactivate_by_email("jane@solo.dev").await.unwrap();
        repo.deactivate_by_domain("acme.io").await.unwrap();

        let err = service.get_or_create_tenant("Jane@solo.dev").await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        let err = service.get_or_create_tenant("dev@acme.io").await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert!(repo.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_or_create_tenant() {
        let db = Database::in_memory().await.unwrap();
        let service = TenantService::new(db.pool());

        let created = service.get_or_create_tenant("jane@solo.dev").await.unwrap();
        assert_eq!(created.tenant_name, "jane");

        let again = service.get_or_create_tenant("jane@solo.dev").await.unwrap();
        assert_eq!(again.id, created.id);
    }
}
