// src/accounts/mod.rs
//! Multi-tenant account management: tenants, their members and roles

pub mod service;
pub mod tenants;
pub mod users;

pub use service::AccountService;
pub use tenants::{TenantRepository, TenantService};
pub use users::UserRepository;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: i64,
    pub email: Option<String>,
    pub domain: Option<String>,
    pub tenant_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Tenant {
    /// Check if this tenant authorizes the given email
    pub fn authorizes_email(&self, email: &str) -> bool {
        if let Some(tenant_email) = &self.email {
            tenant_email.eq_ignore_ascii_case(email)
        } else if let Some(domain) = &self.domain {
            crate::utils::email_domain(email)
                .map(|email_domain| domain.eq_ignore_ascii_case(email_domain))
                .unwrap_or(false)
        } else {
            false
        }
    }

    pub fn authorization_kind(&self) -> &'static str {
        if self.email.is_some() {
            "email"
        } else {
            "domain"
        }
    }
}

/// Member role, ordered by privilege
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
    Owner,
}

impl Role {
    pub fn can_manage_members(self) -> bool {
        self >= Role::Admin
    }

    /// Posting jobs and moving applications through the pipeline
    pub fn can_manage_jobs(self) -> bool {
        self >= Role::Admin
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => anyhow::bail!("Unknown role: {}. Use member, admin or owner", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub tenant_id: i64,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}
