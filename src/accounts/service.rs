// src/accounts/service.rs
use super::{Role, Tenant, TenantRepository, TenantService, User, UserRepository};
use crate::analytics::{AnalyticsService, EVENT_SIGNUP};
use crate::error::{ServiceError, ServiceResult};
use crate::utils::is_valid_email;
use sqlx::SqlitePool;
use tracing::{info, warn};

pub struct AccountService<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AccountService<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    fn users(&self) -> UserRepository<'a> {
        UserRepository::new(self.pool)
    }

    /// Resolve an authenticated identity to its tenant and user record, creating both on first login
    pub async fn resolve_login(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> ServiceResult<(Tenant, User)> {
        let users = self.users();

        if let Some(mut user) = users.find_by_email(email).await? {
            if !user.is_active {
                warn!("Rejected login for deactivated user {}", email);
                return Err(ServiceError::forbidden("User account is deactivated"));
            }

            let tenant = TenantRepository::new(self.pool)
                .find_by_id(user.tenant_id)
                .await?
                .filter(|tenant| tenant.is_active)
                .ok_or_else(|| ServiceError::forbidden("Tenant is not active"))?;

            users.touch_login(&mut user, display_name).await?;
            return Ok((tenant, user));
        }

        let tenant = TenantService::new(self.pool)
            .get_or_create_tenant(email)
            .await?;

        let role = if users.count_in_tenant(tenant.id).await? == 0 {
            Role::Owner
        } else {
            Role::Member
        };

        let user = users.create(tenant.id, email, display_name, role).await?;
        AnalyticsService::new(self.pool)
            .track(tenant.id, user.id, EVENT_SIGNUP, serde_json::json!({"via": "login"}))
            .await?;

        info!(
            "Registered {} as {:?} of tenant {}",
            email, role, tenant.tenant_name
        );
        Ok((tenant, user))
    }

    pub async fn list_members(&self, actor: &User) -> ServiceResult<Vec<User>> {
        Self::require_manager(actor)?;
        Ok(self.users().list_by_tenant(actor.tenant_id).await?)
    }

    /// Add a member to the actor's tenant
    pub async fn invite_member(
        &self,
        actor: &User,
        email: &str,
        display_name: Option<&str>,
        role: Role,
    ) -> ServiceResult<User> {
        Self::require_manager(actor)?;
        if role == Role::Owner && actor.role != Role::Owner {
            return Err(ServiceError::forbidden("Only owners can grant the owner role"));
        }

        let email = email.trim();
        if !is_valid_email(email) {
            return Err(ServiceError::validation(format!("Invalid email address: {}", email)));
        }

        let users = self.users();
        if users.find_by_email(email).await?.is_some() {
            return Err(ServiceError::conflict(format!("User {} already exists", email)));
        }

        let user = users.create(actor.tenant_id, email, display_name, role).await?;
        AnalyticsService::new(self.pool)
            .track(actor.tenant_id, user.id, EVENT_SIGNUP, serde_json::json!({"via": "invite"}))
            .await?;

        info!("{} invited {} as {:?}", actor.email, email, role);
        Ok(user)
    }

    pub async fn change_role(&self, actor: &User, user_id: i64, role: Role) -> ServiceResult<User> {
        Self::require_manager(actor)?;
        let mut target = self.member_of_actor_tenant(actor, user_id).await?;

        if (target.role == Role::Owner || role == Role::Owner) && actor.role != Role::Owner {
            return Err(ServiceError::forbidden("Only owners can grant or revoke the owner role"));
        }

        if target.role == Role::Owner && role != Role::Owner && target.is_active {
            let updated = self
                .users()
                .update_owner_keeping_one(target.id, actor.tenant_id, role, true)
                .await?;
            if !updated {
                return Err(Self::last_owner_conflict());
            }
        } else {
            self.users().update_role(target.id, role).await?;
        }
        info!("{} changed role of {} to {:?}", actor.email, target.email, role);
        target.role = role;
        Ok(target)
    }

    pub async fn deactivate_member(&self, actor: &User, user_id: i64) -> ServiceResult<User> {
        Self::require_manager(actor)?;
        if actor.id == user_id {
            return Err(ServiceError::validation("You cannot deactivate your own account"));
        }

        let mut target = self.member_of_actor_tenant(actor, user_id).await?;
        if target.role == Role::Owner {
            if actor.role != Role::Owner {
                return Err(ServiceError::forbidden("Only owners can deactivate an owner"));
            }
            let updated = self
                .users()
                .update_owner_keeping_one(target.id, actor.tenant_id, Role::Owner, false)
                .await?;
            if target.is_active && !updated {
                return Err(Self::last_owner_conflict());
            }
        } else {
            self.users().set_active(target.id, false).await?;
        }
        info!("{} deactivated {}", actor.email, target.email);
        target.is_active = false;
        Ok(target)
    }

    fn require_manager(actor: &User) -> ServiceResult<()> {
        if actor.role.can_manage_members() {
            Ok(())
        } else {
            Err(ServiceError::forbidden("Admin role required to manage members"))
        }
    }

    async fn member_of_actor_tenant(&self, actor: &User, user_id: i64) -> ServiceResult<User> {
        self.users()
            .find_by_id(user_id)
            .await?
            .filter(|user| user.tenant_id == actor.tenant_id)
            .ok_or_else(|| ServiceError::not_found(format!("User {}", user_id)))
    }

    fn last_owner_conflict() -> ServiceError {
        ServiceError::conflict("A tenant must keep at least one active owner")
    }
}
