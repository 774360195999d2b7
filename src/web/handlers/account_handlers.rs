// src/web/handlers/account_handlers.rs
use crate::accounts::{AccountService, Role, User};
use crate::auth::RequireAdmin;
use crate::core::Database;
use crate::web::types::*;

use rocket::serde::json::Json;
use rocket::State;
use tracing::info;

pub async fn list_members_handler(
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<Vec<User>>> {
    let RequireAdmin(auth) = admin;
    let members = AccountService::new(db.pool())
        .list_members(auth.user())
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} members in {}", members.len(), auth.tenant_name()),
        members,
        None,
    )))
}

pub async fn invite_member_handler(
    request: Json<StandardRequest<InviteMemberRequest>>,
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<User>> {
    let RequireAdmin(auth) = admin;
    let conversation_id = request.conversation_id();
    let role = request.data.role.unwrap_or(Role::Member);

    info!(
        "User {} (tenant: {}) inviting {}",
        auth.email(),
        auth.tenant_name(),
        request.data.email
    );

    let user = AccountService::new(db.pool())
        .invite_member(
            auth.user(),
            &request.data.email,
            request.data.name.as_deref(),
            role,
        )
        .await
        .map_err(|e| ApiError::service(e, conversation_id.clone()))?;

    Ok(Json(DataResponse::success(
        format!("{} joined {} as {:?}", user.email, auth.tenant_name(), role),
        user,
        conversation_id,
    )))
}

pub async fn change_role_handler(
    user_id: i64,
    request: Json<StandardRequest<ChangeRoleRequest>>,
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<User>> {
    let RequireAdmin(auth) = admin;
    let conversation_id = request.conversation_id();

    let user = AccountService::new(db.pool())
        .change_role(auth.user(), user_id, request.data.role)
        .await
        .map_err(|e| ApiError::service(e, conversation_id.clone()))?;

    Ok(Json(DataResponse::success(
        format!("{} is now {:?}", user.email, user.role),
        user,
        conversation_id,
    )))
}

pub async fn deactivate_member_handler(
    user_id: i64,
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<ActionResponse> {
    let RequireAdmin(auth) = admin;
    let user = AccountService::new(db.pool())
        .deactivate_member(auth.user(), user_id)
        .await?;

    Ok(Json(ActionResponse::success(
        format!("{} has been deactivated", user.email),
        "deactivated".to_string(),
        None,
    )))
}
