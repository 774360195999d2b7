// src/web/handlers/system_handlers.rs
use crate::auth::{AuthenticatedUser, OptionalAuth};
use crate::core::Database;
use crate::error::ServiceError;
use crate::web::types::*;

use rocket::serde::json::Json;
use rocket::State;
use tracing::{error, info};

pub async fn health_handler(auth: OptionalAuth, db: &State<Database>) -> ApiResult<TextResponse> {
    if let Some(user) = auth.user {
        info!(
            "Health check by authenticated user: {} (tenant: {})",
            user.email(),
            user.tenant_name()
        );
    }

    if let Err(e) = db.health_check().await {
        error!("Health check failed: {:#}", e);
        return Err(ApiError::from(ServiceError::Internal(e)));
    }

    Ok(Json(TextResponse::success("OK".to_string(), None)))
}

pub async fn get_current_user_handler(auth: AuthenticatedUser) -> Json<DataResponse<UserInfo>> {
    let user = auth.user();
    let tenant = auth.tenant();

    Json(DataResponse::success(
        format!(
            "User authenticated successfully for tenant: {}",
            tenant.tenant_name
        ),
        UserInfo {
            id: user.id,
            email: user.email.clone(),
            name: user.display_name.clone(),
            role: user.role,
            tenant_id: tenant.id,
            tenant_name: tenant.tenant_name.clone(),
        },
        None,
    ))
}
