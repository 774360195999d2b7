// src/web/handlers/application_handlers.rs
use super::parse_id;
use crate::applications::{Application, ApplicationService};
use crate::auth::AuthenticatedUser;
use crate::core::Database;
use crate::web::types::*;

use rocket::serde::json::Json;
use rocket::State;

pub async fn apply_handler(
    request: Json<StandardRequest<ApplyRequest>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<DataResponse<Application>> {
    let conversation_id = request.conversation_id();
    let job_id = parse_id(&request.data.job_id, conversation_id.clone())?;
    let resume_id = request
        .data
        .resume_id
        .as_deref()
        .map(|raw| parse_id(raw, conversation_id.clone()))
        .transpose()?;

    let application = ApplicationService::new(db.pool())
        .apply(auth.user(), job_id, resume_id)
        .await
        .map_err(|e| ApiError::service(e, conversation_id.clone()))?;

    Ok(Json(DataResponse::success(
        "Application submitted".to_string(),
        application,
        conversation_id,
    )))
}

pub async fn list_applications_handler(
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<DataResponse<Vec<Application>>> {
    let applications = ApplicationService::new(db.pool())
        .list_for_user(auth.user())
        .await?;

    Ok(Json(DataResponse::success(
        format!("Found {} applications", applications.len()),
        applications,
        None,
    )))
}

pub async fn list_job_applications_handler(
    job_id: &str,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<DataResponse<Vec<Application>>> {
    let job_id = parse_id(job_id, None)?;
    let applications = ApplicationService::new(db.pool())
        .list_for_job(auth.user(), job_id)
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} applications for job {}", applications.len(), job_id),
        applications,
        None,
    )))
}

pub async fn update_application_status_handler(
    id: &str,
    request: Json<StandardRequest<StatusUpdateRequest>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<DataResponse<Application>> {
    let conversation_id = request.conversation_id();
    let id = parse_id(id, conversation_id.clone())?;

    let application = ApplicationService::new(db.pool())
        .update_status(auth.user(), id, request.data.status)
        .await
        .map_err(|e| ApiError::service(e, conversation_id.clone()))?;

    Ok(Json(DataResponse::success(
        format!("Application moved to {:?}", application.status),
        application,
        conversation_id,
    )))
}
