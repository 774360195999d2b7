// src/web/handlers/resume_handlers.rs
use super::parse_id;
use crate::auth::AuthenticatedUser;
use crate::core::{Database, TtlCache};
use crate::resumes::{Resume, ResumeInput, ResumeService};
use crate::web::types::*;

use rocket::serde::json::Json;
use rocket::State;
use tracing::info;

pub async fn create_resume_handler(
    request: Json<StandardRequest<ResumeInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
) -> ApiResult<DataResponse<Resume>> {
    let conversation_id = request.conversation_id();
    let StandardRequest { data, .. } = request.into_inner();

    let resume = ResumeService::new(db.pool(), cache)
        .create(auth.user(), data)
        .await
        .map_err(|e| ApiError::service(e, conversation_id.clone()))?;

    info!("User {} created resume {}", auth.email(), resume.id);

    Ok(Json(DataResponse::success(
        format!("Resume '{}' saved", resume.title),
        resume,
        conversation_id,
    )))
}

pub async fn list_resumes_handler(
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
) -> ApiResult<DataResponse<Vec<Resume>>> {
    let resumes = ResumeService::new(db.pool(), cache)
        .list(auth.user())
        .await?;

    Ok(Json(DataResponse::success(
        format!("Found {} resumes", resumes.len()),
        resumes,
        None,
    )))
}

pub async fn get_resume_handler(
    id: &str,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
) -> ApiResult<DataResponse<Resume>> {
    let id = parse_id(id, None)?;
    let resume = ResumeService::new(db.pool(), cache)
        .get(auth.user(), id)
        .await?;

    Ok(Json(DataResponse::success(resume.title.clone(), resume, None)))
}

pub async fn update_resume_handler(
    id: &str,
    request: Json<StandardRequest<ResumeInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
) -> ApiResult<DataResponse<Resume>> {
    let conversation_id = request.conversation_id();
    let id = parse_id(id, conversation_id.clone())?;
    let StandardRequest { data, .. } = request.into_inner();

    let resume = ResumeService::new(db.pool(), cache)
        .update(auth.user(), id, data)
        .await
        .map_err(|e| ApiError::service(e, conversation_id.clone()))?;

    Ok(Json(DataResponse::success(
        format!("Resume '{}' updated", resume.title),
        resume,
        conversation_id,
    )))
}

pub async fn delete_resume_handler(
    id: &str,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
) -> ApiResult<ActionResponse> {
    let id = parse_id(id, None)?;
    ResumeService::new(db.pool(), cache)
        .delete(auth.user(), id)
        .await?;

    Ok(Json(
        ActionResponse::success(
            format!("Resume {} deleted", id),
            "deleted".to_string(),
            None,
        )
        .with_next_actions(vec!["Create a new resume with POST /resumes".to_string()]),
    ))
}
