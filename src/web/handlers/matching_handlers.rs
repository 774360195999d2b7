// src/web/handlers/matching_handlers.rs
use super::parse_id;
use crate::ai_client::AiService;
use crate::auth::AuthenticatedUser;
use crate::core::{ConfigManager, Database, TtlCache};
use crate::matching::{MatchResult, MatchingService, QuestionSet, Recommendation, SalaryPrediction};
use crate::web::types::*;

use rocket::serde::json::Json;
use rocket::State;
use std::sync::Arc;

fn matching_service<'a>(
    db: &'a Database,
    cache: &'a TtlCache,
    ai: &'a Arc<dyn AiService>,
    config: &'a ConfigManager,
) -> MatchingService<'a> {
    MatchingService::new(db.pool(), cache, ai.as_ref(), &config.cache)
}

pub async fn match_handler(
    request: Json<StandardRequest<MatchRequest>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    ai: &State<Arc<dyn AiService>>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<MatchResult>> {
    let conversation_id = request.conversation_id();
    let resume_id = parse_id(&request.data.resume_id, conversation_id.clone())?;
    let job_id = parse_id(&request.data.job_id, conversation_id.clone())?;

    let result = matching_service(db, cache, ai, config)
        .match_resume(auth.user(), resume_id, job_id)
        .await
        .map_err(|e| ApiError::service(e, conversation_id.clone()))?;

    Ok(Json(DataResponse::success(
        format!("Match score {:.0}", result.analysis.score),
        result,
        conversation_id,
    )))
}

pub async fn recommendations_handler(
    resume_id: &str,
    limit: Option<usize>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    ai: &State<Arc<dyn AiService>>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<Vec<Recommendation>>> {
    let resume_id = parse_id(resume_id, None)?;
    let recommendations = matching_service(db, cache, ai, config)
        .recommend_jobs(auth.user(), resume_id, limit)
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} recommended jobs", recommendations.len()),
        recommendations,
        None,
    )))
}

pub async fn salary_handler(
    job_id: &str,
    _auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    ai: &State<Arc<dyn AiService>>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<SalaryPrediction>> {
    let job_id = parse_id(job_id, None)?;
    let prediction = matching_service(db, cache, ai, config)
        .predict_salary(job_id)
        .await?;

    let bound = |value: Option<i64>| value.map(|v| v.to_string()).unwrap_or_else(|| "?".into());
    Ok(Json(DataResponse::success(
        format!(
            "Estimated {}-{} {}",
            bound(prediction.estimate.min),
            bound(prediction.estimate.max),
            prediction.estimate.currency
        ),
        prediction,
        None,
    )))
}

pub async fn interview_questions_handler(
    job_id: &str,
    request: Option<Json<StandardRequest<QuestionsRequest>>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    ai: &State<Arc<dyn AiService>>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<QuestionSet>> {
    let (data, conversation_id) = match request {
        Some(request) => {
            let conversation_id = request.conversation_id();
            (request.into_inner().data, conversation_id)
        }
        None => (QuestionsRequest::default(), None),
    };
    let job_id = parse_id(job_id, conversation_id.clone())?;
    let resume_id = data
        .resume_id
        .as_deref()
        .map(|raw| parse_id(raw, conversation_id.clone()))
        .transpose()?;

    let set = matching_service(db, cache, ai, config)
        .interview_questions(auth.user(), job_id, resume_id, data.count)
        .await
        .map_err(|e| ApiError::service(e, conversation_id.clone()))?;

    Ok(Json(DataResponse::success(
        format!("{} interview questions", set.questions.len()),
        set,
        conversation_id,
    )))
}
