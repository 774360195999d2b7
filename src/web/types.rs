// src/web/types.rs

use crate::error::ServiceError;
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::Request;
use tracing::error;

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct TextResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct DataResponse<T> {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ActionResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_actions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(crate = "rocket::serde")]
pub struct StandardErrorResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(crate = "rocket::serde", rename_all = "lowercase")]
pub enum ResponseType {
    Text,
    Data,
    Action,
    Error,
}

// Request types with conversation_id support
#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct StandardRequest<T> {
    #[serde(flatten)]
    pub data: T,
    pub conversation_id: Option<String>,
}

// Helper trait for extracting conversation_id
pub trait WithConversationId {
    fn conversation_id(&self) -> Option<String>;
}

impl<T> WithConversationId for StandardRequest<T> {
    fn conversation_id(&self) -> Option<String> {
        self.conversation_id.clone()
    }
}

impl TextResponse {
    pub fn success(message: String, conversation_id: Option<String>) -> Self {
        Self {
            response_type: ResponseType::Text,
            success: true,
            message,
            conversation_id,
        }
    }
}

impl<T> DataResponse<T> {
    pub fn success(message: String, data: T, conversation_id: Option<String>) -> Self {
        Self {
            response_type: ResponseType::Data,
            success: true,
            message,
            data,
            conversation_id,
        }
    }
}

impl ActionResponse {
    pub fn success(message: String, action: String, conversation_id: Option<String>) -> Self {
        Self {
            response_type: ResponseType::Action,
            success: true,
            message,
            action,
            next_actions: None,
            conversation_id,
        }
    }

    pub fn with_next_actions(mut self, next_actions: Vec<String>) -> Self {
        self.next_actions = Some(next_actions);
        self
    }
}

impl StandardErrorResponse {
    pub fn new(
        error: String,
        error_code: String,
        suggestions: Vec<String>,
        conversation_id: Option<String>,
    ) -> Self {
        Self {
            response_type: ResponseType::Error,
            success: false,
            error,
            error_code,
            suggestions,
            conversation_id,
        }
    }
}

/// Error envelope sent with a real HTTP status
#[derive(Debug)]
pub struct ApiError {
    pub status: Status,
    pub body: StandardErrorResponse,
}

impl ApiError {
    pub fn service(e: ServiceError, conversation_id: Option<String>) -> Self {
        let (status, suggestions) = match &e {
            ServiceError::NotFound(_) => (
                Status::NotFound,
                vec!["Check the identifier and try again".to_string()],
            ),
            ServiceError::Forbidden(_) => (
                Status::Forbidden,
                vec!["Ask a tenant owner or admin for access".to_string()],
            ),
            ServiceError::Validation(_) => (
                Status::UnprocessableEntity,
                vec!["Fix the highlighted field and resend the request".to_string()],
            ),
            ServiceError::Conflict(_) => (
                Status::Conflict,
                vec!["The resource already exists or was changed concurrently".to_string()],
            ),
            ServiceError::Internal(inner) => {
                error!("Internal error: {:#}", inner);
                (
                    Status::InternalServerError,
                    vec![
                        "Try again in a few moments".to_string(),
                        "Contact support if the problem persists".to_string(),
                    ],
                )
            }
        };

        let message = match &e {
            ServiceError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        Self {
            status,
            body: StandardErrorResponse::new(
                message,
                e.code().to_string(),
                suggestions,
                conversation_id,
            ),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError::service(e, None)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        (self.status, Json(self.body)).respond_to(req)
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct UserInfo {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub role: crate::accounts::Role,
    pub tenant_id: i64,
    pub tenant_name: String,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct InviteMemberRequest {
    pub email: String,
    pub name: Option<String>,
    pub role: Option<crate::accounts::Role>,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct ChangeRoleRequest {
    pub role: crate::accounts::Role,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct IngestBatchRequest {
    pub jobs: Vec<crate::jobs::NewJob>,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct IngestUrlRequest {
    pub url: String,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct ApplyRequest {
    pub job_id: String,
    pub resume_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct StatusUpdateRequest {
    pub status: crate::applications::ApplicationStatus,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct MatchRequest {
    pub resume_id: String,
    pub job_id: String,
}

#[derive(Deserialize, Default)]
#[serde(crate = "rocket::serde")]
pub struct QuestionsRequest {
    pub resume_id: Option<String>,
    pub count: Option<u32>,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct TrackEventRequest {
    pub event_type: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}
