use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Clone, Debug)]
pub enum ApiResponse<T> {
    OkResponse(Json<T>),
    Accepted(Json<T>),
    Conflict(Json<T>),
    BadRequest(Json<ErrorResponse>),
    NotFound(Json<ErrorResponse>),
    InternalServerError(Json<ErrorResponse>),
    TooManyRequests(Json<ErrorResponse>),
}

impl From<JsonRejection> for ApiResponse<ErrorResponse> {
    fn from(rejection: JsonRejection) -> ApiResponse<ErrorResponse> {
        ApiResponse::BadRequest(Json(ErrorResponse {
            error: rejection.body_text(),
        }))
    }
}

impl From<QueryRejection> for ApiResponse<ErrorResponse> {
    fn from(rejection: QueryRejection) -> ApiResponse<ErrorResponse> {
        ApiResponse::BadRequest(Json(ErrorResponse {
            error: rejection.body_text(),
        }))
    }
}

impl From<PathRejection> for ApiResponse<ErrorResponse> {
    fn from(rejection: PathRejection) -> ApiResponse<ErrorResponse> {
        ApiResponse::BadRequest(Json(ErrorResponse {
            error: rejection.body_text(),
        }))
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        match self {
            ApiResponse::OkResponse(json) => (StatusCode::OK, json).into_response(),
            ApiResponse::Accepted(json) => (StatusCode::ACCEPTED, json).into_response(),
            ApiResponse::Conflict(json) => (StatusCode::CONFLICT, json).into_response(),
            ApiResponse::BadRequest(json) => (StatusCode::BAD_REQUEST, json).into_response(),
            ApiResponse::NotFound(json) => (StatusCode::NOT_FOUND, json).into_response(),
            ApiResponse::InternalServerError(json) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json).into_response()
            }
            ApiResponse::TooManyRequests(json) => {
                (StatusCode::TOO_MANY_REQUESTS, json).into_response()
            }
        }
    }
}

pub fn ok_response<T: Serialize>(data: T) -> ApiResponse<T> {
    ApiResponse::OkResponse(Json(data))
}

pub fn accepted<T: Serialize>(data: T) -> ApiResponse<T> {
    ApiResponse::Accepted(Json(data))
}

pub fn conflict<T: Serialize>(data: T) -> ApiResponse<T> {
    ApiResponse::Conflict(Json(data))
}

pub fn bad_request<T: Into<String>>(msg: T) -> ApiResponse<()> {
    ApiResponse::BadRequest(Json(ErrorResponse { error: msg.into() }))
}

pub fn not_found<T: Into<String>>(msg: T) -> ApiResponse<()> {
    ApiResponse::NotFound(Json(ErrorResponse { error: msg.into() }))
}

pub fn internal_server_error<T: Into<String>>(msg: T) -> ApiResponse<()> {
    ApiResponse::InternalServerError(Json(ErrorResponse { error: msg.into() }))
}

pub fn too_many_requests<T: Into<String>>(msg: T) -> ApiResponse<()> {
    ApiResponse::TooManyRequests(Json(ErrorResponse { error: msg.into() }))
}
