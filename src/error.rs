use aide::OperationOutput;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::{http::StatusCode, response::IntoResponse, Json};
use log::{debug, error};
use serde_json::json;

use crate::api::issues::IssueDto;
use crate::models;

/// Represent errors in the application
///
/// All `ServiceError`s can be transformed to http errors.
#[derive(Debug, Clone)]
pub enum ServiceError {
    InternalServerError(String),
    BadRequest(&'static str),
    Conflict(&'static str),
    /// The employee already holds a device; carries the blocking open issue.
    EmployeeHoldsDevice(Box<models::Issue>),
    Unauthorized(&'static str),
    Forbidden,
    NotFound(&'static str),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for ServiceError {}

/// Helper for `ServiceError` result
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::BadRequest(_)
            | ServiceError::Conflict(_)
            | ServiceError::EmployeeHoldsDevice(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return ServiceError::Conflict("A record with the same unique key already exists");
            }
        }

        error!("Database error: {}", err);
        ServiceError::InternalServerError(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for ServiceError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        ServiceError::InternalServerError(err.to_string())
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        error!("IO error: {}", err);
        ServiceError::InternalServerError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for ServiceError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        ServiceError::Unauthorized("Invalid access token")
    }
}

impl From<MultipartError> for ServiceError {
    fn from(_: MultipartError) -> Self {
        ServiceError::BadRequest("Invalid multipart body")
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected json body: {}", rejection.body_text());
        ServiceError::BadRequest("Invalid request body")
    }
}

impl From<PathRejection> for ServiceError {
    fn from(rejection: PathRejection) -> Self {
        debug!("Rejected path: {}", rejection.body_text());
        ServiceError::BadRequest("Invalid path parameter")
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(rejection: QueryRejection) -> Self {
        debug!("Rejected query string: {}", rejection.body_text());
        ServiceError::BadRequest("Invalid query string")
    }
}

impl OperationOutput for ServiceError {
    type Inner = String;
}
impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = match self {
            ServiceError::InternalServerError(ref cause) => json!({
                "error": "Internal server error",
                "cause": cause,
            }),
            ServiceError::EmployeeHoldsDevice(ref issue) => json!({
                "error": "Employee already holds a video recorder. Register the return first.",
                "active_issue": IssueDto::from(issue.as_ref()),
            }),
            ServiceError::Forbidden => json!({ "error": "Insufficient permissions" }),
            ServiceError::BadRequest(message)
            | ServiceError::Conflict(message)
            | ServiceError::Unauthorized(message)
            | ServiceError::NotFound(message) => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use chrono::Utc;

    use super::*;

    async fn body_json(err: ServiceError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn conflicts_are_bad_requests() {
        let (status, body) = body_json(ServiceError::Conflict("Device is already issued")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Device is already issued" }));
    }

    #[tokio::test]
    async fn status_codes_follow_error_kind() {
        assert_eq!(
            ServiceError::Unauthorized("Missing login").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ServiceError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ServiceError::NotFound("Device not found").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::InternalServerError("boom".to_owned()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn blocking_issue_is_part_of_the_body() {
        let issue = models::Issue {
            id: 7,
            device_id: Some(1),
            device_number: Some("VR-001".to_owned()),
            employee_id: Some(2),
            employee_name: Some("Jane Roe".to_owned()),
            issued_by_user_id: 3,
            issued_by_user_name: Some("John Doe".to_owned()),
            issue_date: Utc::now(),
            status: models::IssueStatus::Issued,
        };

        let (status, body) = body_json(ServiceError::EmployeeHoldsDevice(Box::new(issue))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["active_issue"]["id"], 7);
        assert_eq!(body["active_issue"]["device_number"], "VR-001");
        assert_eq!(body["active_issue"]["status"], "issued");
    }
}
