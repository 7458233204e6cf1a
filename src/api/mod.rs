use aide::axum::routing::get_with;
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use aide::OperationOutput;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use schemars::JsonSchema;
use serde::Serialize;

use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::models;

pub mod auth;
pub mod devices;
pub mod employees;
pub mod extract;
pub mod issues;

pub fn init(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route("/health", get_with(health, health_docs))
        .merge(auth::router(app_state.clone()))
        .merge(devices::router(app_state.clone()))
        .merge(employees::router(app_state.clone()))
        .merge(issues::router(app_state))
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct HealthDto {
    pub status: String,
}

async fn health() -> Json<HealthDto> {
    Json(HealthDto {
        status: "ok".to_owned(),
    })
}

fn health_docs(op: TransformOperation) -> TransformOperation {
    op.description("Check that the server is running.")
        .tag("health")
        .response::<200, Json<HealthDto>>()
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct MessageDto {
    pub message: String,
}

impl MessageDto {
    pub fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_owned(),
        })
    }
}

/// Response with status `201 Created` and a json body.
pub struct Created<T>(pub T);

impl<T> OperationOutput for Created<T> {
    type Inner = T;
}
impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

/// Raw image data with the stored mime type as content type.
pub struct ImageResponse(pub models::Image);

impl OperationOutput for ImageResponse {
    type Inner = Vec<u8>;
}
impl IntoResponse for ImageResponse {
    fn into_response(self) -> axum::response::Response {
        let mut header = HeaderMap::new();
        if let Ok(content_type) = HeaderValue::from_str(&self.0.mimetype) {
            header.insert(header::CONTENT_TYPE, content_type);
        }

        (StatusCode::OK, header, self.0.data).into_response()
    }
}

/// Unwrap a required request field.
pub fn required<T>(value: Option<T>) -> ServiceResult<T> {
    value.ok_or(ServiceError::BadRequest("Missing required fields"))
}

/// Unwrap a required text field, blank values count as missing.
pub fn required_text(value: Option<String>) -> ServiceResult<String> {
    let value = required(value)?;
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(ServiceError::BadRequest("Missing required fields"));
    }

    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    #[test]
    fn required_fields_must_be_present() {
        assert_eq!(required(Some(3)).unwrap(), 3);
        assert!(matches!(
            required::<u64>(None),
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[test]
    fn blank_text_counts_as_missing() {
        assert_eq!(required_text(Some(" VR-1 ".to_owned())).unwrap(), "VR-1");
        assert!(required_text(Some("   ".to_owned())).is_err());
        assert!(required_text(None).is_err());
    }

    #[tokio::test]
    async fn created_uses_status_201() {
        let response = Created(MessageDto {
            message: "created".to_owned(),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"message":"created"}"#);
    }

    #[tokio::test]
    async fn image_response_sets_content_type() {
        let response = ImageResponse(models::Image {
            data: vec![1, 2, 3],
            mimetype: "image/png".to_owned(),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], &[1, 2, 3]);
    }
}
