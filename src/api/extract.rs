//! Request extractors that answer malformed input with `ServiceError::BadRequest`.
use aide::gen::GenContext;
use aide::openapi::Operation;
use aide::OperationInput;
use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::error::ServiceError;

/// Json request body.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl<T: JsonSchema> OperationInput for ApiJson<T> {
    fn operation_input(ctx: &mut GenContext, operation: &mut Operation) {
        Json::<T>::operation_input(ctx, operation);
    }
}

/// Path parameters.
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

impl<T: JsonSchema> OperationInput for ApiPath<T> {
    fn operation_input(ctx: &mut GenContext, operation: &mut Operation) {
        Path::<T>::operation_input(ctx, operation);
    }
}

/// Query string parameters.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

impl<T: JsonSchema> OperationInput for ApiQuery<T> {
    fn operation_input(ctx: &mut GenContext, operation: &mut Operation) {
        Query::<T>::operation_input(ctx, operation);
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Transfer {
        device_id: Option<u64>,
    }

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/api/issues/issue")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn error_body(err: ServiceError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn wrong_json_types_are_bad_requests() {
        for body in [
            r#"{"device_id":"abc","employee_id":1}"#,
            r#"{"device_id":-1,"employee_id":1}"#,
            r#"{"device_id":"#,
        ] {
            let err = match ApiJson::<Transfer>::from_request(json_request(body), &()).await {
                Ok(_) => panic!("{body} must be rejected"),
                Err(err) => err,
            };

            let (status, body) = error_body(err).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn missing_content_type_is_a_bad_request() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/issues/issue")
            .body(Body::from(r#"{"device_id":1}"#))
            .unwrap();

        let err = match ApiJson::<Transfer>::from_request(req, &()).await {
            Ok(_) => panic!("a body without content type must be rejected"),
            Err(err) => err,
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn valid_json_is_extracted() {
        let ApiJson(value) = ApiJson::<Transfer>::from_request(json_request(r#"{"device_id":3}"#), &())
            .await
            .unwrap();
        assert_eq!(value.device_id, Some(3));
    }

    #[tokio::test]
    async fn invalid_query_is_a_bad_request() {
        #[derive(Debug, Deserialize)]
        struct Filter {
            #[allow(dead_code)]
            limit: u64,
        }

        let req = Request::builder()
            .uri("/api/issues/history?limit=abc")
            .body(Body::empty())
            .unwrap();
        let (mut parts, _) = req.into_parts();

        let err = match ApiQuery::<Filter>::from_request_parts(&mut parts, &()).await {
            Ok(_) => panic!("limit=abc must be rejected"),
            Err(err) => err,
        };
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}
