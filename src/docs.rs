use std::sync::Arc;

use aide::{
    axum::{
        routing::{get, get_with},
        ApiRouter, IntoApiResponse,
    },
    openapi::{OpenApi, SecurityScheme, Tag},
    redoc::Redoc,
    transform::TransformOpenApi,
};
use axum::{response::IntoResponse, Extension, Json};

pub fn api_docs(api: TransformOpenApi) -> TransformOpenApi {
    api.title("Video Recorders Management API")
        .summary("Custody of video recorders issued to employees")
        .description("Manage video recorders and employees and keep the issue and return history.")
        .tag(Tag {
            name: "auth".into(),
            description: Some("Login and user management".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "devices".into(),
            description: Some("Video recorders".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "employees".into(),
            description: Some("Employees and their photos".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "issues".into(),
            description: Some("Issues, returns and history".into()),
            ..Default::default()
        })
        .security_scheme(
            "SessionToken",
            SecurityScheme::Http {
                scheme: "bearer".into(),
                bearer_format: Some("JWT".into()),
                description: Some("Access token returned by the login.".into()),
                extensions: Default::default(),
            },
        )
}

pub fn docs_routes() -> ApiRouter {
    // Infer the `text/html` response of the redoc page only.
    aide::gen::infer_responses(true);

    let router = ApiRouter::new()
        .api_route(
            "/",
            get_with(
                Redoc::new("/docs/api.json")
                    .with_title("Video Recorders Management API")
                    .axum_handler(),
                |op| op.description("This documentation page."),
            ),
        )
        .route("/api.json", get(serve_docs));

    aide::gen::infer_responses(false);

    router
}

async fn serve_docs(Extension(api): Extension<Arc<OpenApi>>) -> impl IntoApiResponse {
    Json(api).into_response()
}
