use aide::axum::routing::{get_with, post_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::Json;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::auth::{password_hash_create, password_hash_verify};
use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::models;
use crate::request_state::RequestState;

use super::extract::ApiJson;
use super::{required, required_text, Created};

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route("/auth/login", post_with(login, login_docs))
        .api_route("/auth/register", post_with(register, register_docs))
        .api_route("/auth/me", get_with(get_current_user, get_current_user_docs))
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct UserDto {
    pub id: u64,
    pub username: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub role_id: u64,
    pub role_name: String,
}

impl From<&models::User> for UserDto {
    fn from(value: &models::User) -> Self {
        Self {
            id: value.id,
            username: value.username.to_owned(),
            last_name: value.last_name.to_owned(),
            first_name: value.first_name.to_owned(),
            middle_name: value.middle_name.to_owned(),
            role_id: value.role_id,
            role_name: value.role_name.to_owned(),
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct LoginDto {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct LoginResponseDto {
    pub access_token: String,
    pub user: UserDto,
}

async fn login(
    mut state: RequestState,
    form: ApiJson<LoginDto>,
) -> ServiceResult<Json<LoginResponseDto>> {
    let form = form.0;

    let (username, password) = match (form.username, form.password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            (username, password)
        }
        _ => {
            return Err(ServiceError::BadRequest(
                "Username and password are required",
            ))
        }
    };

    let user = state.db.get_user_by_username(&username).await?;

    if let Some(user) = user {
        if password_hash_verify(&user.password_hash, &password) {
            let (access_token, _) = state.tokens.issue(user.id)?;

            return Ok(Json(LoginResponseDto {
                access_token,
                user: UserDto::from(&user),
            }));
        }
    }

    Err(ServiceError::Unauthorized("Invalid username or password"))
}

fn login_docs(op: TransformOperation) -> TransformOperation {
    op.description("Login with username and password.")
        .tag("auth")
        .response::<200, Json<LoginResponseDto>>()
        .response_with::<400, (), _>(|res| res.description("Missing username or password!"))
        .response_with::<401, (), _>(|res| res.description("Invalid username or password!"))
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct RegisterDto {
    pub username: Option<String>,
    pub password: Option<String>,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub role_id: Option<u64>,
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct UserCreatedDto {
    pub message: String,
    pub user: UserDto,
}

async fn register(
    mut state: RequestState,
    form: ApiJson<RegisterDto>,
) -> ServiceResult<Created<UserCreatedDto>> {
    state.session_require_admin()?;

    let form = form.0;
    let password = required(form.password.filter(|p| !p.is_empty()))?;

    let user = models::NewUser {
        username: required_text(form.username)?,
        password_hash: password_hash_create(&password),
        last_name: required_text(form.last_name)?,
        first_name: required_text(form.first_name)?,
        middle_name: form.middle_name.filter(|m| !m.trim().is_empty()),
        role_id: required(form.role_id)?,
    };

    let user = state.db.create_user(user).await?;
    Ok(Created(UserCreatedDto {
        message: "User created".to_owned(),
        user: UserDto::from(&user),
    }))
}

fn register_docs(op: TransformOperation) -> TransformOperation {
    op.description("Create a new user.")
        .tag("auth")
        .response::<201, Json<UserCreatedDto>>()
        .response_with::<400, (), _>(|res| {
            res.description("Missing fields or the username is already taken!")
        })
        .response_with::<404, (), _>(|res| res.description("The requested role does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin"])
}

async fn get_current_user(mut state: RequestState) -> ServiceResult<Json<UserDto>> {
    let session = state.session_require()?;

    let user = state.db.get_user_by_id(session.user.id).await?;

    if let Some(user) = user {
        return Ok(Json(UserDto::from(&user)));
    }

    Err(ServiceError::NotFound("User not found"))
}

fn get_current_user_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get the user of the current session.")
        .tag("auth")
        .response::<200, Json<UserDto>>()
        .response_with::<404, (), _>(|res| res.description("The user does not exist anymore!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement("SessionToken")
}
