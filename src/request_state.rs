use aide::OperationInput;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    RequestPartsExt,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};

use crate::{
    auth::TokenKeys,
    database::{AppState, DatabaseConnection},
    error::{ServiceError, ServiceResult},
    models::{self, Role, Session},
    photo_store::PhotoStore,
};

// Every handler gets a pooled connection and the session resolved from the bearer token.
pub struct RequestState {
    pub db: DatabaseConnection,
    pub session: Option<Session>,
    pub photos: PhotoStore,
    pub tokens: TokenKeys,
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestState
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let mut db = state.connection().await?;

        let session = if let Ok(TypedHeader(Authorization(bearer))) =
            parts.extract::<TypedHeader<Authorization<Bearer>>>().await
        {
            let token = bearer.token().to_owned();
            resolve_session(&state.tokens, &mut db, token).await?
        } else {
            None
        };

        Ok(Self {
            db,
            session,
            photos: state.photos,
            tokens: state.tokens,
        })
    }
}

/// Invalid or expired tokens and tokens of unknown users yield no session.
async fn resolve_session(
    tokens: &TokenKeys,
    db: &mut DatabaseConnection,
    token: String,
) -> ServiceResult<Option<Session>> {
    let (user_id, valid_until) = match tokens.verify(&token) {
        Ok(claims) => claims,
        Err(_) => return Ok(None),
    };

    let session = db.get_user_by_id(user_id).await?.map(|user| Session {
        user,
        token,
        valid_until,
    });

    Ok(session)
}

impl OperationInput for RequestState {}

impl RequestState {
    pub fn session_require(&self) -> ServiceResult<Session> {
        self.session
            .clone()
            .ok_or(ServiceError::Unauthorized("Missing login"))
    }

    pub fn session_require_user(&self) -> ServiceResult<models::User> {
        Ok(self.session_require()?.user)
    }

    pub fn session_require_admin(&self) -> ServiceResult<models::User> {
        let user = self.session_require_user()?;

        match user.role() {
            Role::Admin => Ok(user),
            Role::Operator => Err(ServiceError::Forbidden),
        }
    }
}
