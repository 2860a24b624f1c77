//! Request authentication middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::{authorization::Basic, Authorization};
use axum_extra::TypedHeader;
use std::sync::Arc;

use super::handlers::{ApiError, AppState};
use crate::auth::{AuthError, SignedInUser, SESSION_COOKIE};

/// Resolve the caller from Basic credentials, falling back to the session cookie
pub fn authenticate(
    state: &AppState,
    basic: Option<&Basic>,
    jar: &CookieJar,
) -> Result<SignedInUser, AuthError> {
    if let Some(credentials) = basic {
        return state
            .users
            .authenticate(credentials.username(), credentials.password())
            .map(|user| user.signed_in())
            .ok_or(AuthError::InvalidCredentials);
    }

    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingCredentials)?;
    let user_id = state
        .sessions
        .lookup(token)
        .ok_or(AuthError::InvalidSession)?;
    state
        .users
        .get(user_id)
        .map(|user| user.signed_in())
        .ok_or(AuthError::InvalidSession)
}

/// Rejects unauthenticated requests with 401, otherwise attaches [`SignedInUser`]
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    basic: Option<TypedHeader<Authorization<Basic>>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let basic = basic.as_ref().map(|TypedHeader(Authorization(credentials))| credentials);
    match authenticate(&state, basic, &jar) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::debug!(path = %request.uri().path(), reason = %e, "Unauthenticated request");
            Err(ApiError::Unauthorized)
        }
    }
}
