use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use super::dto::{JwtKeys, TokenKind};
use super::repo_types::User;
use super::session::{token_from_bearer, token_from_cookies};
use crate::error::ApiError;

/// Authenticated caller. Reads the access token from the `Authorization`
/// header first, then from the session cookie.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

impl AuthUser {
    /// Loads the account behind the token. Tokens outlive deleted accounts,
    /// so a missing row is treated as an unauthenticated request.
    pub async fn account(&self, db: &PgPool) -> Result<User, ApiError> {
        User::find_by_id(db, self.0).await?.ok_or_else(|| {
            warn!(user_id = %self.0, "token refers to a missing account");
            ApiError::Unauthorized("User not found".into())
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = token_from_bearer(&parts.headers)
            .or_else(|| token_from_cookies(&parts.headers))
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(ApiError::Unauthorized("Invalid or expired token".into()));
            }
        };

        if claims.kind != TokenKind::Access {
            return Err(ApiError::Unauthorized("Access token required".into()));
        }

        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::COOKIE_NAME;
    use crate::state::AppState;
    use axum::http::{header, Request, StatusCode};

    fn parts(header_name: header::HeaderName, value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(header_name, value)
            .body(())
            .expect("request")
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn accepts_bearer_and_cookie_tokens() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id).expect("sign");

        let mut p = parts(header::AUTHORIZATION, &format!("Bearer {token}"));
        let AuthUser(id) = AuthUser::from_request_parts(&mut p, &state).await.expect("bearer");
        assert_eq!(id, user_id);

        let mut p = parts(header::COOKIE, &format!("{COOKIE_NAME}={token}"));
        let AuthUser(id) = AuthUser::from_request_parts(&mut p, &state).await.expect("cookie");
        assert_eq!(id, user_id);
    }

    #[tokio::test]
    async fn rejects_missing_and_refresh_tokens() {
        let state = AppState::fake();
        let (mut p, _) = Request::builder().body(()).expect("request").into_parts();
        let err = AuthUser::from_request_parts(&mut p, &state).await.err().expect("rejected");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let refresh = JwtKeys::from_ref(&state).sign_refresh(Uuid::new_v4()).expect("sign");
        let mut p = parts(header::AUTHORIZATION, &format!("Bearer {refresh}"));
        let err = AuthUser::from_request_parts(&mut p, &state).await.err().expect("rejected");
        assert_eq!(err.to_string(), "Access token required");

        let mut p = parts(header::AUTHORIZATION, "Bearer garbage");
        let err = AuthUser::from_request_parts(&mut p, &state).await.err().expect("rejected");
        assert_eq!(err.to_string(), "Invalid or expired token");
    }
}
