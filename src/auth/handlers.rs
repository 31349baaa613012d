use axum::{
    extract::{FromRef, State},
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MessageResponse, PublicUser, RefreshRequest, SignupRequest},
        extractors::AuthUser,
        repo_types::User,
        services::{hash_password, normalize_signup, verify_password, JwtKeys},
        session::{clear_cookie, session_cookie},
    },
    error::ApiError,
    extract::ApiJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me).delete(delete_me))
}

fn is_unique_violation(e: &anyhow::Error) -> bool {
    e.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

/// Signs a token pair and the matching session cookie.
fn issue_session(
    state: &AppState,
    user: User,
) -> Result<(AppendHeaders<[(header::HeaderName, header::HeaderValue); 1]>, Json<AuthResponse>), ApiError> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        ApiError::Internal(e)
    })?;
    let refresh_token = keys.sign_refresh(user.id).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        ApiError::Internal(e)
    })?;
    let cookie = session_cookie(
        &access_token,
        keys.access_ttl.as_secs(),
        state.config.secure_cookies,
    )?;
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(AuthResponse {
            access_token,
            refresh_token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Err(e) = normalize_signup(&mut payload) {
        warn!(username = %payload.username, error = %e, "signup rejected");
        return Err(e);
    }

    if User::find_by_username(&state.db, &payload.username).await?.is_some() {
        warn!(username = %payload.username, "username already taken");
        return Err(ApiError::Conflict("Username already exists".into()));
    }
    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = match User::create(&state.db, &payload.username, &payload.email, &hash).await {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            warn!(username = %payload.username, "concurrent signup with same identity");
            return Err(ApiError::Conflict("Username or email already exists".into()));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(e.into());
        }
    };

    info!(user_id = %user.id, username = %user.username, "user registered");
    let (cookie, body) = issue_session(&state, user)?;
    Ok((StatusCode::CREATED, cookie, body))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.username = payload.username.trim().to_string();
    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest("Username and password are required".into()));
    }

    let user = match User::find_by_username(&state.db, &payload.username).await? {
        Some(u) => u,
        None => {
            warn!(username = %payload.username, "login unknown username");
            return Err(ApiError::Unauthorized("Invalid username or password".into()));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid username or password".into()));
    }

    info!(user_id = %user.id, username = %user.username, "user logged in");
    issue_session(&state, user)
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;
    issue_session(&state, user)
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        AppendHeaders([(header::SET_COOKIE, clear_cookie(state.config.secure_cookies))]),
        Json(MessageResponse {
            message: "Logged out".into(),
        }),
    )
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    Ok(Json(auth.account(&state.db).await?.into()))
}

/// Deletes the caller's account along with their prediction history.
#[instrument(skip(state))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    if !User::delete(&state.db, user_id).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }
    info!(user_id = %user_id, "user deleted");
    Ok((
        StatusCode::OK,
        AppendHeaders([(header::SET_COOKIE, clear_cookie(state.config.secure_cookies))]),
        Json(MessageResponse {
            message: "Account deleted".into(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> Router {
        crate::auth::router().with_state(AppState::fake())
    }

    async fn send(req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
        send_to(app(), req).await
    }

    async fn send_to(
        app: Router,
        req: Request<Body>,
    ) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
        let res = app.oneshot(req).await.expect("response");
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = res.into_body().collect().await.expect("body").to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, headers, body)
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[test]
    fn public_user_hides_password_hash() {
        let user = User {
            id: uuid::Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            created_at: time::OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));

        let public: PublicUser = user.into();
        let json = serde_json::to_value(&public).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["email"], "alice@example.com");
    }

    #[tokio::test]
    async fn signup_validates_before_touching_the_database() {
        let (status, _, body) = send(json_post(
            "/auth/signup",
            serde_json::json!({
                "username": "bob",
                "email": "bob@example.com",
                "password": "secret1",
                "password_confirm": "secret2"
            }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Passwords do not match");
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let (status, _, _) = send(json_post("/auth/login", serde_json::json!({"username": "bob"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_clears_the_cookie() {
        let (status, headers, body) = send(json_post("/auth/logout", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let cookie = headers.get(header::SET_COOKIE).expect("set-cookie").to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
        assert_eq!(body["message"], "Logged out");
    }

    #[tokio::test]
    async fn me_requires_authentication() {
        let req = Request::get("/auth/me").body(Body::empty()).unwrap();
        let (status, _, body) = send(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication required");

        let req = Request::delete("/auth/me").body(Body::empty()).unwrap();
        let (status, _, _) = send(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens() {
        let state = AppState::fake();
        let access = JwtKeys::from_ref(&state).sign_access(uuid::Uuid::new_v4()).unwrap();
        let (status, _, body) =
            send(json_post("/auth/refresh", serde_json::json!({ "refresh_token": access }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "not a refresh token");
    }

    fn signup_body(username: &str, email: &str) -> serde_json::Value {
        serde_json::json!({
            "username": username,
            "email": email,
            "password": "secret1",
            "password_confirm": "secret1"
        })
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_identity_is_a_conflict(pool: sqlx::PgPool) {
        let app = crate::auth::router().with_state(AppState::with_pool(pool, Default::default()));

        let (status, headers, body) =
            send_to(app.clone(), json_post("/auth/signup", signup_body(" Alice ", "Alice@Example.com"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(headers.get(header::SET_COOKIE).is_some());
        assert_eq!(body["user"]["username"], "Alice");
        assert_eq!(body["user"]["email"], "alice@example.com");

        let (status, _, body) =
            send_to(app.clone(), json_post("/auth/signup", signup_body("Alice", "new@example.com"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Username already exists");

        let (status, _, body) =
            send_to(app, json_post("/auth/signup", signup_body("alice2", "alice@example.com"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Email already registered");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn deleted_account_loses_its_session(pool: sqlx::PgPool) {
        let app = crate::auth::router().with_state(AppState::with_pool(pool, Default::default()));
        send_to(app.clone(), json_post("/auth/signup", signup_body("heidi", "heidi@example.com"))).await;

        let (status, _, body) = send_to(
            app.clone(),
            json_post("/auth/login", serde_json::json!({"username": "heidi", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let bearer = format!("Bearer {}", body["access_token"].as_str().expect("token"));

        let (status, _, _) = send_to(
            app.clone(),
            json_post("/auth/login", serde_json::json!({"username": "heidi", "password": "wrong!"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let me = || {
            Request::get("/auth/me")
                .header(header::AUTHORIZATION, &bearer)
                .body(Body::empty())
                .unwrap()
        };
        let (status, _, body) = send_to(app.clone(), me()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "heidi");

        let req = Request::delete("/auth/me")
            .header(header::AUTHORIZATION, &bearer)
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = send_to(app.clone(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::SET_COOKIE].to_str().unwrap().contains("Max-Age=0"));

        let (status, _, body) = send_to(app, me()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "User not found");
    }
}
