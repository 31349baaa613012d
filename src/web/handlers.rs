use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tracing::instrument;

use super::render::{escape, layout, prediction_form, prediction_table};
use crate::{
    auth::{AuthUser, User},
    error::ApiError,
    ml::ModelKind,
    predictions::repo,
    state::AppState,
};

pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/dashboard", get(dashboard))
        .route("/history", get(history))
        .route("/traffic", get(traffic))
        .route("/air-quality", get(air_quality))
        .route("/energy", get(energy))
}

const LANDING: &str = r#"<h1>Smart City prediction platform</h1>
<p>Traffic congestion, air quality and energy consumption forecasts.</p>
<div class="cards">
<div class="card"><h2>Sign up</h2>
<form onsubmit="event.preventDefault(); submitJson(this, '/auth/signup', () => location.href='/dashboard')">
<label>Username <input name="username" required></label>
<label>Email <input name="email" type="email" required></label>
<label>Password <input name="password" type="password" minlength="6" required></label>
<label>Confirm password <input name="password_confirm" type="password" minlength="6" required></label>
<button type="submit">Create account</button></form></div>
<div class="card"><h2>Log in</h2>
<form onsubmit="event.preventDefault(); submitJson(this, '/auth/login', () => location.href='/dashboard')">
<label>Username <input name="username" required></label>
<label>Password <input name="password" type="password" required></label>
<button type="submit">Log in</button></form></div>
</div><div id="result"></div>"#;

/// Resolves the session to a user, or `None` when the session is missing,
/// invalid, or belongs to a deleted account.
async fn current_user(state: &AppState, auth: Option<AuthUser>) -> Result<Option<User>, ApiError> {
    match auth {
        Some(AuthUser(id)) => Ok(User::find_by_id(&state.db, id).await?),
        None => Ok(None),
    }
}

#[instrument(skip(state, auth))]
pub async fn index(State(state): State<AppState>, auth: Option<AuthUser>) -> Result<Response, ApiError> {
    if current_user(&state, auth).await?.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    Ok(layout("Welcome", None, LANDING).into_response())
}

#[instrument(skip(state, auth))]
pub async fn dashboard(State(state): State<AppState>, auth: Option<AuthUser>) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, auth).await? else {
        return Ok(Redirect::to("/").into_response());
    };
    let counts = repo::counts_by_user(&state.db, user.id).await?;
    let recent = repo::list_by_user(&state.db, user.id, None, Some(5), 0).await?;

    let body = format!(
        r#"<h1>Welcome, {name}</h1>
<div class="cards">
<div class="card"><h3>Total</h3><p>{total}</p></div>
<div class="card"><h3>Traffic</h3><p>{traffic}</p></div>
<div class="card"><h3>Air quality</h3><p>{air}</p></div>
<div class="card"><h3>Energy</h3><p>{energy}</p></div>
</div>
<h2>Recent predictions</h2>{table}"#,
        name = escape(&user.username),
        total = counts.total,
        traffic = counts.traffic,
        air = counts.air_quality,
        energy = counts.energy,
        table = prediction_table(&recent),
    );
    Ok(layout("Dashboard", Some(&user.username), &body).into_response())
}

#[instrument(skip(state, auth))]
pub async fn history(State(state): State<AppState>, auth: Option<AuthUser>) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, auth).await? else {
        return Ok(Redirect::to("/").into_response());
    };
    let rows = repo::list_by_user(&state.db, user.id, None, None, 0).await?;
    let body = format!("<h1>Prediction history</h1>{}", prediction_table(&rows));
    Ok(layout("History", Some(&user.username), &body).into_response())
}

async fn prediction_page(
    state: &AppState,
    auth: Option<AuthUser>,
    title: &str,
    kind: ModelKind,
    endpoint: &str,
    result_js: &str,
) -> Result<Response, ApiError> {
    let Some(user) = current_user(state, auth).await? else {
        return Ok(Redirect::to("/").into_response());
    };
    let notice = if state.models.is_loaded(kind) {
        String::new()
    } else {
        format!("<p><em>The {kind} model is not loaded; predictions will fail.</em></p>")
    };
    let body = format!(
        "<h1>{}</h1>{notice}{}",
        escape(title),
        prediction_form(endpoint, kind.feature_names(), result_js)
    );
    Ok(layout(title, Some(&user.username), &body).into_response())
}

#[instrument(skip(state, auth))]
pub async fn traffic(State(state): State<AppState>, auth: Option<AuthUser>) -> Result<Response, ApiError> {
    prediction_page(
        &state,
        auth,
        "Traffic congestion",
        ModelKind::Traffic,
        "/api/predict/traffic",
        "`Traffic level: ${body.label} (${(body.confidence * 100).toFixed(1)}% confidence)`",
    )
    .await
}

#[instrument(skip(state, auth))]
pub async fn air_quality(State(state): State<AppState>, auth: Option<AuthUser>) -> Result<Response, ApiError> {
    prediction_page(
        &state,
        auth,
        "Air quality",
        ModelKind::AirQuality,
        "/api/predict/air-quality",
        "`Predicted AQI: ${body.aqi.toFixed(1)}`",
    )
    .await
}

#[instrument(skip(state, auth))]
pub async fn energy(State(state): State<AppState>, auth: Option<AuthUser>) -> Result<Response, ApiError> {
    prediction_page(
        &state,
        auth,
        "Energy consumption",
        ModelKind::Energy,
        "/api/predict/energy",
        "`Predicted consumption: ${body.consumption_kwh.toFixed(1)} kWh`",
    )
    .await
}

/// Plain page for unknown paths.
pub async fn not_found() -> impl IntoResponse {
    (
        axum::http::StatusCode::NOT_FOUND,
        Html("<h1>404</h1><p>Page not found.</p><a href=\"/\">Home</a>"),
    )
}
