use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse},
        extractors::CurrentUser,
    },
    error::{UserError, UserResult},
    state::AppState,
    users::dto::{validate_password, validate_username, MessageResponse},
};

const SESSION_COOKIE: &str = "jwt";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> UserResult<(StatusCode, Json<RegisterResponse>)> {
    let username = validate_username(&payload.username)?;
    validate_password(&payload.password)?;

    let user = state
        .users
        .create(&username, &payload.password, payload.parent_user_id)
        .await?;

    info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully",
            user,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> UserResult<(HeaderMap, Json<LoginResponse>)> {
    let user = state
        .identity
        .validate_credentials(payload.username.trim(), &payload.password)
        .await?
        .ok_or(UserError::Unauthorized)?;

    let token = state.identity.login(&user).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        UserError::from(e)
    })?;

    let max_age = state.config.jwt.ttl_seconds();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&format!("{SESSION_COOKIE}={token}; Max-Age={max_age}"))?,
    );

    Ok((
        headers,
        Json(LoginResponse {
            message: "Login successful",
            token,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn logout(
    CurrentUser(user): CurrentUser,
) -> UserResult<(HeaderMap, Json<MessageResponse>)> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&format!("{SESSION_COOKIE}=; Max-Age=0"))?,
    );
    info!(user_id = %user.id, "user logged out");
    Ok((
        headers,
        Json(MessageResponse {
            message: "Logout successful",
        }),
    ))
}

fn session_cookie(value: &str) -> UserResult<HeaderValue> {
    HeaderValue::from_str(&format!("{value}; HttpOnly; Path=/; SameSite=Lax"))
        .map_err(|e| UserError::Internal(format!("session cookie: {e}")))
}
