use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::CurrentUser,
    error::{UserError, UserResult},
    state::AppState,
    users::{
        dto::{
            validate_changes, validate_password, validate_username, CreateUserRequest,
            MessageResponse,
        },
        model::{User, UserChanges, UserNode},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/tree", get(user_tree))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    _caller: CurrentUser,
) -> UserResult<Json<Vec<User>>> {
    Ok(Json(state.users.get_all().await?))
}

/// Everyone below the caller in the hierarchy.
#[instrument(skip_all)]
pub async fn user_tree(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> UserResult<Json<Vec<UserNode>>> {
    Ok(Json(state.users.get_user_tree(caller.id).await?))
}

#[instrument(skip(state, _caller))]
pub async fn get_user(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(id): Path<Uuid>,
) -> UserResult<Json<User>> {
    let user = state
        .users
        .get_by_id(id)
        .await?
        .ok_or(UserError::NotFound(id))?;
    Ok(Json(user))
}

#[instrument(skip(state, _caller, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Json(payload): Json<CreateUserRequest>,
) -> UserResult<(StatusCode, Json<User>)> {
    let username = validate_username(&payload.username)?;
    validate_password(&payload.password)?;
    let user = state
        .users
        .create(&username, &payload.password, payload.parent_user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, _caller, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserChanges>,
) -> UserResult<Json<User>> {
    let changes = validate_changes(payload)?;
    Ok(Json(state.users.update(id, changes).await?))
}

#[instrument(skip(state, _caller))]
pub async fn delete_user(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(id): Path<Uuid>,
) -> UserResult<Json<MessageResponse>> {
    state.users.soft_delete(id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}
