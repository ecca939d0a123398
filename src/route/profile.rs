use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::AppState;
use crate::models::user::ProfileUpdate;
use crate::utils::auth::Role;
use crate::utils::errorhandler::AppError;
use crate::utils::jwt::verify_auth_token;

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;
    let role = Role::from_claims(&claims);

    if !role.can_access(user_id) {
        return Err(AppError::forbidden("not allowed to view this user"));
    }

    let subject = state
        .store
        .subjects
        .find_subject(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(json!(subject)))
}

//self-service path: the ProfileUpdate type is the field allow-list, so
//identity, credentials and role are never settable here
pub async fn update_profile(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<Value>, AppError> {
    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;
    let role = Role::from_claims(&claims);

    if payload.is_empty() {
        return Err(AppError::validation("no parameters provided"));
    }

    let subject = state
        .store
        .subjects
        .update_profile(role.actor_id(), payload)
        .await?;

    Ok(Json(json!(subject)))
}
