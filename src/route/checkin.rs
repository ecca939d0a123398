use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde_json::{Value, json};

use crate::AppState;
use crate::models::checkin::{CheckInFilter, CheckoutReq, CreateCheckInReq};
use crate::utils::auth::Role;
use crate::utils::errorhandler::AppError;
use crate::utils::jwt::verify_auth_token;

pub async fn create_checkin(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<CreateCheckInReq>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access for token"))?;
    let role = Role::from_claims(&claims);

    //subjects check themselves in; admins and officers may check in anyone
    if !role.can_access(payload.subject_id) {
        return Err(AppError::forbidden("cannot check in another user"));
    }

    let booking_id = payload.booking_id;
    let checkin = state.checkins.create_checkin(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Check-in successful. Present this QR code to security.",
            "qr_payload": checkin.qr_payload,
            "checkin_id": checkin.checkin_id,
            "booking_id": booking_id
        })),
    ))
}

pub async fn checkout(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<CheckoutReq>,
) -> Result<Json<Value>, AppError> {
    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;
    let officer_id = Role::from_claims(&claims).require_officer()?;

    let checkin = state.checkins.checkout(payload.checkin_id, officer_id).await?;

    Ok(Json(json!({
        "message": "User checked out successfully",
        "checkin_id": checkin.checkin_id,
        "checked_out_by": officer_id
    })))
}

pub async fn list_checkins(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(filter): Query<CheckInFilter>,
) -> Result<Json<Value>, AppError> {
    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;
    let role = Role::from_claims(&claims);

    if !(role.is_admin() || role.is_officer()) {
        return Err(AppError::forbidden("not authorized"));
    }

    let checkins = state.checkins.list_checkins(filter).await?;
    Ok(Json(json!(checkins)))
}

pub async fn my_checkins(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;
    let role = Role::from_claims(&claims);

    let checkins = state.checkins.my_checkins(role.actor_id()).await?;
    Ok(Json(json!(checkins)))
}
