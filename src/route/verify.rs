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
use crate::models::checkin::VerifyQrReq;
use crate::utils::auth::Role;
use crate::utils::errorhandler::AppError;
use crate::utils::jwt::verify_auth_token;

pub async fn verify_qr(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<VerifyQrReq>,
) -> Result<Json<Value>, AppError> {
    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;
    Role::from_claims(&claims).require_officer()?;

    let checkin = state
        .verifier
        .verify(payload.checkin_id, payload.officer_id)
        .await?;

    Ok(Json(json!({
        "message": "QR code is valid and user is now checked in",
        "subject_id": checkin.holder.subject_id(),
        "checkin_id": checkin.checkin_id,
        "verified_by": payload.officer_id
    })))
}

//readable by holders and security alike, it only projects state
pub async fn checkin_status(
    State(state): State<AppState>,
    Path(checkin_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state.checkins.get_status(checkin_id).await?;
    Ok(Json(json!(snapshot)))
}
