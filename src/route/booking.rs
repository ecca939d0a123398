use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::AppState;
use crate::models::booking::{
    AvailabilityParams, BookingFilter, CreateBookingReq, TimeSlot, parse_date, parse_time,
};
use crate::utils::auth::Role;
use crate::utils::errorhandler::AppError;
use crate::utils::jwt::verify_auth_token;

pub async fn create_booking(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<CreateBookingReq>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access for token"))?;
    let role = Role::from_claims(&claims);

    //check the caller may book on behalf of the named subject
    if !role.can_modify(payload.subject_id) {
        return Err(AppError::forbidden("cannot book for another user"));
    }

    let date = parse_date(&payload.booking_date)?;
    let slot = TimeSlot::new(parse_time(&payload.start_time)?, parse_time(&payload.end_time)?)?;

    let booking = state
        .scheduler
        .create_booking(payload.subject_id, payload.building_id, payload.kind, date, slot)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Booking successful.",
            "booking_id": booking.booking_id
        })),
    ))
}

pub async fn check_availability(
    State(state): State<AppState>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date(&params.booking_date)?;
    let slot = TimeSlot::new(parse_time(&params.start_time)?, parse_time(&params.end_time)?)?;

    let availability = state
        .scheduler
        .check_availability(params.building_id, params.kind, date, slot)
        .await?;

    Ok(Json(json!(availability)))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(mut filter): Query<BookingFilter>,
) -> Result<Json<Value>, AppError> {
    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;
    let role = Role::from_claims(&claims);

    //subjects only ever see their own bookings
    if let Role::Subject(id) = role {
        filter.subject_id = Some(id);
    }

    let bookings = state.scheduler.list_bookings(filter).await?;
    Ok(Json(json!(bookings)))
}

pub async fn update_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<CreateBookingReq>,
) -> Result<Json<Value>, AppError> {
    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;
    let role = Role::from_claims(&claims);

    if !role.can_modify(payload.subject_id) {
        return Err(AppError::forbidden("cannot move a booking to another user"));
    }

    let date = parse_date(&payload.booking_date)?;
    let slot = TimeSlot::new(parse_time(&payload.start_time)?, parse_time(&payload.end_time)?)?;

    let booking = state
        .scheduler
        .update_booking(
            booking_id,
            payload.subject_id,
            payload.building_id,
            payload.kind,
            date,
            slot,
        )
        .await?;

    Ok(Json(json!(booking)))
}

pub async fn delete_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<StatusCode, AppError> {
    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;
    let role = Role::from_claims(&claims);

    let booking = state
        .store
        .bookings
        .find(booking_id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking not found"))?;
    if !role.can_modify(booking.subject_id) {
        return Err(AppError::forbidden("cannot remove another user's booking"));
    }

    state.scheduler.delete_booking(booking_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
