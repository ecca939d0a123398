use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::AppState;
use crate::route::{
    booking::{check_availability, create_booking, delete_booking, list_bookings, update_booking},
    checkin::{checkout, create_checkin, list_checkins, my_checkins},
    profile::{get_user, update_profile},
    verify::{checkin_status, verify_qr},
};

pub fn create_router(state: AppState) -> Router {
    Router::new()
    //bookings
    .route("/bookings", post(create_booking))                  //book a space for a date and time slot
    .route("/bookings", get(list_bookings))                    //list bookings, filterable
    .route("/bookings/availability", get(check_availability))  //probe a space for a time range
    .route("/bookings/{id}", put(update_booking))              //overwrite a booking
    .route("/bookings/{id}", delete(delete_booking))           //remove a booking permanently
    //checkins
    .route("/checkins", post(create_checkin))                  //check in and receive a qr token
    .route("/checkins", get(list_checkins))                    //admin/officer listing, filterable
    .route("/checkins/me", get(my_checkins))                   //own check-in history
    .route("/checkins/checkout", post(checkout))               //officer checks a holder out
    //qr verification
    .route("/verify-qr", post(verify_qr))                      //officer presents a scanned token
    .route("/verify-qr/status/{id}", get(checkin_status))      //status snapshot for a token
    //subjects
    .route("/users/{id}", get(get_user))                       //subject record, access gated
    .route("/profile", put(update_profile))                    //self-service profile update
    .with_state(state)
}
