pub mod models;
pub mod route;
pub mod routemount;
pub mod service;
pub mod store;
pub mod utils;

use std::sync::Arc;

use crate::service::checkin::CheckInStateMachine;
use crate::service::scheduler::BookingScheduler;
use crate::service::verify::QrTokenVerifier;
use crate::store::Store;
use crate::utils::clock::Clock;

/// Shared handler state, built once at startup by the composition root.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub scheduler: Arc<BookingScheduler>,
    pub checkins: Arc<CheckInStateMachine>,
    pub verifier: Arc<QrTokenVerifier>,
}

impl AppState {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        AppState {
            scheduler: Arc::new(BookingScheduler::new(store.clone(), clock.clone())),
            checkins: Arc::new(CheckInStateMachine::new(store.clone(), clock.clone())),
            verifier: Arc::new(QrTokenVerifier::new(store.clone(), clock)),
            store,
        }
    }
}
