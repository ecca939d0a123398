use std::sync::Arc;

use workplace_access_api::AppState;
use workplace_access_api::routemount::route::create_router;
use workplace_access_api::store::Store;
use workplace_access_api::utils::clock::SystemClock;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let server_address = std::env::var("SERVER_ADDRESS").unwrap_or("127.0.0.1:7870".to_string());

    //connect to the store
    let store = match std::env::var("DATABASE_URL") {
        Ok(url) => Store::postgres(&url).await.expect("database not connected"),
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, falling back to the in-memory store");
            Store::memory()
        }
    };

    let state = AppState::new(store, Arc::new(SystemClock));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&server_address)
        .await
        .expect("could not bind server address");
    tracing::info!("server running on {server_address}");
    axum::serve(listener, app).await.expect("server exited");
}
