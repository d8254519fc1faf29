// Route modules
pub mod tickets;

use crate::app_state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/tickets/purchase", post(tickets::purchase_ticket))
        .route("/tickets/verify/{code}", get(tickets::verify_ticket))
        .route(
            "/tickets/reprovision/{code}",
            post(tickets::reprovision_ticket),
        )
}
