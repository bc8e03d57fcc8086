pub mod dto;
pub mod handlers;
pub mod parser;
pub mod services;
pub mod vision;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::health_routes())
        .merge(handlers::analyze_routes())
}
