use axum::{Router, routing::get};

pub mod branches;
pub mod stock;
pub mod system;

/// Router for every ledger endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/stock", get(stock::list_all_stock))
        .nest("/branches", branches::router())
}
