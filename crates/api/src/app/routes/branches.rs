use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    response::IntoResponse,
    routing::{get, post},
};

use crate::app::dto::BranchView;
use crate::app::routes::stock;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_branches))
        .route("/:branch/stock", get(stock::list_stock).post(stock::add_initial_stock))
        .route("/:branch/stock/:id", get(stock::get_item))
        .route("/:branch/stock/:id/movements", post(stock::apply_movement))
        .route("/:branch/stock/:id/history", get(stock::get_history))
}

pub async fn list_branches(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    let branches: Vec<BranchView> = services
        .ledger
        .list_branches()
        .into_iter()
        .map(BranchView::from)
        .collect();
    Json(branches)
}
