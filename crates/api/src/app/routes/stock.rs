use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use medstock_infra::MovementRequest;
use medstock_inventory::MovementType;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn list_all_stock(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.ledger.list_all_stock().await {
        Ok(items) => Json(dto::items_to_views(items)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(branch): Path<String>,
) -> axum::response::Response {
    match services.ledger.list_stock(&branch).await {
        Ok(items) => Json(dto::items_to_views(items)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn add_initial_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(branch): Path<String>,
    Json(body): Json<dto::CreateStockRequest>,
) -> axum::response::Response {
    match services
        .ledger
        .add_initial_stock(&branch, &body.drug_name, body.current_stock, body.threshold)
        .await
    {
        Ok(item) => (StatusCode::CREATED, Json(dto::StockItemView::from(item))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path((branch, id)): Path<(String, String)>,
) -> axum::response::Response {
    let drug_id = match errors::parse_drug_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.get_item(&branch, drug_id).await {
        Ok(item) => Json(dto::StockItemView::from(item)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn apply_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Path((branch, id)): Path<(String, String)>,
    Json(body): Json<dto::MovementRequestBody>,
) -> axum::response::Response {
    let drug_id = match errors::parse_drug_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let movement_type: MovementType = match body.movement_type.parse() {
        Ok(v) => v,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    let mut request = MovementRequest::new(drug_id, movement_type, body.quantity);
    request.request_id = body.request_id;

    match services.ledger.record_movement(&branch, request).await {
        Ok(receipt) => {
            let status = if receipt.replayed { StatusCode::OK } else { StatusCode::CREATED };
            (status, Json(dto::MovementReceiptView::from(receipt))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_history(
    Extension(services): Extension<Arc<AppServices>>,
    Path((branch, id)): Path<(String, String)>,
) -> axum::response::Response {
    let drug_id = match errors::parse_drug_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.get_history(&branch, drug_id).await {
        Ok(movements) => {
            let views: Vec<dto::MovementView> = movements.into_iter().map(dto::MovementView::from).collect();
            Json(views).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}
