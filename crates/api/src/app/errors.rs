use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use medstock_core::{DrugId, LedgerError};

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let status = match &err {
        LedgerError::UnknownBranch(_) | LedgerError::DrugNotFound { .. } => StatusCode::NOT_FOUND,
        LedgerError::InvalidQuantity(_)
        | LedgerError::InvalidDrugName(_)
        | LedgerError::InvalidMovementType(_)
        | LedgerError::InvalidId(_) => StatusCode::BAD_REQUEST,
        LedgerError::InsufficientStock { .. } | LedgerError::IdempotencyConflict(_) => StatusCode::CONFLICT,
        LedgerError::TransactionFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
    };

    if status.is_server_error() {
        tracing::warn!(error = %err, "ledger operation failed");
    }
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_drug_id(raw: &str) -> Result<DrugId, axum::response::Response> {
    raw.parse::<DrugId>().map_err(ledger_error_to_response)
}
