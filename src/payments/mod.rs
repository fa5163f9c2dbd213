use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::shared::state::AppState;
use crate::store::{collections, StoreError, StoredRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub payee: String,
    pub amount: f64,
    pub currency: String,
    pub due_date: DateTime<Utc>,
    pub status: String,
    pub recurring: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub payee: String,
    pub amount: f64,
    pub currency: Option<String>,
    pub due_date: DateTime<Utc>,
    pub recurring: Option<bool>,
}

pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<StoredRecord<Payment>>>, StoreError> {
    let mut payments: Vec<StoredRecord<Payment>> =
        state.store.list_records(user.id, collections::PAYMENTS)?;
    payments.sort_by(|a, b| a.record.due_date.cmp(&b.record.due_date));
    Ok(Json(payments))
}

pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<StoredRecord<Payment>>, (StatusCode, String)> {
    if req.payee.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Payee is required".to_string()));
    }
    let payment = Payment {
        payee: req.payee.trim().to_string(),
        amount: req.amount,
        currency: req.currency.unwrap_or_else(|| "USD".to_string()),
        due_date: req.due_date,
        status: "Scheduled".to_string(),
        recurring: req.recurring.unwrap_or(false),
    };
    state
        .store
        .add_record(user.id, collections::PAYMENTS, &payment)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

pub async fn update_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<Value>,
) -> Result<Json<StoredRecord<Payment>>, StoreError> {
    Ok(Json(state.store.update_record(user.id, collections::PAYMENTS, id, &patch)?))
}

pub async fn mark_paid(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredRecord<Payment>>, StoreError> {
    Ok(Json(state.store.update_record(
        user.id,
        collections::PAYMENTS,
        id,
        &serde_json::json!({ "status": "Paid" }),
    )?))
}

pub fn configure_payments_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/payments", get(list_payments).post(create_payment))
        .route("/api/payments/:id", put(update_payment))
        .route("/api/payments/:id/paid", post(mark_paid))
}
