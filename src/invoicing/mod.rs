use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::shared::state::AppState;
use crate::store::{collections, StoreError, StoredRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub number: String,
    pub client_name: String,
    pub client_email: String,
    pub items: Vec<InvoiceLineItem>,
    pub total: f64,
    pub status: InvoiceStatus,
    pub issued_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub client_name: String,
    pub client_email: String,
    pub items: Vec<InvoiceLineItem>,
    pub due_date: DateTime<Utc>,
}

pub fn invoice_total(items: &[InvoiceLineItem]) -> f64 {
    items.iter().map(|i| i.quantity * i.unit_price).sum()
}

fn next_invoice_number(existing: usize) -> String {
    format!("INV-{:05}", existing + 1)
}

pub async fn list_invoices(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<StoredRecord<Invoice>>>, StoreError> {
    let mut invoices: Vec<StoredRecord<Invoice>> =
        state.store.list_records(user.id, collections::INVOICES)?;
    invoices.reverse();
    Ok(Json(invoices))
}

pub async fn create_invoice(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<Json<StoredRecord<Invoice>>, (StatusCode, String)> {
    if req.items.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "An invoice needs at least one line item".to_string(),
        ));
    }
    let existing = state
        .store
        .list_documents(user.id, collections::INVOICES)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .len();

    let invoice = Invoice {
        number: next_invoice_number(existing),
        client_name: req.client_name,
        client_email: req.client_email,
        total: invoice_total(&req.items),
        items: req.items,
        status: InvoiceStatus::Draft,
        issued_at: Utc::now(),
        due_date: req.due_date,
    };
    state
        .store
        .add_record(user.id, collections::INVOICES, &invoice)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

pub async fn get_invoice(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredRecord<Invoice>>, StoreError> {
    Ok(Json(state.store.get_record(user.id, collections::INVOICES, id)?))
}

async fn set_status(
    state: &AppState,
    user: Uuid,
    id: Uuid,
    status: InvoiceStatus,
) -> Result<StoredRecord<Invoice>, StoreError> {
    state.store.update_record(
        user,
        collections::INVOICES,
        id,
        &serde_json::json!({ "status": status }),
    )
}

pub async fn send_invoice(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredRecord<Invoice>>, StoreError> {
    Ok(Json(set_status(&state, user.id, id, InvoiceStatus::Sent).await?))
}

pub async fn mark_invoice_paid(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredRecord<Invoice>>, StoreError> {
    Ok(Json(set_status(&state, user.id, id, InvoiceStatus::Paid).await?))
}

pub fn configure_invoicing_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/invoices", get(list_invoices).post(create_invoice))
        .route("/api/invoices/:id", get(get_invoice))
        .route("/api/invoices/:id/send", post(send_invoice))
        .route("/api/invoices/:id/paid", post(mark_invoice_paid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_total_sums_line_items() {
        let items = vec![
            InvoiceLineItem {
                description: "Consulting".to_string(),
                quantity: 10.0,
                unit_price: 120.0,
            },
            InvoiceLineItem {
                description: "Travel".to_string(),
                quantity: 1.0,
                unit_price: 250.5,
            },
        ];
        assert_eq!(invoice_total(&items), 1450.5);
        assert_eq!(invoice_total(&[]), 0.0);
    }

    #[test]
    fn test_invoice_numbers_are_sequential() {
        assert_eq!(next_invoice_number(0), "INV-00001");
        assert_eq!(next_invoice_number(41), "INV-00042");
    }
}
