use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::shared::state::AppState;
use crate::store::{collections, StoreError, StoredRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub account_type: String,
    pub balance: f64,
    pub currency: String,
    pub institution: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    pub account_type: String,
    pub balance: Option<f64>,
    pub currency: Option<String>,
    pub institution: String,
}

pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<StoredRecord<Account>>>, StoreError> {
    Ok(Json(state.store.list_records(user.id, collections::ACCOUNTS)?))
}

pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<StoredRecord<Account>>, (StatusCode, String)> {
    if req.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Account name is required".to_string()));
    }
    let account = Account {
        name: req.name.trim().to_string(),
        account_type: req.account_type,
        balance: req.balance.unwrap_or(0.0),
        currency: req.currency.unwrap_or_else(|| "USD".to_string()),
        institution: req.institution,
    };
    state
        .store
        .add_record(user.id, collections::ACCOUNTS, &account)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredRecord<Account>>, StoreError> {
    Ok(Json(state.store.get_record(user.id, collections::ACCOUNTS, id)?))
}

pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<Value>,
) -> Result<Json<StoredRecord<Account>>, StoreError> {
    Ok(Json(state.store.update_record(
        user.id,
        collections::ACCOUNTS,
        id,
        &patch,
    )?))
}

pub fn configure_accounts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/accounts", get(list_accounts).post(create_account))
        .route("/api/accounts/:id", get(get_account).put(update_account))
}
