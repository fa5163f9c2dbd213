use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
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
pub struct CardData {
    pub holder: String,
    pub number_last4: String,
    pub expiry: String,
    pub card_type: String,
    pub frozen: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    pub holder: String,
    pub number_last4: String,
    pub expiry: String,
    pub card_type: String,
}

pub async fn list_cards(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<StoredRecord<CardData>>>, StoreError> {
    Ok(Json(state.store.list_records(user.id, collections::CARDS)?))
}

pub async fn create_card(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateCardRequest>,
) -> Result<Json<StoredRecord<CardData>>, (StatusCode, String)> {
    if req.number_last4.len() != 4 || !req.number_last4.chars().all(|c| c.is_ascii_digit()) {
        return Err((
            StatusCode::BAD_REQUEST,
            "number_last4 must be exactly four digits".to_string(),
        ));
    }
    let card = CardData {
        holder: req.holder,
        number_last4: req.number_last4,
        expiry: req.expiry,
        card_type: req.card_type,
        frozen: false,
    };
    state
        .store
        .add_record(user.id, collections::CARDS, &card)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

pub async fn update_card(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<Value>,
) -> Result<Json<StoredRecord<CardData>>, StoreError> {
    Ok(Json(state.store.update_record(user.id, collections::CARDS, id, &patch)?))
}

/// Flip the freeze flag.
pub async fn toggle_freeze(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredRecord<CardData>>, StoreError> {
    let card: StoredRecord<CardData> = state.store.get_record(user.id, collections::CARDS, id)?;
    Ok(Json(state.store.update_record(
        user.id,
        collections::CARDS,
        id,
        &serde_json::json!({ "frozen": !card.record.frozen }),
    )?))
}

pub fn configure_cards_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/cards", get(list_cards).post(create_card))
        .route("/api/cards/:id", axum::routing::put(update_card))
        .route("/api/cards/:id/freeze", post(toggle_freeze))
}
