use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
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
pub struct Budget {
    pub category: String,
    pub limit_amount: f64,
    pub spent: f64,
    pub period: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBudgetRequest {
    pub category: String,
    pub limit_amount: f64,
    pub period: Option<String>,
}

/// Fraction of the budget consumed, clamped to [0, 1]. A zero limit counts
/// as fully consumed once anything is spent.
pub fn utilization(budget: &Budget) -> f64 {
    if budget.limit_amount <= 0.0 {
        return if budget.spent > 0.0 { 1.0 } else { 0.0 };
    }
    (budget.spent / budget.limit_amount).clamp(0.0, 1.0)
}

pub async fn list_budgets(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<StoredRecord<Budget>>>, StoreError> {
    Ok(Json(state.store.list_records(user.id, collections::BUDGETS)?))
}

pub async fn create_budget(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateBudgetRequest>,
) -> Result<Json<StoredRecord<Budget>>, (StatusCode, String)> {
    if req.limit_amount <= 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Budget limit must be positive".to_string(),
        ));
    }
    let budget = Budget {
        category: req.category,
        limit_amount: req.limit_amount,
        spent: 0.0,
        period: req.period.unwrap_or_else(|| "monthly".to_string()),
    };
    state
        .store
        .add_record(user.id, collections::BUDGETS, &budget)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

pub async fn update_budget(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<Value>,
) -> Result<Json<StoredRecord<Budget>>, StoreError> {
    Ok(Json(state.store.update_record(user.id, collections::BUDGETS, id, &patch)?))
}

pub async fn delete_budget(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StoreError> {
    state.store.delete_document(user.id, collections::BUDGETS, id)?;
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}

pub fn configure_budgets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/budgets", get(list_budgets).post(create_budget))
        .route("/api/budgets/:id", put(update_budget).delete(delete_budget))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(limit: f64, spent: f64) -> Budget {
        Budget {
            category: "Dining".to_string(),
            limit_amount: limit,
            spent,
            period: "monthly".to_string(),
        }
    }

    #[test]
    fn test_utilization_basic() {
        assert_eq!(utilization(&budget(200.0, 50.0)), 0.25);
        assert_eq!(utilization(&budget(200.0, 0.0)), 0.0);
    }

    #[test]
    fn test_utilization_clamps_overspend() {
        assert_eq!(utilization(&budget(100.0, 250.0)), 1.0);
    }

    #[test]
    fn test_utilization_zero_limit() {
        assert_eq!(utilization(&budget(0.0, 10.0)), 1.0);
        assert_eq!(utilization(&budget(0.0, 0.0)), 0.0);
    }
}
