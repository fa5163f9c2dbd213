use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::accounts::Account;
use crate::auth::CurrentUser;
use crate::flows;
use crate::shared::state::AppState;
use crate::store::{collections, StoreError, StoredRecord};
use crate::transactions::{format_for_insights, Transaction, TransactionType};

#[derive(Debug, Clone, Serialize)]
pub struct CategorySpend {
    pub category: String,
    pub total: f64,
}

#[derive(Debug, Serialize)]
pub struct SpendingSummary {
    pub total_balance: f64,
    pub total_spend: f64,
    pub by_category: Vec<CategorySpend>,
}

/// Debit totals per category, largest first.
pub fn spend_by_category(transactions: &[StoredRecord<Transaction>]) -> Vec<CategorySpend> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for t in transactions {
        if t.record.transaction_type == TransactionType::Debit {
            *totals.entry(t.record.category.as_str()).or_insert(0.0) += t.record.amount;
        }
    }
    let mut spend: Vec<CategorySpend> = totals
        .into_iter()
        .map(|(category, total)| CategorySpend {
            category: category.to_string(),
            total,
        })
        .collect();
    spend.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal));
    spend
}

pub async fn spending_summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<SpendingSummary>, StoreError> {
    let accounts: Vec<StoredRecord<Account>> =
        state.store.list_records(user.id, collections::ACCOUNTS)?;
    let transactions: Vec<StoredRecord<Transaction>> =
        state.store.list_records(user.id, collections::TRANSACTIONS)?;

    let by_category = spend_by_category(&transactions);
    Ok(Json(SpendingSummary {
        total_balance: accounts.iter().map(|a| a.record.balance).sum(),
        total_spend: by_category.iter().map(|c| c.total).sum(),
        by_category,
    }))
}

pub async fn spending_insights(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<flows::SpendingInsightsOutput>, (StatusCode, String)> {
    let transactions: Vec<StoredRecord<Transaction>> = state
        .store
        .list_records(user.id, collections::TRANSACTIONS)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    flows::spending_insights(state.llm.as_ref(), &format_for_insights(&transactions))
        .await
        .map(Json)
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))
}

pub async fn financial_advice(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<CurrentUser>,
    Json(input): Json<flows::FinancialAdviceInput>,
) -> Result<Json<flows::FinancialAdviceOutput>, (StatusCode, String)> {
    flows::financial_advice(state.llm.as_ref(), &input)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))
}

pub fn configure_reports_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/reports/summary", get(spending_summary))
        .route("/api/reports/insights", post(spending_insights))
        .route("/api/advisor", post(financial_advice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn tx(category: &str, amount: f64, kind: TransactionType) -> StoredRecord<Transaction> {
        StoredRecord {
            id: Uuid::new_v4(),
            record: Transaction {
                account_id: None,
                description: category.to_string(),
                amount,
                currency: "USD".to_string(),
                category: category.to_string(),
                transaction_type: kind,
                occurred_at: Utc::now(),
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_spend_by_category_sums_debits_only() {
        let rows = vec![
            tx("Food", 40.0, TransactionType::Debit),
            tx("Food", 10.0, TransactionType::Debit),
            tx("Rent", 1200.0, TransactionType::Debit),
            tx("Income", 4000.0, TransactionType::Credit),
        ];
        let spend = spend_by_category(&rows);
        assert_eq!(spend.len(), 2);
        assert_eq!(spend[0].category, "Rent");
        assert_eq!(spend[0].total, 1200.0);
        assert_eq!(spend[1].category, "Food");
        assert_eq!(spend[1].total, 50.0);
    }

    #[test]
    fn test_spend_by_category_empty() {
        assert!(spend_by_category(&[]).is_empty());
    }
}
