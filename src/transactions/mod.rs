use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
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
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Debit,
    Credit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Uuid>,
    pub description: String,
    pub amount: f64,
    pub currency: String,
    pub category: String,
    pub transaction_type: TransactionType,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub account_id: Option<Uuid>,
    pub description: String,
    pub amount: f64,
    pub currency: Option<String>,
    pub category: String,
    pub transaction_type: TransactionType,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub category: Option<String>,
}

/// One line per transaction, the shape the spending-insights flow consumes.
pub fn format_for_insights(transactions: &[StoredRecord<Transaction>]) -> String {
    transactions
        .iter()
        .map(|t| {
            format!(
                "{},{},{},{}{:.2} {}",
                t.record.occurred_at.format("%Y-%m-%d"),
                t.record.description,
                t.record.category,
                match t.record.transaction_type {
                    TransactionType::Debit => "-",
                    TransactionType::Credit => "+",
                },
                t.record.amount,
                t.record.currency
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<StoredRecord<Transaction>>>, StoreError> {
    let mut transactions: Vec<StoredRecord<Transaction>> =
        state.store.list_records(user.id, collections::TRANSACTIONS)?;
    if let Some(category) = query.category {
        transactions.retain(|t| t.record.category == category);
    }
    // Newest first for the ledger view.
    transactions.sort_by(|a, b| b.record.occurred_at.cmp(&a.record.occurred_at));
    Ok(Json(transactions))
}

pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<Json<StoredRecord<Transaction>>, (StatusCode, String)> {
    if req.description.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Description is required".to_string()));
    }
    let transaction = Transaction {
        account_id: req.account_id,
        description: req.description.trim().to_string(),
        amount: req.amount,
        currency: req.currency.unwrap_or_else(|| "USD".to_string()),
        category: req.category,
        transaction_type: req.transaction_type,
        occurred_at: req.occurred_at.unwrap_or_else(Utc::now),
    };
    state
        .store
        .add_record(user.id, collections::TRANSACTIONS, &transaction)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

pub fn configure_transactions_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/transactions",
        get(list_transactions).post(create_transaction),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(desc: &str, category: &str, amount: f64, kind: TransactionType) -> StoredRecord<Transaction> {
        StoredRecord {
            id: Uuid::new_v4(),
            record: Transaction {
                account_id: None,
                description: desc.to_string(),
                amount,
                currency: "USD".to_string(),
                category: category.to_string(),
                transaction_type: kind,
                occurred_at: "2026-07-14T12:00:00Z".parse().unwrap(),
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_format_for_insights_lines() {
        let rows = vec![
            tx("Groceries", "Food", 54.2, TransactionType::Debit),
            tx("Salary", "Income", 4000.0, TransactionType::Credit),
        ];
        let text = format_for_insights(&rows);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "2026-07-14,Groceries,Food,-54.20 USD");
        assert_eq!(lines[1], "2026-07-14,Salary,Income,+4000.00 USD");
    }

    #[test]
    fn test_format_for_insights_empty() {
        assert_eq!(format_for_insights(&[]), "");
    }
}
