//! Sample dataset for first-time users.
//!
//! A fresh account opens onto a populated dashboard rather than a wall of
//! empty states. Everything here goes through the same store path the live
//! handlers use, so the shapes are checked against the domain types in tests.

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::store::{collections, Store, StoreError};
use crate::tickets::{Sender, Ticket, TicketMessage, TicketStatus, AGENT_NAME};

pub fn sample_documents() -> Vec<(&'static str, Value)> {
    let now = Utc::now();
    let day = |n: i64| now - Duration::days(n);

    vec![
        (
            collections::ACCOUNTS,
            json!({"name": "Everyday Checking", "account_type": "checking", "balance": 4821.63, "currency": "USD", "institution": "First Meridian Bank"}),
        ),
        (
            collections::ACCOUNTS,
            json!({"name": "Rainy Day Savings", "account_type": "savings", "balance": 12750.00, "currency": "USD", "institution": "First Meridian Bank"}),
        ),
        (
            collections::ACCOUNTS,
            json!({"name": "Travel Fund", "account_type": "savings", "balance": 1980.25, "currency": "USD", "institution": "Northgate Credit Union"}),
        ),
        (
            collections::CARDS,
            json!({"holder": "Sample User", "number_last4": "4821", "expiry": "09/28", "card_type": "Visa", "frozen": false}),
        ),
        (
            collections::CARDS,
            json!({"holder": "Sample User", "number_last4": "7310", "expiry": "02/27", "card_type": "Mastercard", "frozen": true}),
        ),
        (
            collections::TRANSACTIONS,
            json!({"description": "Monthly salary", "amount": 4200.00, "currency": "USD", "category": "Income", "transaction_type": "credit", "occurred_at": day(20)}),
        ),
        (
            collections::TRANSACTIONS,
            json!({"description": "Rent", "amount": 1450.00, "currency": "USD", "category": "Housing", "transaction_type": "debit", "occurred_at": day(18)}),
        ),
        (
            collections::TRANSACTIONS,
            json!({"description": "Grocery run", "amount": 136.42, "currency": "USD", "category": "Food", "transaction_type": "debit", "occurred_at": day(12)}),
        ),
        (
            collections::TRANSACTIONS,
            json!({"description": "Streaming subscription", "amount": 15.99, "currency": "USD", "category": "Entertainment", "transaction_type": "debit", "occurred_at": day(9)}),
        ),
        (
            collections::TRANSACTIONS,
            json!({"description": "Dinner out", "amount": 64.80, "currency": "USD", "category": "Food", "transaction_type": "debit", "occurred_at": day(5)}),
        ),
        (
            collections::TRANSACTIONS,
            json!({"description": "Gas", "amount": 48.10, "currency": "USD", "category": "Transport", "transaction_type": "debit", "occurred_at": day(2)}),
        ),
        (
            collections::PAYMENTS,
            json!({"payee": "City Utilities", "amount": 112.40, "currency": "USD", "due_date": now + Duration::days(6), "status": "Scheduled", "recurring": true}),
        ),
        (
            collections::PAYMENTS,
            json!({"payee": "Apex Internet", "amount": 59.99, "currency": "USD", "due_date": now + Duration::days(11), "status": "Scheduled", "recurring": true}),
        ),
        (
            collections::BUDGETS,
            json!({"category": "Food", "limit_amount": 500.0, "spent": 201.22, "period": "monthly"}),
        ),
        (
            collections::BUDGETS,
            json!({"category": "Entertainment", "limit_amount": 120.0, "spent": 15.99, "period": "monthly"}),
        ),
        (
            collections::BUDGETS,
            json!({"category": "Transport", "limit_amount": 200.0, "spent": 48.10, "period": "monthly"}),
        ),
        (
            collections::INVOICES,
            json!({"number": "INV-00001", "client_name": "Orchard Design Co.", "client_email": "billing@orcharddesign.example", "items": [{"description": "Consulting", "quantity": 8.0, "unit_price": 95.0}], "total": 760.0, "status": "Sent", "issued_at": day(14), "due_date": now + Duration::days(16)}),
        ),
        (
            collections::PORTFOLIO,
            json!({"symbol": "VTI", "name": "Vanguard Total Stock Market", "shares": 12.0, "avg_cost": 218.40, "last_price": 241.10}),
        ),
        (
            collections::PORTFOLIO,
            json!({"symbol": "BND", "name": "Vanguard Total Bond Market", "shares": 20.0, "avg_cost": 72.15, "last_price": 71.60}),
        ),
        (
            collections::WATCHLIST,
            json!({"symbol": "AAPL", "name": "Apple Inc.", "last_price": 232.55, "change_pct": 0.8}),
        ),
        (
            collections::WATCHLIST,
            json!({"symbol": "MSFT", "name": "Microsoft Corp.", "last_price": 471.12, "change_pct": -0.3}),
        ),
        (
            collections::MARKET_NEWS,
            json!({"headline": "Markets steady as rate decision looms", "source": "Wire Desk", "url": "https://news.example/markets-steady", "published_at": day(1)}),
        ),
        (
            collections::MARKET_NEWS,
            json!({"headline": "Savings rates tick up at regional banks", "source": "Wire Desk", "url": "https://news.example/savings-rates", "published_at": day(3)}),
        ),
    ]
}

pub fn seed_user_data(store: &Store, user_id: Uuid) -> Result<(), StoreError> {
    for (collection, data) in sample_documents() {
        store.add_document(user_id, collection, data)?;
    }

    // A welcome ticket so the support view is not empty either.
    let ticket = store.add_record(
        user_id,
        collections::TICKETS,
        &Ticket {
            subject: "Welcome to your dashboard".to_string(),
            department: "General".to_string(),
            priority: "Low".to_string(),
            status: TicketStatus::Open,
        },
    )?;
    store.add_record(
        user_id,
        collections::TICKET_MESSAGES,
        &TicketMessage {
            ticket_id: ticket.id,
            content: "Hi! I'm here if you have any questions about your accounts, budgets or cards."
                .to_string(),
            sender: Sender::Agent,
            agent_name: Some(AGENT_NAME.to_string()),
        },
    )?;

    info!("Seeded sample dataset for user {}", user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Account;
    use crate::budgets::Budget;
    use crate::cards::CardData;
    use crate::invoicing::Invoice;
    use crate::payments::Payment;
    use crate::portfolio::{MarketNewsItem, PortfolioItem, WatchlistItem};
    use crate::transactions::Transaction;

    fn assert_all_parse<T: serde::de::DeserializeOwned>(collection: &str) -> usize {
        let docs: Vec<Value> = sample_documents()
            .into_iter()
            .filter(|(c, _)| *c == collection)
            .map(|(_, v)| v)
            .collect();
        for doc in &docs {
            serde_json::from_value::<T>(doc.clone())
                .unwrap_or_else(|e| panic!("bad seed in {}: {}", collection, e));
        }
        docs.len()
    }

    #[test]
    fn test_seed_documents_match_domain_types() {
        assert_eq!(assert_all_parse::<Account>(collections::ACCOUNTS), 3);
        assert_eq!(assert_all_parse::<CardData>(collections::CARDS), 2);
        assert_eq!(assert_all_parse::<Transaction>(collections::TRANSACTIONS), 6);
        assert_eq!(assert_all_parse::<Payment>(collections::PAYMENTS), 2);
        assert_eq!(assert_all_parse::<Budget>(collections::BUDGETS), 3);
        assert_eq!(assert_all_parse::<Invoice>(collections::INVOICES), 1);
        assert_eq!(assert_all_parse::<PortfolioItem>(collections::PORTFOLIO), 2);
        assert_eq!(assert_all_parse::<WatchlistItem>(collections::WATCHLIST), 2);
        assert_eq!(assert_all_parse::<MarketNewsItem>(collections::MARKET_NEWS), 2);
    }

    #[test]
    fn test_seed_covers_every_dashboard_collection() {
        let seeded: std::collections::HashSet<&str> =
            sample_documents().into_iter().map(|(c, _)| c).collect();
        for expected in [
            collections::ACCOUNTS,
            collections::CARDS,
            collections::TRANSACTIONS,
            collections::PAYMENTS,
            collections::BUDGETS,
            collections::INVOICES,
            collections::PORTFOLIO,
            collections::WATCHLIST,
            collections::MARKET_NEWS,
        ] {
            assert!(seeded.contains(expected), "missing seed for {}", expected);
        }
    }
}
