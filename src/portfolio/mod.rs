use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::shared::state::AppState;
use crate::store::{collections, StoreError, StoredRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioItem {
    pub symbol: String,
    pub name: String,
    pub shares: f64,
    pub avg_cost: f64,
    pub last_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub symbol: String,
    pub name: String,
    pub last_price: f64,
    pub change_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketNewsItem {
    pub headline: String,
    pub source: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PortfolioSummary {
    pub market_value: f64,
    pub cost_basis: f64,
    pub gain: f64,
    pub gain_pct: f64,
}

pub fn summarize(items: &[StoredRecord<PortfolioItem>]) -> PortfolioSummary {
    let market_value: f64 = items.iter().map(|i| i.record.shares * i.record.last_price).sum();
    let cost_basis: f64 = items.iter().map(|i| i.record.shares * i.record.avg_cost).sum();
    let gain = market_value - cost_basis;
    let gain_pct = if cost_basis > 0.0 {
        gain / cost_basis * 100.0
    } else {
        0.0
    };
    PortfolioSummary {
        market_value,
        cost_basis,
        gain,
        gain_pct,
    }
}

pub async fn list_holdings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<StoredRecord<PortfolioItem>>>, StoreError> {
    Ok(Json(state.store.list_records(user.id, collections::PORTFOLIO)?))
}

pub async fn create_holding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(item): Json<PortfolioItem>,
) -> Result<Json<StoredRecord<PortfolioItem>>, (StatusCode, String)> {
    if item.symbol.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Symbol is required".to_string()));
    }
    state
        .store
        .add_record(user.id, collections::PORTFOLIO, &item)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

pub async fn portfolio_summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<PortfolioSummary>, StoreError> {
    let items: Vec<StoredRecord<PortfolioItem>> =
        state.store.list_records(user.id, collections::PORTFOLIO)?;
    Ok(Json(summarize(&items)))
}

pub async fn list_watchlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<StoredRecord<WatchlistItem>>>, StoreError> {
    Ok(Json(state.store.list_records(user.id, collections::WATCHLIST)?))
}

pub async fn add_watchlist_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(item): Json<WatchlistItem>,
) -> Result<Json<StoredRecord<WatchlistItem>>, StoreError> {
    Ok(Json(state.store.add_record(user.id, collections::WATCHLIST, &item)?))
}

pub async fn list_market_news(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<StoredRecord<MarketNewsItem>>>, StoreError> {
    let mut news: Vec<StoredRecord<MarketNewsItem>> =
        state.store.list_records(user.id, collections::MARKET_NEWS)?;
    news.sort_by(|a, b| b.record.published_at.cmp(&a.record.published_at));
    Ok(Json(news))
}

pub fn configure_portfolio_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/portfolio", get(list_holdings).post(create_holding))
        .route("/api/portfolio/summary", get(portfolio_summary))
        .route("/api/watchlist", get(list_watchlist).post(add_watchlist_item))
        .route("/api/market-news", get(list_market_news))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn holding(shares: f64, avg_cost: f64, last_price: f64) -> StoredRecord<PortfolioItem> {
        StoredRecord {
            id: Uuid::new_v4(),
            record: PortfolioItem {
                symbol: "VTI".to_string(),
                name: "Total Market".to_string(),
                shares,
                avg_cost,
                last_price,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_summarize_gain() {
        let summary = summarize(&[holding(10.0, 100.0, 110.0), holding(5.0, 40.0, 30.0)]);
        assert_eq!(summary.cost_basis, 1200.0);
        assert_eq!(summary.market_value, 1250.0);
        assert_eq!(summary.gain, 50.0);
        assert!((summary.gain_pct - 4.1666).abs() < 0.001);
    }

    #[test]
    fn test_summarize_empty_portfolio() {
        let summary = summarize(&[]);
        assert_eq!(summary.market_value, 0.0);
        assert_eq!(summary.gain_pct, 0.0);
    }
}
