pub mod accounts;
pub mod api_router;
pub mod auth;
pub mod budgets;
pub mod cards;
pub mod config;
pub mod flows;
pub mod invoicing;
pub mod payments;
pub mod portfolio;
pub mod reports;
pub mod seed;
pub mod shared;
pub mod store;
pub mod tickets;
pub mod transactions;
pub mod web_server;
