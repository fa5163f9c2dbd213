//! Static SPA serving. Unknown paths fall through to index.html so the
//! client router owns /dashboard, /support/:id and friends.

use axum::Router;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};

use crate::shared::state::AppState;

pub fn configure_static_routes(site_path: &str) -> Router<Arc<AppState>> {
    let index = ServeFile::new(format!("{}/index.html", site_path));
    Router::new().fallback_service(ServeDir::new(site_path).not_found_service(index))
}
