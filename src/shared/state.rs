use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::flows::LlmProvider;
use crate::shared::utils::DbPool;
use crate::store::Store;

pub struct AppState {
    pub config: AppConfig,
    pub conn: DbPool,
    pub store: Store,
    pub llm: Arc<dyn LlmProvider>,
    // At most one scheduled agent reply per ticket; the handle is aborted
    // when the ticket closes or a newer send supersedes it.
    pub pending_replies: Arc<tokio::sync::Mutex<HashMap<Uuid, JoinHandle<()>>>>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            conn: self.conn.clone(),
            store: self.store.clone(),
            llm: Arc::clone(&self.llm),
            pending_replies: Arc::clone(&self.pending_replies),
        }
    }
}
