//! Per-user document store.
//!
//! Every user-owned record lives in the `documents` table, partitioned by
//! collection name under the owning user id. Domain modules deserialize the
//! JSONB payload into their own types via the typed helpers.

use axum::{response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::shared::schema::documents;
use crate::shared::utils::DbPool;

pub mod collections {
    pub const ACCOUNTS: &str = "accounts";
    pub const CARDS: &str = "cards";
    pub const TRANSACTIONS: &str = "transactions";
    pub const PAYMENTS: &str = "payments";
    pub const BUDGETS: &str = "budgets";
    pub const INVOICES: &str = "invoices";
    pub const PORTFOLIO: &str = "portfolio";
    pub const WATCHLIST: &str = "watchlist";
    pub const MARKET_NEWS: &str = "market_news";
    pub const TICKETS: &str = "tickets";
    pub const TICKET_MESSAGES: &str = "ticket_messages";
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl IntoResponse for StoreError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Database(msg) | Self::Connection(msg) | Self::Serialization(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => Self::NotFound("Document not found".to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = documents)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub collection: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A document deserialized into its domain type, with the store-managed
/// fields flattened alongside it on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord<T> {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: T,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn into_record<T: DeserializeOwned>(self) -> Result<StoredRecord<T>, StoreError> {
        let record =
            serde_json::from_value(self.data).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredRecord {
            id: self.id,
            record,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Shallow merge of `patch` into `base`: every top-level key in the patch
/// overwrites the stored value, nulls included. Non-object patches replace
/// the document wholesale.
pub fn merge_patch(base: &mut Value, patch: &Value) {
    match (base.as_object_mut(), patch.as_object()) {
        (Some(target), Some(fields)) => {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        _ => *base = patch.clone(),
    }
}

#[derive(Clone)]
pub struct Store {
    conn: DbPool,
}

impl Store {
    pub fn new(conn: DbPool) -> Self {
        Self { conn }
    }

    fn get_conn(
        &self,
    ) -> Result<PooledConnection<ConnectionManager<PgConnection>>, StoreError> {
        self.conn
            .get()
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    pub fn list_documents(
        &self,
        owner: Uuid,
        collection_name: &str,
    ) -> Result<Vec<Document>, StoreError> {
        let mut conn = self.get_conn()?;
        let docs = documents::table
            .filter(documents::user_id.eq(owner))
            .filter(documents::collection.eq(collection_name))
            .order(documents::created_at.asc())
            .load::<Document>(&mut conn)?;
        Ok(docs)
    }

    pub fn get_document(
        &self,
        owner: Uuid,
        collection_name: &str,
        id: Uuid,
    ) -> Result<Document, StoreError> {
        let mut conn = self.get_conn()?;
        let doc = documents::table
            .filter(documents::user_id.eq(owner))
            .filter(documents::collection.eq(collection_name))
            .filter(documents::id.eq(id))
            .first::<Document>(&mut conn)
            .map_err(|_| {
                StoreError::NotFound(format!("No document {} in {}", id, collection_name))
            })?;
        Ok(doc)
    }

    pub fn add_document(
        &self,
        owner: Uuid,
        collection_name: &str,
        data: Value,
    ) -> Result<Document, StoreError> {
        let mut conn = self.get_conn()?;
        let now = Utc::now();
        let doc = Document {
            id: Uuid::new_v4(),
            user_id: owner,
            collection: collection_name.to_string(),
            data,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(documents::table)
            .values(&doc)
            .execute(&mut conn)?;
        Ok(doc)
    }

    pub fn update_document(
        &self,
        owner: Uuid,
        collection_name: &str,
        id: Uuid,
        patch: &Value,
    ) -> Result<Document, StoreError> {
        let mut doc = self.get_document(owner, collection_name, id)?;
        merge_patch(&mut doc.data, patch);
        doc.updated_at = Utc::now();

        let mut conn = self.get_conn()?;
        diesel::update(
            documents::table
                .filter(documents::user_id.eq(owner))
                .filter(documents::id.eq(id)),
        )
        .set((
            documents::data.eq(&doc.data),
            documents::updated_at.eq(doc.updated_at),
        ))
        .execute(&mut conn)?;
        Ok(doc)
    }

    pub fn delete_document(
        &self,
        owner: Uuid,
        collection_name: &str,
        id: Uuid,
    ) -> Result<(), StoreError> {
        let mut conn = self.get_conn()?;
        let deleted = diesel::delete(
            documents::table
                .filter(documents::user_id.eq(owner))
                .filter(documents::collection.eq(collection_name))
                .filter(documents::id.eq(id)),
        )
        .execute(&mut conn)?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!(
                "No document {} in {}",
                id, collection_name
            )));
        }
        Ok(())
    }

    // ===== Typed helpers =====

    pub fn list_records<T: DeserializeOwned>(
        &self,
        owner: Uuid,
        collection_name: &str,
    ) -> Result<Vec<StoredRecord<T>>, StoreError> {
        self.list_documents(owner, collection_name)?
            .into_iter()
            .map(Document::into_record)
            .collect()
    }

    pub fn get_record<T: DeserializeOwned>(
        &self,
        owner: Uuid,
        collection_name: &str,
        id: Uuid,
    ) -> Result<StoredRecord<T>, StoreError> {
        self.get_document(owner, collection_name, id)?.into_record()
    }

    pub fn add_record<T: Serialize + DeserializeOwned>(
        &self,
        owner: Uuid,
        collection_name: &str,
        record: &T,
    ) -> Result<StoredRecord<T>, StoreError> {
        let data =
            serde_json::to_value(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.add_document(owner, collection_name, data)?.into_record()
    }

    pub fn update_record<T: DeserializeOwned>(
        &self,
        owner: Uuid,
        collection_name: &str,
        id: Uuid,
        patch: &Value,
    ) -> Result<StoredRecord<T>, StoreError> {
        self.update_document(owner, collection_name, id, patch)?
            .into_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_patch_overwrites_top_level_keys() {
        let mut base = json!({"name": "Checking", "balance": 120.0, "currency": "USD"});
        merge_patch(&mut base, &json!({"balance": 80.5}));
        assert_eq!(base["balance"], json!(80.5));
        assert_eq!(base["name"], json!("Checking"));
        assert_eq!(base["currency"], json!("USD"));
    }

    #[test]
    fn test_merge_patch_adds_new_keys_and_keeps_nulls() {
        let mut base = json!({"status": "Open"});
        merge_patch(&mut base, &json!({"status": "Closed", "closed_reason": null}));
        assert_eq!(base["status"], json!("Closed"));
        assert!(base.get("closed_reason").is_some_and(Value::is_null));
    }

    #[test]
    fn test_merge_patch_replaces_non_object_documents() {
        let mut base = json!("scalar");
        merge_patch(&mut base, &json!({"a": 1}));
        assert_eq!(base, json!({"a": 1}));
    }

    #[test]
    fn test_into_record_flattens_payload() {
        #[derive(serde::Deserialize, serde::Serialize)]
        struct Item {
            symbol: String,
        }
        let doc = Document {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            collection: collections::WATCHLIST.to_string(),
            data: json!({"symbol": "VTI"}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let rec = doc.clone().into_record::<Item>().unwrap();
        assert_eq!(rec.record.symbol, "VTI");
        let wire = serde_json::to_value(&rec).unwrap();
        assert_eq!(wire["symbol"], json!("VTI"));
        assert_eq!(wire["id"], json!(doc.id));
    }

    #[test]
    fn test_into_record_rejects_mismatched_payload() {
        #[derive(serde::Deserialize, serde::Serialize)]
        struct Item {
            symbol: String,
        }
        let doc = Document {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            collection: collections::WATCHLIST.to_string(),
            data: json!({"ticker": "VTI"}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(
            doc.into_record::<Item>(),
            Err(StoreError::Serialization(_))
        ));
    }
}
