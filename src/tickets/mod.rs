//! Support tickets and the conversation flow.
//!
//! A send persists the user message, then schedules the canned agent reply
//! on a cancellable task handle kept in [`AppState::pending_replies`]; the
//! handle is aborted when the ticket closes or a newer send supersedes it,
//! so no stale write lands after the conversation moved on.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::flows;
use crate::shared::state::AppState;
use crate::store::{collections, Store, StoreError, StoredRecord};

pub const AGENT_NAME: &str = "Maya";
pub const CANNED_AGENT_REPLY: &str =
    "Thanks for reaching out! I'm looking into this for you now and will follow up with details shortly.";

/// How many trailing messages feed the enhancement flow.
const ENHANCE_CONTEXT_MESSAGES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub subject: String,
    pub department: String,
    pub priority: String,
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketMessage {
    pub ticket_id: Uuid,
    pub content: String,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub department: String,
    pub priority: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct EnhanceRequest {
    pub draft: String,
}

#[derive(Debug, Serialize)]
pub struct TicketWithMessages {
    pub ticket: StoredRecord<Ticket>,
    pub messages: Vec<StoredRecord<TicketMessage>>,
}

fn store_err(e: StoreError) -> (StatusCode, String) {
    match e {
        StoreError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

fn ticket_messages(
    store: &Store,
    owner: Uuid,
    ticket_id: Uuid,
) -> Result<Vec<StoredRecord<TicketMessage>>, StoreError> {
    // One collection holds every ticket's messages; created_at order from the
    // store is the conversation order.
    let all = store.list_records::<TicketMessage>(owner, collections::TICKET_MESSAGES)?;
    Ok(all
        .into_iter()
        .filter(|m| m.record.ticket_id == ticket_id)
        .collect())
}

/// The message that should drive reply suggestions: the conversation's last
/// message, only while it came from the agent.
pub fn latest_agent_message(
    messages: &[StoredRecord<TicketMessage>],
) -> Option<&StoredRecord<TicketMessage>> {
    messages.last().filter(|m| m.record.sender == Sender::Agent)
}

/// Format the trailing `limit` messages as "You:"/"Agent:" lines for the
/// enhancement flow.
pub fn conversation_context(messages: &[StoredRecord<TicketMessage>], limit: usize) -> String {
    let skip = messages.len().saturating_sub(limit);
    messages[skip..]
        .iter()
        .map(|m| match m.record.sender {
            Sender::User => format!("You: {}", m.record.content),
            Sender::Agent => format!("Agent: {}", m.record.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ===== Handlers =====

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<Json<TicketWithMessages>, (StatusCode, String)> {
    if req.subject.trim().is_empty() || req.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Subject and message are required".to_string(),
        ));
    }

    let ticket = Ticket {
        subject: req.subject.trim().to_string(),
        department: req.department,
        priority: req.priority.unwrap_or_else(|| "Medium".to_string()),
        status: TicketStatus::Open,
    };
    let stored = state
        .store
        .add_record(user.id, collections::TICKETS, &ticket)
        .map_err(store_err)?;

    // Two sequential writes; a failed second write leaves an empty ticket
    // rather than rolling the first back.
    let first = TicketMessage {
        ticket_id: stored.id,
        content: req.message.trim().to_string(),
        sender: Sender::User,
        agent_name: None,
    };
    let message = state
        .store
        .add_record(user.id, collections::TICKET_MESSAGES, &first)
        .map_err(store_err)?;

    schedule_agent_reply(&state, user.id, stored.id).await;

    Ok(Json(TicketWithMessages {
        ticket: stored,
        messages: vec![message],
    }))
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<StoredRecord<Ticket>>>, (StatusCode, String)> {
    let mut tickets = state
        .store
        .list_records::<Ticket>(user.id, collections::TICKETS)
        .map_err(store_err)?;
    tickets.reverse();
    Ok(Json(tickets))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketWithMessages>, (StatusCode, String)> {
    // Ticket and messages are independent reads; issue both and join.
    let ticket_task = tokio::task::spawn_blocking({
        let store = state.store.clone();
        move || store.get_record::<Ticket>(user.id, collections::TICKETS, id)
    });
    let messages_task = tokio::task::spawn_blocking({
        let store = state.store.clone();
        move || ticket_messages(&store, user.id, id)
    });

    let (ticket, messages) = tokio::try_join!(ticket_task, messages_task)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(TicketWithMessages {
        ticket: ticket.map_err(store_err)?,
        messages: messages.map_err(store_err)?,
    }))
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Vec<StoredRecord<TicketMessage>>>, (StatusCode, String)> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Message is empty".to_string()));
    }

    let ticket = state
        .store
        .get_record::<Ticket>(user.id, collections::TICKETS, id)
        .map_err(store_err)?;
    if ticket.record.status == TicketStatus::Closed {
        return Err((
            StatusCode::CONFLICT,
            "This ticket is closed".to_string(),
        ));
    }

    state
        .store
        .add_record(
            user.id,
            collections::TICKET_MESSAGES,
            &TicketMessage {
                ticket_id: id,
                content,
                sender: Sender::User,
                agent_name: None,
            },
        )
        .map_err(store_err)?;

    schedule_agent_reply(&state, user.id, id).await;

    let messages = ticket_messages(&state.store, user.id, id).map_err(store_err)?;
    Ok(Json(messages))
}

/// Queue the canned agent reply after the configured delay. Replaces any
/// reply already pending for this ticket.
async fn schedule_agent_reply(state: &AppState, owner: Uuid, ticket_id: Uuid) {
    let delay = std::time::Duration::from_millis(state.config.tickets.agent_reply_delay_ms);
    let store = state.store.clone();

    let handle = tokio::spawn({
        let pending = Arc::clone(&state.pending_replies);
        async move {
            tokio::time::sleep(delay).await;

            let reply = TicketMessage {
                ticket_id,
                content: CANNED_AGENT_REPLY.to_string(),
                sender: Sender::Agent,
                agent_name: Some(AGENT_NAME.to_string()),
            };
            // Best effort: the user never sees these failures.
            if let Err(e) = store.add_record(owner, collections::TICKET_MESSAGES, &reply) {
                error!("Agent reply for ticket {} failed: {}", ticket_id, e);
            } else if let Err(e) = store.update_document(
                owner,
                collections::TICKETS,
                ticket_id,
                &serde_json::json!({ "status": "In Progress" }),
            ) {
                warn!("Could not move ticket {} to In Progress: {}", ticket_id, e);
            }

            pending.lock().await.remove(&ticket_id);
        }
    });

    if let Some(previous) = state
        .pending_replies
        .lock()
        .await
        .insert(ticket_id, handle)
    {
        previous.abort();
    }
}

pub async fn get_suggestions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<flows::SuggestRepliesOutput>, (StatusCode, String)> {
    let messages = ticket_messages(&state.store, user.id, id).map_err(store_err)?;

    let Some(last) = latest_agent_message(&messages) else {
        // Last word is the user's (or nobody's): suggestions are cleared.
        return Ok(Json(flows::SuggestRepliesOutput {
            suggestions: Vec::new(),
        }));
    };

    match flows::suggest_replies(state.llm.as_ref(), &last.record.content).await {
        Ok(output) => Ok(Json(output)),
        Err(e) => {
            // Suggestions are decoration; an LLM hiccup must not break the view.
            warn!("Suggestion flow failed for ticket {}: {}", id, e);
            Ok(Json(flows::SuggestRepliesOutput {
                suggestions: Vec::new(),
            }))
        }
    }
}

pub async fn enhance_draft(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<EnhanceRequest>,
) -> Result<Json<flows::EnhanceReplyOutput>, (StatusCode, String)> {
    if req.draft.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Draft is empty".to_string()));
    }

    let messages = ticket_messages(&state.store, user.id, id).map_err(store_err)?;
    let context = conversation_context(&messages, ENHANCE_CONTEXT_MESSAGES);

    flows::enhance_reply(state.llm.as_ref(), &context, &req.draft)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))
}

pub async fn close_ticket(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredRecord<Ticket>>, (StatusCode, String)> {
    // A reply still in flight must not land on a closed conversation.
    if let Some(handle) = state.pending_replies.lock().await.remove(&id) {
        handle.abort();
    }

    let updated = state
        .store
        .update_record::<Ticket>(
            user.id,
            collections::TICKETS,
            id,
            &serde_json::json!({ "status": "Closed" }),
        )
        .map_err(store_err)?;
    Ok(Json(updated))
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/:id", get(get_ticket))
        .route("/api/tickets/:id/messages", post(send_message))
        .route("/api/tickets/:id/suggestions", get(get_suggestions))
        .route("/api/tickets/:id/enhance", post(enhance_draft))
        .route("/api/tickets/:id/close", post(close_ticket))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msg(ticket_id: Uuid, sender: Sender, content: &str) -> StoredRecord<TicketMessage> {
        StoredRecord {
            id: Uuid::new_v4(),
            record: TicketMessage {
                ticket_id,
                content: content.to_string(),
                sender,
                agent_name: match sender {
                    Sender::Agent => Some(AGENT_NAME.to_string()),
                    Sender::User => None,
                },
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_latest_agent_message_requires_agent_last() {
        let t = Uuid::new_v4();
        let mut messages = vec![
            msg(t, Sender::User, "Hi"),
            msg(t, Sender::Agent, CANNED_AGENT_REPLY),
        ];
        assert_eq!(
            latest_agent_message(&messages).unwrap().record.content,
            CANNED_AGENT_REPLY
        );

        messages.push(msg(t, Sender::User, "thanks"));
        assert!(latest_agent_message(&messages).is_none());
        assert!(latest_agent_message(&[]).is_none());
    }

    #[test]
    fn test_conversation_context_formats_and_limits() {
        let t = Uuid::new_v4();
        let messages = vec![
            msg(t, Sender::User, "first"),
            msg(t, Sender::User, "second"),
            msg(t, Sender::Agent, "hello"),
            msg(t, Sender::User, "my card is blocked"),
            msg(t, Sender::Agent, "checking now"),
        ];
        let context = conversation_context(&messages, 4);
        assert_eq!(
            context,
            "You: second\nAgent: hello\nYou: my card is blocked\nAgent: checking now"
        );
    }

    #[test]
    fn test_conversation_context_handles_short_histories() {
        let t = Uuid::new_v4();
        let messages = vec![msg(t, Sender::User, "only one")];
        assert_eq!(conversation_context(&messages, 4), "You: only one");
        assert_eq!(conversation_context(&[], 4), "");
    }

    #[test]
    fn test_ticket_status_wire_format() {
        assert_eq!(
            serde_json::to_value(TicketStatus::InProgress).unwrap(),
            serde_json::json!("In Progress")
        );
        assert_eq!(
            serde_json::to_value(Sender::Agent).unwrap(),
            serde_json::json!("agent")
        );
        let round: TicketStatus = serde_json::from_str("\"In Progress\"").unwrap();
        assert_eq!(round, TicketStatus::InProgress);
    }
}
