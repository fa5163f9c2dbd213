//! Accounts, sessions and the auth gate.
//!
//! Sessions are opaque bearer tokens, stored hashed. Every `/api` route
//! outside this module sits behind [`require_session`].

pub mod password;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::shared::schema::{auth_sessions, password_resets, users};
use crate::shared::state::AppState;

#[derive(Debug, Clone, Queryable, Insertable, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = auth_sessions)]
pub struct AuthSession {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = password_resets)]
pub struct PasswordReset {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

/// The authenticated caller, attached to the request by [`require_session`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
}

// ===== Error mapping =====

/// Stable user-facing messages keyed by error code, so the UI never shows a
/// raw database or hashing error.
pub fn auth_error_message(code: &str) -> &'static str {
    match code {
        "invalid-credentials" => "Incorrect email or password.",
        "email-in-use" => "An account with this email already exists.",
        "invalid-email" => "That does not look like a valid email address.",
        "weak-password" => "Password must be at least 8 characters long.",
        "session-expired" => "Your session has expired. Please sign in again.",
        "unauthenticated" => "You must be signed in to do that.",
        "invalid-reset-token" => "This reset link is invalid or has expired.",
        _ => "Something went wrong. Please try again.",
    }
}

pub struct AuthFailure(pub &'static str);

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        let status = match self.0 {
            "invalid-credentials" | "session-expired" | "unauthenticated" => {
                StatusCode::UNAUTHORIZED
            }
            "email-in-use" => StatusCode::CONFLICT,
            "invalid-email" | "weak-password" | "invalid-reset-token" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(serde_json::json!({
                "code": self.0,
                "error": auth_error_message(self.0),
            })),
        )
            .into_response()
    }
}

// ===== Tokens =====

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

// ===== Requests / responses =====

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

// ===== Handlers =====

fn open_session(state: &AppState, user_id: Uuid) -> Result<String, AuthFailure> {
    let mut conn = state.conn.get().map_err(|_| AuthFailure("internal"))?;
    let token = generate_token();
    let now = Utc::now();
    let session = AuthSession {
        token_hash: hash_token(&token),
        user_id,
        created_at: now,
        expires_at: now + Duration::hours(state.config.auth.session_ttl_hours),
    };
    diesel::insert_into(auth_sessions::table)
        .values(&session)
        .execute(&mut conn)
        .map_err(|_| AuthFailure("internal"))?;
    Ok(token)
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<SessionResponse>, AuthFailure> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AuthFailure("invalid-email"));
    }
    if req.password.len() < 8 {
        return Err(AuthFailure("weak-password"));
    }

    let mut conn = state.conn.get().map_err(|_| AuthFailure("internal"))?;
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: email.clone(),
        password_hash: password::hash_password(&req.password)
            .map_err(|_| AuthFailure("internal"))?,
        display_name: req
            .display_name
            .unwrap_or_else(|| email.split('@').next().unwrap_or("there").to_string()),
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(users::table)
        .values(&user)
        .execute(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => AuthFailure("email-in-use"),
            _ => AuthFailure("internal"),
        })?;
    drop(conn);

    // First sign-in gets a populated workspace. Losing the seed is not worth
    // failing the registration over.
    if let Err(e) = crate::seed::seed_user_data(&state.store, user.id) {
        warn!("Failed to seed sample data for {}: {}", user.id, e);
    }

    let token = open_session(&state, user.id)?;
    info!("New user registered: {}", user.email);
    Ok(Json(SessionResponse { token, user }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AuthFailure> {
    let email = req.email.trim().to_lowercase();
    let mut conn = state.conn.get().map_err(|_| AuthFailure("internal"))?;

    let user: User = users::table
        .filter(users::email.eq(&email))
        .filter(users::is_active.eq(true))
        .first(&mut conn)
        .map_err(|_| AuthFailure("invalid-credentials"))?;
    drop(conn);

    let ok = password::verify_password(&req.password, &user.password_hash)
        .map_err(|_| AuthFailure("internal"))?;
    if !ok {
        return Err(AuthFailure("invalid-credentials"));
    }

    let token = open_session(&state, user.id)?;
    Ok(Json(SessionResponse { token, user }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<serde_json::Value>, AuthFailure> {
    if let Some(token) = bearer_token(&req) {
        let mut conn = state.conn.get().map_err(|_| AuthFailure("internal"))?;
        diesel::delete(auth_sessions::table.filter(auth_sessions::token_hash.eq(hash_token(&token))))
            .execute(&mut conn)
            .map_err(|_| AuthFailure("internal"))?;
    }
    Ok(Json(serde_json::json!({ "status": "signed-out" })))
}

pub async fn me(Extension(user): Extension<CurrentUser>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "id": user.id,
        "email": user.email,
        "display_name": user.display_name,
    }))
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, AuthFailure> {
    let email = req.email.trim().to_lowercase();
    let mut conn = state.conn.get().map_err(|_| AuthFailure("internal"))?;

    if let Ok(user) = users::table
        .filter(users::email.eq(&email))
        .first::<User>(&mut conn)
    {
        let token = generate_token();
        let now = Utc::now();
        let reset = PasswordReset {
            token_hash: hash_token(&token),
            user_id: user.id,
            created_at: now,
            expires_at: now + Duration::minutes(state.config.auth.reset_token_ttl_minutes),
            used: false,
        };
        diesel::insert_into(password_resets::table)
            .values(&reset)
            .execute(&mut conn)
            .map_err(|_| AuthFailure("internal"))?;
        // Mail delivery is delegated; the token lands in the operator log.
        info!("Password reset token for {}: {}", user.email, token);
    }

    // Identical response whether or not the account exists.
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, AuthFailure> {
    if req.new_password.len() < 8 {
        return Err(AuthFailure("weak-password"));
    }
    let mut conn = state.conn.get().map_err(|_| AuthFailure("internal"))?;
    let now = Utc::now();

    let reset: PasswordReset = password_resets::table
        .filter(password_resets::token_hash.eq(hash_token(&req.token)))
        .filter(password_resets::used.eq(false))
        .filter(password_resets::expires_at.gt(now))
        .first(&mut conn)
        .map_err(|_| AuthFailure("invalid-reset-token"))?;

    let new_hash =
        password::hash_password(&req.new_password).map_err(|_| AuthFailure("internal"))?;
    diesel::update(users::table.filter(users::id.eq(reset.user_id)))
        .set((users::password_hash.eq(new_hash), users::updated_at.eq(now)))
        .execute(&mut conn)
        .map_err(|_| AuthFailure("internal"))?;
    diesel::update(
        password_resets::table.filter(password_resets::token_hash.eq(&reset.token_hash)),
    )
    .set(password_resets::used.eq(true))
    .execute(&mut conn)
    .map_err(|_| AuthFailure("internal"))?;

    Ok(Json(serde_json::json!({ "status": "password-updated" })))
}

// ===== Gate middleware =====

pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&req) else {
        return AuthFailure("unauthenticated").into_response();
    };

    let mut conn = match state.conn.get() {
        Ok(c) => c,
        Err(_) => return AuthFailure("internal").into_response(),
    };

    let row: Result<(AuthSession, User), _> = auth_sessions::table
        .inner_join(users::table)
        .filter(auth_sessions::token_hash.eq(hash_token(&token)))
        .first(&mut conn);

    match row {
        Ok((session, user)) if session.expires_at > Utc::now() && user.is_active => {
            req.extensions_mut().insert(CurrentUser {
                id: user.id,
                email: user.email,
                display_name: user.display_name,
            });
            next.run(req).await
        }
        Ok(_) => AuthFailure("session-expired").into_response(),
        Err(_) => AuthFailure("unauthenticated").into_response(),
    }
}

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password", post(reset_password))
}

pub fn configure_session_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/me", get(me))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_messages_are_stable() {
        assert_eq!(
            auth_error_message("invalid-credentials"),
            "Incorrect email or password."
        );
        assert_eq!(
            auth_error_message("email-in-use"),
            "An account with this email already exists."
        );
        assert_eq!(
            auth_error_message("no-such-code"),
            "Something went wrong. Please try again."
        );
    }

    #[test]
    fn test_generated_tokens_are_unique_and_opaque() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_token_hash_is_deterministic_and_not_identity() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }
}
