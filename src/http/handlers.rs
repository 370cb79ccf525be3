use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::accounts::AccountService;
use crate::app::messages::{InboxEntry, MessageService};
use crate::app::relationships::{
    BlockedEntry, PendingRequest, RelationshipEdge, RelationshipService, RequestDecision,
};
use crate::domain::account::Account;
use crate::domain::message::Message;
use crate::http::{AppError, AuthSession};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, Uuid)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let mut parts = cursor.splitn(2, '/');
    let timestamp = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;
    let id = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, Uuid)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

fn page_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(20).clamp(1, 100)
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Account directory
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterAccountRequest {
    pub handle: String,
    pub display_name: String,
    pub bio: Option<String>,
}

pub async fn register_account(
    State(state): State<AppState>,
    Json(payload): Json<RegisterAccountRequest>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let service = AccountService::new(state.db.clone());
    let account = service
        .register(&payload.handle, &payload.display_name, payload.bio.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get_account(
    Path(id): Path<Uuid>,
    _auth: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<Account>, AppError> {
    let service = AccountService::new(state.db.clone());
    let account = service
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("account not found"))?;

    Ok(Json(account))
}

#[derive(Deserialize)]
pub struct LookupQuery {
    pub handle: String,
}

pub async fn lookup_account(
    Query(query): Query<LookupQuery>,
    _auth: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<Account>, AppError> {
    let service = AccountService::new(state.db.clone());
    let account = service
        .lookup_handle(&query.handle)
        .await?
        .ok_or_else(|| AppError::not_found("account not found"))?;

    Ok(Json(account))
}

#[derive(Deserialize)]
pub struct SetPrivacyRequest {
    pub private: bool,
}

pub async fn set_privacy(
    auth: AuthSession,
    State(state): State<AppState>,
    Json(payload): Json<SetPrivacyRequest>,
) -> Result<Json<Account>, AppError> {
    let service = AccountService::new(state.db.clone());
    let account = service.set_privacy(auth.account_id, payload.private).await?;

    Ok(Json(account))
}

// ---------------------------------------------------------------------------
// Relationship graph
// ---------------------------------------------------------------------------

pub async fn follow_account(
    Path(id): Path<Uuid>,
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = RelationshipService::new(state.db.clone());
    service.follow(auth.account_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn unfollow_account(
    Path(id): Path<Uuid>,
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = RelationshipService::new(state.db.clone());
    service.unfollow(auth.account_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_follower(
    Path(id): Path<Uuid>,
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = RelationshipService::new(state.db.clone());
    service.remove_follower(auth.account_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn block_account(
    Path(id): Path<Uuid>,
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = RelationshipService::new(state.db.clone());
    service.block(auth.account_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn unblock_account(
    Path(id): Path<Uuid>,
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = RelationshipService::new(state.db.clone());
    service.unblock(auth.account_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_followers(
    Path(id): Path<Uuid>,
    _auth: AuthSession,
    Query(query): Query<PaginationQuery>,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<RelationshipEdge>>, AppError> {
    let limit = page_limit(query.limit);
    let cursor = parse_cursor(query.cursor)?;

    let service = RelationshipService::new(state.db.clone());
    let mut items = service.list_followers(id, cursor, limit + 1).await?;

    // The extra row only signals that another page exists; the cursor must
    // point at the last returned row, since the next-page query is exclusive.
    let next_cursor = if items.len() > limit as usize {
        items.truncate(limit as usize);
        let last = items.last().expect("checked len");
        Some((last.followed_at, last.account.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items,
        next_cursor: encode_cursor(next_cursor),
    }))
}

pub async fn list_following(
    Path(id): Path<Uuid>,
    _auth: AuthSession,
    Query(query): Query<PaginationQuery>,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<RelationshipEdge>>, AppError> {
    let limit = page_limit(query.limit);
    let cursor = parse_cursor(query.cursor)?;

    let service = RelationshipService::new(state.db.clone());
    let mut items = service.list_following(id, cursor, limit + 1).await?;

    let next_cursor = if items.len() > limit as usize {
        items.truncate(limit as usize);
        let last = items.last().expect("checked len");
        Some((last.followed_at, last.account.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items,
        next_cursor: encode_cursor(next_cursor),
    }))
}

pub async fn list_blocked(
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<BlockedEntry>>, AppError> {
    let service = RelationshipService::new(state.db.clone());
    let items = service.list_blocked(auth.account_id).await?;

    Ok(Json(items))
}

// ---------------------------------------------------------------------------
// Follow requests
// ---------------------------------------------------------------------------

pub async fn send_follow_request(
    Path(id): Path<Uuid>,
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = RelationshipService::new(state.db.clone());
    service.send_follow_request(auth.account_id, id).await?;

    Ok(StatusCode::CREATED)
}

#[derive(Deserialize)]
pub struct RespondFollowRequestBody {
    pub action: String,
}

pub async fn respond_follow_request(
    Path(requester_id): Path<Uuid>,
    auth: AuthSession,
    State(state): State<AppState>,
    Json(payload): Json<RespondFollowRequestBody>,
) -> Result<StatusCode, AppError> {
    let decision = match payload.action.as_str() {
        "accept" => RequestDecision::Accept,
        "decline" => RequestDecision::Decline,
        _ => return Err(AppError::bad_request("action must be accept or decline")),
    };

    let service = RelationshipService::new(state.db.clone());
    service
        .respond_follow_request(auth.account_id, requester_id, decision)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn cancel_follow_request(
    Path(id): Path<Uuid>,
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = RelationshipService::new(state.db.clone());
    service.cancel_follow_request(auth.account_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_pending_received(
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<PendingRequest>>, AppError> {
    let service = RelationshipService::new(state.db.clone());
    let items = service.list_pending_received(auth.account_id).await?;

    Ok(Json(items))
}

pub async fn list_pending_sent(
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<PendingRequest>>, AppError> {
    let service = RelationshipService::new(state.db.clone());
    let items = service.list_pending_sent(auth.account_id).await?;

    Ok(Json(items))
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    pub text: String,
    pub conversation_code: Option<String>,
}

pub async fn send_message(
    auth: AuthSession,
    State(state): State<AppState>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let service = MessageService::new(state.db.clone());
    let message = service
        .send(
            auth.account_id,
            payload.receiver_id,
            &payload.text,
            payload.conversation_code.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn inbox(
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<InboxEntry>>, AppError> {
    let service = MessageService::new(state.db.clone());
    let entries = service.inbox(auth.account_id).await?;

    Ok(Json(entries))
}

pub async fn thread(
    Path(account_id): Path<Uuid>,
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<Message>>, AppError> {
    let service = MessageService::new(state.db.clone());
    let messages = service.thread(auth.account_id, account_id).await?;

    Ok(Json(messages))
}

#[derive(Deserialize)]
pub struct EditMessageRequest {
    pub text: String,
}

pub async fn edit_message(
    Path(id): Path<i64>,
    auth: AuthSession,
    State(state): State<AppState>,
    Json(payload): Json<EditMessageRequest>,
) -> Result<Json<Message>, AppError> {
    let service = MessageService::new(state.db.clone());
    let message = service.edit(auth.account_id, id, &payload.text).await?;

    Ok(Json(message))
}

pub async fn mark_message_read(
    Path(id): Path<i64>,
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<Message>, AppError> {
    let service = MessageService::new(state.db.clone());
    let message = service.mark_read(auth.account_id, id).await?;

    Ok(Json(message))
}
