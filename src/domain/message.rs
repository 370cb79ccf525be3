use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A single row of the append-only message log. Conversations are not
/// stored; they are derived from the unordered `{sender, receiver}` pair.
/// `conversation_code` is an opaque client-supplied grouping hint carried
/// through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: String,
    pub is_read: bool,
    pub is_edited: bool,
    pub conversation_code: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
