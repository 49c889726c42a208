use std::collections::HashMap;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::entity::chat_message;
use crate::error::AppError;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

#[derive(Clone, Debug, Serialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

/// Append-only per (user, character) transcript, seeded once from the store
/// so the history is not re-read on every redraw. Entries live for the
/// session: logout evicts a user's transcripts, character deletion evicts
/// that character's.
#[derive(Default)]
pub struct TranscriptCache {
    inner: RwLock<HashMap<(i32, i32), Vec<Turn>>>,
}

impl TranscriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the transcript, lazily loading persisted history (timestamp
    /// ascending) on the first access for this user/character pair.
    pub async fn load(
        &self,
        db: &DatabaseConnection,
        user_id: i32,
        character_id: i32,
    ) -> Result<Vec<Turn>, AppError> {
        let key = (user_id, character_id);
        if let Some(turns) = self.inner.read().await.get(&key) {
            return Ok(turns.clone());
        }

        let rows = chat_message::Entity::find()
            .filter(chat_message::Column::UserId.eq(user_id))
            .filter(chat_message::Column::CharacterId.eq(character_id))
            .order_by_asc(chat_message::Column::Created)
            .all(db)
            .await
            .map_err(|_| AppError::system_exception())?;

        let turns: Vec<Turn> = rows
            .into_iter()
            .map(|m| Turn { role: m.role, content: m.content })
            .collect();

        let mut guard = self.inner.write().await;
        // another request may have seeded the entry while we queried
        let entry = guard.entry(key).or_insert(turns);
        Ok(entry.clone())
    }

    pub async fn append(&self, user_id: i32, character_id: i32, turn: Turn) {
        let mut guard = self.inner.write().await;
        guard.entry((user_id, character_id)).or_default().push(turn);
    }

    pub async fn evict_user(&self, user_id: i32) {
        let mut guard = self.inner.write().await;
        guard.retain(|(uid, _), _| *uid != user_id);
    }

    pub async fn evict_character(&self, character_id: i32) {
        let mut guard = self.inner.write().await;
        guard.retain(|(_, cid), _| *cid != character_id);
    }
}
