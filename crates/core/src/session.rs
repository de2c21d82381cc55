use crate::memory::ConversationMemory;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One conversation. Owns its memory window; never shared between conversations.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub memory: ConversationMemory,
}

impl ChatSession {
    pub fn new(memory_window_size: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            memory: ConversationMemory::new(memory_window_size),
        }
    }
}
