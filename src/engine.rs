//! Conversation engine adapter
//!
//! Tracks per-session continuity with the external generation capability.
//! The stored token alone decides which call shape a turn uses: its absence
//! means a fresh conversation, its presence a continuation. The token is only
//! replaced after a successful stream (see the stream controller), so a
//! failed turn leaves the session resumable.

use crate::generation::{GenerationBackend, StreamEvent};
use crate::prompt::ChatMessage;
use crate::store::Store;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Per-session conversation state with the generation engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuity {
    FirstTurn,
    Continuation(String),
}

impl Continuity {
    pub fn from_stored(token: Option<String>) -> Self {
        match token {
            Some(token) => Continuity::Continuation(token),
            None => Continuity::FirstTurn,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Continuity::FirstTurn => None,
            Continuity::Continuation(token) => Some(token),
        }
    }
}

pub struct ConversationEngine {
    backend: Arc<dyn GenerationBackend>,
    store: Store,
}

impl ConversationEngine {
    pub fn new(backend: Arc<dyn GenerationBackend>, store: Store) -> Self {
        Self { backend, store }
    }

    /// Open a generation stream for one turn, picking the call shape from the
    /// session's stored continuity state
    pub async fn open_stream(
        &self,
        session_id: &str,
        messages: &[ChatMessage],
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let continuity = Continuity::from_stored(self.store.get_continuity(session_id).await?);

        match &continuity {
            Continuity::FirstTurn => debug!("session {}: first turn", session_id),
            Continuity::Continuation(_) => debug!("session {}: continuation", session_id),
        }

        self.backend.call(messages, continuity.token()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuity_from_stored_token() {
        assert_eq!(Continuity::from_stored(None), Continuity::FirstTurn);
        assert_eq!(
            Continuity::from_stored(Some("tok".into())),
            Continuity::Continuation("tok".into())
        );
        assert_eq!(Continuity::FirstTurn.token(), None);
        assert_eq!(Continuity::Continuation("tok".into()).token(), Some("tok"));
    }
}
