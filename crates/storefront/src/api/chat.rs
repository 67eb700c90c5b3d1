//! Chatbot endpoints. Replies are produced by the backend.

use shopfront_core::ChatSessionId;
use tracing::instrument;

use super::types::{ChatMessage, ChatMessageRequest, ChatReply, ChatSession};
use super::{ApiError, Backend, Envelope};

impl Backend {
    /// Open a new chat session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn create_chat_session(&self) -> Result<Envelope<ChatSession>, ApiError> {
        self.post_empty("chatbot/sessions").await
    }

    /// Send one message and get the bot's reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, text), fields(session_id = %session_id))]
    pub async fn send_chat_message(
        &self,
        session_id: ChatSessionId,
        text: &str,
    ) -> Result<Envelope<ChatReply>, ApiError> {
        self.post(
            &format!("chatbot/sessions/{session_id}/messages"),
            &ChatMessageRequest { message: text },
        )
        .await
    }

    /// The transcript of a chat session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn get_chat_history(
        &self,
        session_id: ChatSessionId,
    ) -> Result<Envelope<Vec<ChatMessage>>, ApiError> {
        self.get(&format!("chatbot/sessions/{session_id}/messages"))
            .await
    }
}
