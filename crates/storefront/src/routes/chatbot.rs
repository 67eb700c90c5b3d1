//! Chat assistant route handlers.
//!
//! The conversation itself is the backend's business. This page keeps the
//! backend chat session id and the transcript in the visitor's session and
//! relays one message per form post.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{debug, instrument, warn};

use shopfront_core::{ChatSender, ChatSessionId};

use crate::api::{ApiError, Backend, ChatMessage, Envelope};
use crate::error::Result;
use crate::filters;
use crate::middleware::PageContext;
use crate::models::{ChatState, session_keys};
use crate::services::Toast;
use crate::state::AppState;

use super::backend;

/// Longest message accepted.
const MAX_MESSAGE_CHARS: usize = 1000;

/// Chat page template.
#[derive(Template, WebTemplate)]
#[template(path = "chatbot/show.html")]
pub struct ChatbotTemplate {
    pub ctx: PageContext,
    pub messages: Vec<ChatMessage>,
    pub max_chars: usize,
}

/// Message form data.
#[derive(Debug, Deserialize)]
pub struct MessageForm {
    #[serde(default)]
    pub message: String,
}

/// Display the conversation.
///
/// A chat session without a local transcript (an older session format, or
/// one opened elsewhere) gets its transcript from the backend.
#[instrument(skip_all)]
pub async fn show(State(state): State<AppState>, session: Session, ctx: PageContext) -> ChatbotTemplate {
    let mut chat = load(&session).await;
    if let Some(session_id) = chat.session_id
        && chat.messages.is_empty()
    {
        match backend(&state, &session)
            .get_chat_history(session_id)
            .await
            .and_then(Envelope::into_data)
        {
            Ok(history) => {
                chat.messages = history;
                if let Err(e) = session.insert(session_keys::CHAT, &chat).await {
                    warn!("Failed to store chat transcript: {e}");
                }
            }
            Err(e) => debug!(error = %e, "No chat history"),
        }
    }

    ChatbotTemplate {
        ctx,
        messages: chat.messages,
        max_chars: MAX_MESSAGE_CHARS,
    }
}

/// Send a message and record the reply.
#[instrument(skip_all)]
pub async fn send(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<MessageForm>,
) -> Result<Response> {
    let text = form.message.trim();
    if text.is_empty() || text.chars().count() > MAX_MESSAGE_CHARS {
        state
            .notifications()
            .push(
                &session,
                Toast::error(format!(
                    "Write a message of up to {MAX_MESSAGE_CHARS} characters."
                )),
            )
            .await;
        return Ok(Redirect::to("/chatbot").into_response());
    }

    let backend = backend(&state, &session);
    let mut chat = load(&session).await;
    chat.messages.push(ChatMessage {
        sender: ChatSender::User,
        text: text.to_string(),
        timestamp: Some(Utc::now()),
    });

    match exchange(&backend, &mut chat, text).await {
        Ok(reply) => chat.messages.push(ChatMessage {
            sender: ChatSender::Bot,
            text: reply,
            timestamp: Some(Utc::now()),
        }),
        Err(e) => {
            warn!(error = %e, "Chat message failed");
            state
                .notifications()
                .push(
                    &session,
                    Toast::error("The assistant is not available right now. Please try again."),
                )
                .await;
        }
    }

    session.insert(session_keys::CHAT, &chat).await?;
    Ok(Redirect::to("/chatbot#latest").into_response())
}

/// Forget the conversation and start a new one on the next message.
#[instrument(skip_all)]
pub async fn reset(session: Session) -> Result<Response> {
    session.remove_value(session_keys::CHAT).await?;
    Ok(Redirect::to("/chatbot").into_response())
}

async fn load(session: &Session) -> ChatState {
    session
        .get::<ChatState>(session_keys::CHAT)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Send one message, opening a backend chat session first if needed.
///
/// A session id the backend no longer knows is replaced once.
async fn exchange(backend: &Backend, chat: &mut ChatState, text: &str) -> std::result::Result<String, ApiError> {
    let session_id = match chat.session_id {
        Some(id) => id,
        None => open(backend, chat).await?,
    };

    match backend
        .send_chat_message(session_id, text)
        .await
        .and_then(Envelope::into_data)
    {
        Ok(reply) => Ok(reply.reply),
        Err(ApiError::Status { status, .. }) if status == axum::http::StatusCode::NOT_FOUND => {
            debug!(%session_id, "Chat session expired, opening a new one");
            let session_id = open(backend, chat).await?;
            Ok(backend
                .send_chat_message(session_id, text)
                .await?
                .into_data()?
                .reply)
        }
        Err(e) => Err(e),
    }
}

async fn open(backend: &Backend, chat: &mut ChatState) -> std::result::Result<ChatSessionId, ApiError> {
    let created = backend.create_chat_session().await?.into_data()?;
    chat.session_id = Some(created.id);
    Ok(created.id)
}
