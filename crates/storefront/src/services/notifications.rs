//! Toasts and loading flags.
//!
//! Toasts are queued in the visitor's session and rendered once on the next
//! page. Loading flags are process-wide named booleans with watchers; the cart
//! service raises `cart:<key>` while a mutation is in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tower_sessions::Session;
use tracing::error;

use crate::models::session_keys;

/// Severity of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl ToastLevel {
    /// CSS modifier class.
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Success => "toast--success",
            Self::Info => "toast--info",
            Self::Warning => "toast--warning",
            Self::Error => "toast--error",
        }
    }
}

/// A one-shot message shown to the visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Error, message)
    }

    fn new(level: ToastLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Process-wide notification hub. Cheaply cloneable.
#[derive(Clone, Default)]
pub struct NotificationCenter {
    flags: Arc<Mutex<HashMap<String, watch::Sender<bool>>>>,
}

impl NotificationCenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Toasts
    // =========================================================================

    /// Queue a toast for the visitor's next page.
    pub async fn push(&self, session: &Session, toast: Toast) {
        let mut queue = self.pending(session).await;
        queue.push(toast);
        if let Err(e) = session.insert(session_keys::TOASTS, &queue).await {
            error!("Failed to queue toast: {e}");
        }
    }

    /// Take every queued toast; they will not be shown again.
    pub async fn drain(&self, session: &Session) -> Vec<Toast> {
        match session.remove::<Vec<Toast>>(session_keys::TOASTS).await {
            Ok(toasts) => toasts.unwrap_or_default(),
            Err(e) => {
                error!("Failed to read toasts, dropping them: {e}");
                let _ = session.remove_value(session_keys::TOASTS).await;
                Vec::new()
            }
        }
    }

    async fn pending(&self, session: &Session) -> Vec<Toast> {
        session
            .get::<Vec<Toast>>(session_keys::TOASTS)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    // =========================================================================
    // Loading flags
    // =========================================================================

    /// Set a named flag, waking its subscribers.
    ///
    /// Cleared flags nobody watches are forgotten.
    pub fn set_loading(&self, name: &str, loading: bool) {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = flags.get(name) {
            sender.send_replace(loading);
            if !loading && sender.receiver_count() == 0 {
                flags.remove(name);
            }
        } else if loading {
            flags.insert(name.to_string(), watch::Sender::new(true));
        }
    }

    /// Current value of a flag; unknown flags are `false`.
    #[must_use]
    pub fn is_loading(&self, name: &str) -> bool {
        self.flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .is_some_and(|sender| *sender.borrow())
    }

    /// Watch a flag.
    #[must_use]
    pub fn subscribe(&self, name: &str) -> watch::Receiver<bool> {
        self.flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert_with(|| watch::Sender::new(false))
            .subscribe()
    }

    /// Raise a flag until the returned guard is dropped.
    #[must_use]
    pub fn loading(&self, name: impl Into<String>) -> LoadingGuard {
        let name = name.into();
        self.set_loading(&name, true);
        LoadingGuard {
            center: self.clone(),
            name,
        }
    }
}

/// Clears its loading flag when dropped, whether the work succeeded or not.
pub struct LoadingGuard {
    center: NotificationCenter,
    name: String,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.center.set_loading(&self.name, false);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn toasts_are_drained_once() {
        let center = NotificationCenter::new();
        let session = session();

        center.push(&session, Toast::success("Added to cart")).await;
        center.push(&session, Toast::error("Out of stock")).await;

        let toasts = center.drain(&session).await;
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts[0].level, ToastLevel::Success);
        assert_eq!(toasts[1].message, "Out of stock");

        assert!(center.drain(&session).await.is_empty());
    }

    #[test]
    fn unknown_flags_read_false() {
        let center = NotificationCenter::new();
        assert!(!center.is_loading("cart:42"));
    }

    #[tokio::test]
    async fn subscribers_see_flag_changes() {
        let center = NotificationCenter::new();
        let mut rx = center.subscribe("cart:7");
        assert!(!*rx.borrow());

        center.set_loading("cart:7", true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());

        center.set_loading("cart:7", false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
    }

    #[test]
    fn guard_clears_flag_on_drop() {
        let center = NotificationCenter::new();
        {
            let _guard = center.loading("cart:guest");
            assert!(center.is_loading("cart:guest"));
        }
        assert!(!center.is_loading("cart:guest"));
        assert!(center.flags.lock().unwrap().is_empty());
    }
}
