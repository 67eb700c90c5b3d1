//! Cart service.
//!
//! The backend computes the cart; this service keeps the visitor's last copy
//! of it in the session and replaces that copy wholesale with every
//! successful response. Totals are never computed here.
//!
//! Mutations for one cart are serialized with a per-cart async mutex: the
//! backend sees them one at a time, in the order they took the lock, and
//! each request writes the response it got into its own session handle.
//! The session store itself is written when each response finishes, so two
//! overlapping requests of one visitor leave whichever record was saved
//! last. The next [`CartService::refresh`] repairs a stale snapshot.
//!
//! Guests have no server cart. Their lines are kept in the session as
//! [`GuestCartLine`]s and merged into the server cart when they sign in.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::Mutex;
use tower_sessions::Session;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use shopfront_core::{CartItemId, ProductId};

use crate::api::{ApiError, Backend, Cart, Envelope, GuestCartLine};
use crate::models::session_keys;
use crate::services::auth;
use crate::services::notifications::{NotificationCenter, Toast};

/// How long an idle cart lock is kept.
const LOCK_IDLE: Duration = Duration::from_secs(10 * 60);

/// Cart operations shared by the cart page, the navbar badge and checkout.
#[derive(Clone)]
pub struct CartService {
    locks: Cache<String, Arc<Mutex<()>>>,
    notifications: NotificationCenter,
}

impl CartService {
    /// Create a new cart service.
    #[must_use]
    pub fn new(notifications: NotificationCenter) -> Self {
        Self {
            locks: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(LOCK_IDLE)
                .build(),
            notifications,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The last cart the backend returned for this session.
    pub async fn snapshot(&self, session: &Session) -> Cart {
        session
            .get::<Cart>(session_keys::CART_SNAPSHOT)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// Lines a guest has added.
    pub async fn guest_lines(&self, session: &Session) -> Vec<GuestCartLine> {
        session
            .get::<Vec<GuestCartLine>>(session_keys::GUEST_CART)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// Units in the cart, for the navbar badge.
    pub async fn item_count(&self, session: &Session) -> u32 {
        if auth::hydrate(session).await.is_authenticated() {
            self.snapshot(session).await.item_count()
        } else {
            self.guest_lines(session)
                .await
                .iter()
                .map(|line| line.quantity)
                .sum()
        }
    }

    /// Whether a mutation for this visitor's cart is in flight.
    pub async fn is_busy(&self, session: &Session) -> bool {
        let key = self.cart_key(session).await;
        self.notifications.is_loading(&loading_flag(&key))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Reload the cart from the backend.
    #[instrument(skip_all)]
    pub async fn refresh(&self, session: &Session, backend: &Backend) -> bool {
        self.mutate(session, "refresh the cart", || backend.get_cart())
            .await
    }

    /// Add a product. Guests get a session line instead of a backend call.
    #[instrument(skip(self, session, backend), fields(product_id = %product_id))]
    pub async fn add_to_cart(
        &self,
        session: &Session,
        backend: &Backend,
        product_id: ProductId,
        quantity: u32,
    ) -> bool {
        if quantity == 0 {
            self.toast(session, Toast::error("Quantity must be at least 1."))
                .await;
            return false;
        }

        if !auth::hydrate(session).await.is_authenticated() {
            return self.add_guest_line(session, product_id, quantity).await;
        }

        self.mutate(session, "add the product to your cart", || {
            backend.add_to_cart(product_id, quantity)
        })
        .await
    }

    /// Set the quantity of a line; zero removes it.
    #[instrument(skip(self, session, backend), fields(item_id = %item_id))]
    pub async fn update_cart_item(
        &self,
        session: &Session,
        backend: &Backend,
        item_id: CartItemId,
        quantity: u32,
    ) -> bool {
        if quantity == 0 {
            return self.remove_from_cart(session, backend, item_id).await;
        }
        self.mutate(session, "update the quantity", || {
            backend.update_cart_item(item_id, quantity)
        })
        .await
    }

    /// Remove a line.
    #[instrument(skip(self, session, backend), fields(item_id = %item_id))]
    pub async fn remove_from_cart(
        &self,
        session: &Session,
        backend: &Backend,
        item_id: CartItemId,
    ) -> bool {
        self.mutate(session, "remove the item", || backend.remove_from_cart(item_id))
            .await
    }

    /// Empty the cart.
    #[instrument(skip_all)]
    pub async fn clear_cart(&self, session: &Session, backend: &Backend) -> bool {
        self.mutate(session, "clear the cart", || backend.clear_cart())
            .await
    }

    /// Apply a promo code. An invalid code leaves the cart as it was.
    #[instrument(skip(self, session, backend))]
    pub async fn apply_promo_code(&self, session: &Session, backend: &Backend, code: &str) -> bool {
        let code = code.trim();
        if code.is_empty() {
            self.toast(session, Toast::error("Enter a promo code.")).await;
            return false;
        }
        self.mutate(session, "apply the promo code", || {
            backend.apply_promo_code(code)
        })
        .await
    }

    /// Remove the applied promo code.
    #[instrument(skip_all)]
    pub async fn remove_promo_code(&self, session: &Session, backend: &Backend) -> bool {
        self.mutate(session, "remove the promo code", || {
            backend.remove_promo_code()
        })
        .await
    }

    /// Merge the guest lines into the signed-in user's cart.
    ///
    /// The guest lines are dropped only once the backend accepted them. With
    /// no guest lines the server cart is simply loaded.
    #[instrument(skip_all)]
    pub async fn merge_guest_cart(&self, session: &Session, backend: &Backend) -> bool {
        let lines = self.guest_lines(session).await;
        if lines.is_empty() {
            return self.refresh(session, backend).await;
        }

        let merged = self
            .mutate(session, "move your saved items into your cart", || {
                backend.merge_guest_cart(&lines)
            })
            .await;
        if merged && let Err(e) = session.remove_value(session_keys::GUEST_CART).await {
            error!("Failed to clear guest cart: {e}");
        }
        merged
    }

    /// Drop the snapshot without a backend call; the next read shows an
    /// empty cart until [`Self::refresh`].
    pub async fn forget(&self, session: &Session) {
        if let Err(e) = session.remove_value(session_keys::CART_SNAPSHOT).await {
            error!("Failed to clear cart snapshot: {e}");
        }
    }

    // =========================================================================
    // Guest lines
    // =========================================================================

    /// Set a guest line's quantity; zero removes it. A product with no guest
    /// line is refused.
    pub async fn set_guest_quantity(
        &self,
        session: &Session,
        product_id: ProductId,
        quantity: u32,
    ) -> bool {
        let mut lines = self.guest_lines(session).await;
        if quantity == 0 {
            lines.retain(|line| line.product_id != product_id);
        } else if let Some(line) = lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity = quantity;
        } else {
            self.toast(session, Toast::error("That item is no longer in your cart."))
                .await;
            return false;
        }
        self.store_guest_lines(session, &lines).await
    }

    /// Drop every guest line.
    pub async fn clear_guest_lines(&self, session: &Session) -> bool {
        self.store_guest_lines(session, &[]).await
    }

    async fn add_guest_line(&self, session: &Session, product_id: ProductId, quantity: u32) -> bool {
        let mut lines = self.guest_lines(session).await;
        accumulate(&mut lines, product_id, quantity);
        if self.store_guest_lines(session, &lines).await {
            self.toast(session, Toast::success("Added to your cart.")).await;
            true
        } else {
            false
        }
    }

    async fn store_guest_lines(&self, session: &Session, lines: &[GuestCartLine]) -> bool {
        match session.insert(session_keys::GUEST_CART, lines).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to store guest cart: {e}");
                self.toast(session, Toast::error("Could not update your cart."))
                    .await;
                false
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Run one backend cart call: serialize per cart, raise the loading flag,
    /// replace the snapshot on success, toast on failure.
    async fn mutate<F, Fut>(&self, session: &Session, action: &str, call: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Envelope<Cart>, ApiError>>,
    {
        let key = self.cart_key(session).await;
        let lock = self
            .locks
            .get_with(key.clone(), async { Arc::new(Mutex::new(())) })
            .await;
        let _serial = lock.lock().await;
        let _loading = self.notifications.loading(loading_flag(&key));

        match call().await.and_then(Envelope::into_data) {
            Ok(cart) => {
                debug!(cart_key = %key, items = cart.items.len(), "Cart updated");
                if let Err(e) = session.insert(session_keys::CART_SNAPSHOT, &cart).await {
                    error!("Failed to store cart snapshot: {e}");
                }
                true
            }
            Err(e) => {
                warn!(cart_key = %key, error = %e, "Could not {action}");
                let message = match &e {
                    ApiError::Rejected(message) => message.clone(),
                    ApiError::Status { .. } | ApiError::Unauthorized => e.user_message(),
                    _ => format!("Could not {action}. Please try again."),
                };
                self.toast(session, Toast::error(message)).await;
                false
            }
        }
    }

    /// The user's id when signed in, else a per-session guest key.
    async fn cart_key(&self, session: &Session) -> String {
        if let Some(user) = auth::current_user(session).await {
            return format!("user:{}", user.id);
        }
        if let Ok(Some(key)) = session.get::<String>(session_keys::GUEST_KEY).await {
            return format!("guest:{key}");
        }
        let key = Uuid::new_v4().to_string();
        if let Err(e) = session.insert(session_keys::GUEST_KEY, &key).await {
            error!("Failed to store guest cart key: {e}");
        }
        format!("guest:{key}")
    }

    async fn toast(&self, session: &Session, toast: Toast) {
        self.notifications.push(session, toast).await;
    }
}

fn loading_flag(cart_key: &str) -> String {
    format!("cart:{cart_key}")
}

/// Add to a product's line, or start a new one.
fn accumulate(lines: &mut Vec<GuestCartLine>, product_id: ProductId, quantity: u32) {
    if let Some(line) = lines.iter_mut().find(|l| l.product_id == product_id) {
        line.quantity = line.quantity.saturating_add(quantity);
    } else {
        lines.push(GuestCartLine {
            product_id,
            quantity,
        });
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

    #[test]
    fn guest_lines_accumulate_per_product() {
        let mut lines = Vec::new();
        accumulate(&mut lines, ProductId::new(1), 2);
        accumulate(&mut lines, ProductId::new(2), 1);
        accumulate(&mut lines, ProductId::new(1), 3);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].quantity, 5);
    }

    #[tokio::test]
    async fn guest_add_stays_in_session() {
        let service = CartService::new(NotificationCenter::new());
        let session = session();

        assert!(service.add_guest_line(&session, ProductId::new(7), 2).await);
        assert!(service.add_guest_line(&session, ProductId::new(7), 1).await);
        assert_eq!(service.item_count(&session).await, 3);

        assert!(service.set_guest_quantity(&session, ProductId::new(7), 0).await);
        assert_eq!(service.item_count(&session).await, 0);
    }

    #[tokio::test]
    async fn guest_quantity_for_a_missing_line_is_refused() {
        let notifications = NotificationCenter::new();
        let service = CartService::new(notifications.clone());
        let session = session();
        assert!(service.add_guest_line(&session, ProductId::new(7), 1).await);
        notifications.drain(&session).await;

        assert!(!service.set_guest_quantity(&session, ProductId::new(9), 4).await);
        assert_eq!(service.item_count(&session).await, 1);
        let toasts = notifications.drain(&session).await;
        assert_eq!(toasts.len(), 1);

        assert!(service.set_guest_quantity(&session, ProductId::new(7), 4).await);
        assert_eq!(service.item_count(&session).await, 4);
    }

    #[tokio::test]
    async fn guest_key_is_stable_within_a_session() {
        let service = CartService::new(NotificationCenter::new());
        let session = session();
        let first = service.cart_key(&session).await;
        assert!(first.starts_with("guest:"));
        assert_eq!(service.cart_key(&session).await, first);
    }

    #[tokio::test]
    async fn empty_snapshot_is_an_empty_cart() {
        let service = CartService::new(NotificationCenter::new());
        let cart = service.snapshot(&session()).await;
        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
    }
}
