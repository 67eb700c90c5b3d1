//! Session-held product lists: the wishlist and the compare tray.
//!
//! Both store product ids only; pages resolve them against the catalog.

use tower_sessions::Session;

use shopfront_core::ProductId;

use crate::models::session_keys;

/// Most products that can be compared side by side.
pub const COMPARE_LIMIT: usize = 4;

/// Outcome of adding to a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Added {
    Added,
    AlreadyPresent,
    Full,
}

/// A named list of product ids in the session.
#[derive(Debug, Clone, Copy)]
pub struct ProductList {
    key: &'static str,
    limit: Option<usize>,
}

impl ProductList {
    /// The visitor's wishlist.
    pub const WISHLIST: Self = Self {
        key: session_keys::WISHLIST,
        limit: None,
    };

    /// The compare tray.
    pub const COMPARE: Self = Self {
        key: session_keys::COMPARE,
        limit: Some(COMPARE_LIMIT),
    };

    /// Ids in insertion order.
    pub async fn ids(self, session: &Session) -> Vec<ProductId> {
        session
            .get::<Vec<ProductId>>(self.key)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// Whether the product is on the list.
    pub async fn contains(self, session: &Session, id: ProductId) -> bool {
        self.ids(session).await.contains(&id)
    }

    /// Append a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn add(
        self,
        session: &Session,
        id: ProductId,
    ) -> Result<Added, tower_sessions::session::Error> {
        let mut ids = self.ids(session).await;
        let outcome = push_bounded(&mut ids, id, self.limit);
        if outcome == Added::Added {
            session.insert(self.key, &ids).await?;
        }
        Ok(outcome)
    }

    /// Remove a product; missing ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn remove(
        self,
        session: &Session,
        id: ProductId,
    ) -> Result<(), tower_sessions::session::Error> {
        let mut ids = self.ids(session).await;
        ids.retain(|existing| *existing != id);
        session.insert(self.key, &ids).await
    }

    /// Empty the list.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn clear(self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.remove_value(self.key).await?;
        Ok(())
    }
}

fn push_bounded(ids: &mut Vec<ProductId>, id: ProductId, limit: Option<usize>) -> Added {
    if ids.contains(&id) {
        Added::AlreadyPresent
    } else if limit.is_some_and(|limit| ids.len() >= limit) {
        Added::Full
    } else {
        ids.push(id);
        Added::Added
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    #[test]
    fn compare_is_capped() {
        let mut ids = Vec::new();
        for n in 1..=4 {
            assert_eq!(push_bounded(&mut ids, ProductId::new(n), Some(4)), Added::Added);
        }
        assert_eq!(push_bounded(&mut ids, ProductId::new(5), Some(4)), Added::Full);
        assert_eq!(push_bounded(&mut ids, ProductId::new(2), Some(4)), Added::AlreadyPresent);
        assert_eq!(ids.len(), 4);
    }

    #[tokio::test]
    async fn wishlist_add_and_remove() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let list = ProductList::WISHLIST;

        assert_eq!(list.add(&session, ProductId::new(3)).await.unwrap(), Added::Added);
        assert_eq!(list.add(&session, ProductId::new(8)).await.unwrap(), Added::Added);
        assert!(list.contains(&session, ProductId::new(3)).await);

        list.remove(&session, ProductId::new(3)).await.unwrap();
        assert_eq!(list.ids(&session).await, vec![ProductId::new(8)]);
    }
}
