//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tower_sessions::Session;
use tracing::{instrument, warn};

use crate::api::{Category, Product};
use crate::filters;
use crate::middleware::PageContext;
use crate::services::Toast;
use crate::state::AppState;

use super::backend;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub ctx: PageContext,
    pub featured: Vec<Product>,
    pub categories: Vec<Category>,
}

/// Display the home page.
///
/// A backend outage does not fail the page: the sections it could not load
/// are left empty and a warning is shown.
#[instrument(skip_all)]
pub async fn home(State(state): State<AppState>, session: Session, mut ctx: PageContext) -> HomeTemplate {
    let backend = backend(&state, &session);
    let (featured, categories) = tokio::join!(
        backend.get_featured_products(),
        backend.get_categories_with_count()
    );

    let mut unavailable = false;
    let featured = match featured {
        Ok(fetched) => ctx.take(fetched),
        Err(e) => {
            warn!(error = %e, "Failed to load featured products");
            unavailable = true;
            Vec::new()
        }
    };
    let categories = match categories {
        Ok(fetched) => ctx.take(fetched),
        Err(e) => {
            warn!(error = %e, "Failed to load categories");
            unavailable = true;
            Vec::new()
        }
    };
    if unavailable {
        ctx.toast(Toast::warning(
            "Some of the shop could not be loaded. Please refresh in a moment.",
        ));
    }

    HomeTemplate {
        ctx,
        featured,
        categories,
    }
}
