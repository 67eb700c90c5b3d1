//! JSON helper routes used by the checkout address pickers and the navbar
//! badge.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use shopfront_core::{DistrictId, ProvinceId};

use crate::api::{ApiError, Envelope};
use crate::state::AppState;

use super::backend;

/// Error body for the JSON endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Badge state of the visitor's cart.
#[derive(Debug, Serialize)]
pub struct CartStatus {
    pub count: u32,
    pub busy: bool,
}

fn json_or_error<T: Serialize>(result: Result<Envelope<T>, ApiError>) -> Response {
    match result.and_then(Envelope::into_data) {
        Ok(data) => Json(data).into_response(),
        Err(e) => {
            warn!(error = %e, "Lookup failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorBody {
                    error: e.user_message(),
                }),
            )
                .into_response()
        }
    }
}

/// Provinces.
#[instrument(skip_all)]
pub async fn provinces(State(state): State<AppState>, session: Session) -> Response {
    json_or_error(backend(&state, &session).get_provinces().await)
}

/// Districts of a province.
#[instrument(skip(state, session))]
pub async fn districts(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProvinceId>,
) -> Response {
    json_or_error(backend(&state, &session).get_districts(id).await)
}

/// Wards of a district.
#[instrument(skip(state, session))]
pub async fn wards(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<DistrictId>,
) -> Response {
    json_or_error(backend(&state, &session).get_wards(id).await)
}

/// Item count and whether a cart mutation is in flight.
#[instrument(skip_all)]
pub async fn cart_status(State(state): State<AppState>, session: Session) -> Json<CartStatus> {
    let cart = state.cart();
    Json(CartStatus {
        count: cart.item_count(&session).await,
        busy: cart.is_busy(&session).await,
    })
}
