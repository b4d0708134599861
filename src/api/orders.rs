//! Order endpoints returning orders with their customer and garments attached

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
};
use futures::future::try_join_all;

use super::{ApiResponse, parse_body_or_default};
use crate::AppState;
use crate::error::{ProxyError, ProxyResult};
use crate::services::orders::{ORDER_ID_FIELD, ORDER_TABLE, denormalize};
use crate::services::{Fields, ListQuery, formula};

/// Look up an order by its OrderID value and attach linked records
async fn get_order_details(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> ProxyResult<Json<ApiResponse>> {
    let order = state
        .store
        .first(ORDER_TABLE, Some(formula::field_equals(ORDER_ID_FIELD, &order_id)))
        .await?
        .ok_or_else(|| {
            ProxyError::not_found(format!(
                "Order not found with {ORDER_ID_FIELD} = '{order_id}' in table '{ORDER_TABLE}'"
            ))
        })?;

    let view = denormalize(order, state.store.as_ref()).await?;

    Ok(Json(
        ApiResponse::success(
            format!("Order {order_id} found and details fetched (Airtable structure retained)."),
            view,
        )?
        .with_count(1),
    ))
}

/// Orders matching the body's filters, each with linked records.
/// An empty or missing body lists every order.
async fn list_orders(
    State(state): State<AppState>,
    body: Bytes,
) -> ProxyResult<Json<ApiResponse>> {
    let filters: Fields = parse_body_or_default(&body)?;
    let formula = formula::compile(&filters)?;

    let orders = state
        .store
        .list(ORDER_TABLE, ListQuery::filtered(formula))
        .await?;

    if orders.is_empty() {
        return Ok(Json(
            ApiResponse::success("No orders found matching the filters", Vec::<()>::new())?
                .with_count(0),
        ));
    }

    // Outbound concurrency is bounded by the client's rate limiter
    let store = state.store.as_ref();
    let views = try_join_all(orders.into_iter().map(|order| denormalize(order, store))).await?;

    let count = views.len();
    Ok(Json(
        ApiResponse::success(format!("Found {count} orders matching the filters"), views)?
            .with_count(count),
    ))
}

/// Static segments win over `/{table}/records`, so a table literally named
/// `order_details` or `orders_list` is not reachable through the generic routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/order_details/{order_id}", get(get_order_details))
        .route("/orders_list", post(list_orders))
}
