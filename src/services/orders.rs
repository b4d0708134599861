//! Order denormalization: order record + linked customer + linked garments.

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::formula;
use super::record::{ListQuery, Record};
use super::store::RecordStore;
use crate::error::ProxyResult;

pub const ORDER_TABLE: &str = "ORDERS";
pub const CUSTOMER_TABLE: &str = "CUSTOMERS";
pub const GARMENT_TABLE: &str = "GARMENTS";

/// Unique, human-facing order number field (e.g. "A-1001")
pub const ORDER_ID_FIELD: &str = "OrderID";
/// Linked-record field pointing at CUSTOMERS
pub const CUSTOMER_LINK_FIELD: &str = "CustomerID";
/// Linked-record field pointing at GARMENTS
pub const GARMENT_LINK_FIELD: &str = "GARMENTS";

/// An order with its linked records resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    /// The order, with the link fields removed
    pub order: Record,
    pub customer: Option<Record>,
    pub garments: Vec<Record>,
}

/// Resolve an order's customer and garments.
///
/// Only the first linked customer is fetched. Garments are fetched in a
/// single list call filtered on their record IDs.
pub async fn denormalize(order: Record, store: &dyn RecordStore) -> ProxyResult<OrderView> {
    let Record {
        id,
        created_time,
        mut fields,
    } = order;

    let customer_ids = linked_ids(fields.shift_remove(CUSTOMER_LINK_FIELD));
    let garment_ids = linked_ids(fields.shift_remove(GARMENT_LINK_FIELD));

    debug!(
        order_id = %id,
        customers = customer_ids.len(),
        garments = garment_ids.len(),
        "Resolving linked order records"
    );

    let customer = async {
        match customer_ids.first() {
            Some(customer_id) => store.get(CUSTOMER_TABLE, customer_id).await,
            None => Ok(None),
        }
    };

    let garments = async {
        match formula::record_id_in(&garment_ids) {
            Some(formula) => {
                store
                    .list(GARMENT_TABLE, ListQuery::filtered(Some(formula)))
                    .await
            }
            None => Ok(Vec::new()),
        }
    };

    let (customer, garments) = futures::try_join!(customer, garments)?;

    Ok(OrderView {
        order: Record {
            id,
            created_time,
            fields,
        },
        customer,
        garments,
    })
}

/// IDs held by a linked-record field; anything but an array of strings counts as no link
fn linked_ids(value: Option<JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                JsonValue::String(id) => Some(id),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
