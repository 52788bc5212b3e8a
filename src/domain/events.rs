use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::order::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StockChangeReason {
    OrderPlaced,
    OrderCancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockChanged {
    pub product_id: Uuid,
    pub shop_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub old_quantity: i32,
    pub new_quantity: i32,
    pub reason: StockChangeReason,
    /// The order that caused the change.
    pub reference_id: Uuid,
    pub updated_at: DateTime<Utc>,
    pub is_low_stock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderPlacedItem {
    pub product_id: Uuid,
    pub shop_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub line_total: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderPlaced {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub shop_ids: Vec<Uuid>,
    pub order_number: String,
    pub total_amount: BigDecimal,
    pub currency: String,
    pub placed_at: DateTime<Utc>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub items: Vec<OrderPlacedItem>,
}

impl OrderPlaced {
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id,
            customer_id: order.customer_id,
            shop_ids: order.shop_ids(),
            order_number: order.order_number.to_string(),
            total_amount: order.totals.total.clone(),
            currency: order.currency.clone(),
            placed_at: order.placed_at,
            customer_email: None,
            customer_name: Some(order.shipping_address.full_name.clone()),
            items: order
                .items
                .iter()
                .map(|i| OrderPlacedItem {
                    product_id: i.product_id,
                    shop_id: i.shop_id,
                    product_name: i.product_name.clone(),
                    sku: i.sku.clone(),
                    quantity: i.quantity,
                    unit_price: i.unit_price.clone(),
                    line_total: i.line_total.clone(),
                })
                .collect(),
        }
    }
}

/// Everything this service announces to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    StockChanged(StockChanged),
    OrderPlaced(OrderPlaced),
}

impl DomainEvent {
    pub fn aggregate_type(&self) -> &'static str {
        match self {
            DomainEvent::StockChanged(_) => "Product",
            DomainEvent::OrderPlaced(_) => "Order",
        }
    }

    pub fn aggregate_id(&self) -> Uuid {
        match self {
            DomainEvent::StockChanged(e) => e.product_id,
            DomainEvent::OrderPlaced(e) => e.order_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::StockChanged(_) => "StockChanged",
            DomainEvent::OrderPlaced(_) => "OrderPlaced",
        }
    }
}
