use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::ledger::InventoryLedger;
use crate::domain::errors::DomainError;
use crate::domain::events::{DomainEvent, StockChangeReason, StockChanged};
use crate::domain::order::Order;
use crate::domain::ports::{EventPublisher, OrderPage, Store, StoreTx};

pub struct OrderService<S> {
    store: S,
    events: Arc<dyn EventPublisher>,
    ledger: InventoryLedger,
}

impl<S: Store> OrderService<S> {
    pub fn new(store: S, events: Arc<dyn EventPublisher>, ledger: InventoryLedger) -> Self {
        Self {
            store,
            events,
            ledger,
        }
    }

    pub fn get_order(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        self.store.transaction(|tx| tx.find_order(id))
    }

    pub fn list_orders(
        &self,
        customer_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<OrderPage, DomainError> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        self.store
            .transaction(|tx| tx.list_orders_for_customer(customer_id, page, limit))
    }

    pub fn start_processing(&self, id: Uuid) -> Result<Order, DomainError> {
        self.transition(id, Order::start_processing)
    }

    pub fn ship(&self, id: Uuid, tracking_number: String, carrier: String) -> Result<Order, DomainError> {
        self.transition(id, |o| o.ship(tracking_number, carrier))
    }

    pub fn deliver(&self, id: Uuid) -> Result<Order, DomainError> {
        self.transition(id, Order::deliver)
    }

    pub fn refund(&self, id: Uuid) -> Result<Order, DomainError> {
        self.transition(id, Order::refund)
    }

    /// Cancels the order and, when its items were taken out of stock, puts
    /// them back within the same transaction.
    pub fn cancel(&self, id: Uuid, reason: String) -> Result<Order, DomainError> {
        let (order, restocked) = self.store.transaction(|tx| {
            let mut order = load(tx, id)?;
            let mut restocked = Vec::new();
            if order.cancel(reason)? {
                for item in &order.items {
                    let (product, movement) =
                        match self.ledger.restore(tx, item.product_id, item.quantity) {
                            Ok(restored) => restored,
                            Err(DomainError::NotFound(_)) => {
                                log::warn!(
                                    "Product {} of order {} no longer exists, not restocking",
                                    item.product_id,
                                    order.order_number
                                );
                                continue;
                            }
                            Err(e) => return Err(e),
                        };
                    restocked.push(StockChanged {
                        product_id: product.id,
                        shop_id: product.shop_id,
                        product_name: product.name.clone(),
                        sku: product.sku.clone(),
                        old_quantity: movement.old_quantity,
                        new_quantity: movement.new_quantity,
                        reason: StockChangeReason::OrderCancelled,
                        reference_id: order.id,
                        updated_at: Utc::now(),
                        is_low_stock: product.is_low_stock(),
                    });
                }
            }
            tx.update_order(&order)?;
            Ok((order, restocked))
        })?;

        log::info!(
            "Cancelled order {} ({} line(s) restocked)",
            order.order_number,
            restocked.len()
        );
        for event in restocked {
            let event = DomainEvent::StockChanged(event);
            if let Err(e) = self.events.publish(&event) {
                log::warn!(
                    "Dropping {} event for product {}: {}",
                    event.event_type(),
                    event.aggregate_id(),
                    e
                );
            }
        }
        Ok(order)
    }

    fn transition<F>(&self, id: Uuid, change: F) -> Result<Order, DomainError>
    where
        F: FnOnce(&mut Order) -> Result<(), DomainError>,
    {
        let order = self.store.transaction(|tx| {
            let mut order = load(tx, id)?;
            change(&mut order)?;
            tx.update_order(&order)?;
            Ok(order)
        })?;
        log::info!("Order {} is now {}", order.order_number, order.status);
        Ok(order)
    }
}

fn load(tx: &mut dyn StoreTx, id: Uuid) -> Result<Order, DomainError> {
    tx.find_order(id)?.ok_or(DomainError::NotFound("Order"))
}
