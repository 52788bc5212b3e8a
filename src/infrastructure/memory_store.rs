use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::domain::cart::{Cart, CartStatus};
use crate::domain::errors::DomainError;
use crate::domain::inventory::Product;
use crate::domain::order::Order;
use crate::domain::ports::{OrderPage, ProductScope, Store, StoreTx};

#[derive(Debug, Default, Clone)]
struct State {
    products: HashMap<Uuid, Product>,
    carts: HashMap<Uuid, Cart>,
    orders: HashMap<Uuid, Order>,
    order_sequences: HashMap<i32, i64>,
}

/// Process-local store. Transactions run one at a time against a staged
/// copy of the state that replaces the shared state only on success.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_product(&self, product: Product) -> Result<(), DomainError> {
        self.with_state(|s| {
            s.products.insert(product.id, product);
        })
    }

    pub fn product(&self, id: Uuid) -> Result<Option<Product>, DomainError> {
        self.with_state(|s| s.products.get(&id).cloned())
    }

    pub fn order_count(&self) -> Result<usize, DomainError> {
        self.with_state(|s| s.orders.len())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> Result<T, DomainError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| DomainError::Internal("in-memory store lock poisoned".to_string()))?;
        Ok(f(&mut guard))
    }
}

impl Store for InMemoryStore {
    fn transaction<T, F>(&self, work: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, DomainError>,
    {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| DomainError::Internal("in-memory store lock poisoned".to_string()))?;
        let mut staged = guard.clone();
        let out = work(&mut MemoryTx { state: &mut staged })?;
        *guard = staged;
        Ok(out)
    }
}

struct MemoryTx<'a> {
    state: &'a mut State,
}

impl StoreTx for MemoryTx<'_> {
    fn find_product(
        &mut self,
        scope: ProductScope,
        id: Uuid,
    ) -> Result<Option<Product>, DomainError> {
        Ok(self
            .state
            .products
            .get(&id)
            .filter(|p| scope.admits(p))
            .cloned())
    }

    fn save_stock(&mut self, product: &Product, expected_stamp: Uuid) -> Result<bool, DomainError> {
        let Some(stored) = self.state.products.get_mut(&product.id) else {
            return Err(DomainError::NotFound("Product"));
        };
        if stored.concurrency_stamp != expected_stamp {
            return Ok(false);
        }
        stored.stock_quantity = product.stock_quantity;
        stored.concurrency_stamp = product.concurrency_stamp;
        Ok(true)
    }

    fn find_active_cart(&mut self, customer_id: Uuid) -> Result<Option<Cart>, DomainError> {
        Ok(self
            .state
            .carts
            .values()
            .find(|c| c.customer_id == customer_id && c.status == CartStatus::Active)
            .cloned())
    }

    fn find_cart(&mut self, id: Uuid) -> Result<Option<Cart>, DomainError> {
        Ok(self.state.carts.get(&id).cloned())
    }

    fn insert_cart(&mut self, cart: &Cart) -> Result<bool, DomainError> {
        if cart.status == CartStatus::Active && self.find_active_cart(cart.customer_id)?.is_some() {
            return Ok(false);
        }
        self.state.carts.insert(cart.id, cart.clone());
        Ok(true)
    }

    fn save_cart(&mut self, cart: &Cart) -> Result<(), DomainError> {
        if !self.state.carts.contains_key(&cart.id) {
            return Err(DomainError::NotFound("Cart"));
        }
        if cart.status == CartStatus::Active {
            if let Some(other) = self.find_active_cart(cart.customer_id)? {
                if other.id != cart.id {
                    return Err(DomainError::Internal(format!(
                        "customer {} already has active cart {}",
                        cart.customer_id, other.id
                    )));
                }
            }
        }
        self.state.carts.insert(cart.id, cart.clone());
        Ok(())
    }

    fn next_order_sequence(&mut self, year: i32) -> Result<i64, DomainError> {
        let seq = self.state.order_sequences.entry(year).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    fn insert_order(&mut self, order: &Order) -> Result<(), DomainError> {
        let paid_twice = self
            .state
            .orders
            .values()
            .any(|o| o.payment.transaction_id == order.payment.transaction_id);
        if paid_twice {
            return Err(DomainError::DuplicatePayment(
                order.payment.transaction_id.clone(),
            ));
        }
        let duplicate = self
            .state
            .orders
            .values()
            .any(|o| o.id == order.id || o.order_number == order.order_number);
        if duplicate {
            return Err(DomainError::Internal(format!(
                "order {} violates a uniqueness constraint",
                order.order_number
            )));
        }
        self.state.orders.insert(order.id, order.clone());
        Ok(())
    }

    fn update_order(&mut self, order: &Order) -> Result<(), DomainError> {
        let stored = self
            .state
            .orders
            .get_mut(&order.id)
            .ok_or(DomainError::NotFound("Order"))?;
        stored.status = order.status;
        stored.payment = order.payment.clone();
        stored.tracking_number = order.tracking_number.clone();
        stored.carrier = order.carrier.clone();
        stored.shipped_at = order.shipped_at;
        stored.delivered_at = order.delivered_at;
        stored.cancelled_at = order.cancelled_at;
        stored.cancellation_reason = order.cancellation_reason.clone();
        stored.updated_at = order.updated_at;
        Ok(())
    }

    fn find_order(&mut self, id: Uuid) -> Result<Option<Order>, DomainError> {
        Ok(self.state.orders.get(&id).cloned())
    }

    fn find_order_by_payment(&mut self, transaction_id: &str) -> Result<Option<Order>, DomainError> {
        Ok(self
            .state
            .orders
            .values()
            .find(|o| o.payment.transaction_id == transaction_id)
            .cloned())
    }

    fn list_orders_for_customer(
        &mut self,
        customer_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<OrderPage, DomainError> {
        let mut orders: Vec<Order> = self
            .state
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.order_number.cmp(&a.order_number));
        let total = orders.len() as i64;
        let skip = usize::try_from((page - 1).max(0) * limit).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(0);
        Ok(OrderPage {
            items: orders.into_iter().skip(skip).take(take).collect(),
            total,
        })
    }
}
