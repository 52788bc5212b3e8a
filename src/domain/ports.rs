use bigdecimal::BigDecimal;
use uuid::Uuid;

use super::cart::Cart;
use super::errors::DomainError;
use super::events::DomainEvent;
use super::inventory::Product;
use super::order::Order;

/// Which catalog rows a lookup may see. Carts and orders span shops, so
/// checkout reads products `Unscoped`; seller-facing reads pass their shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductScope {
    Unscoped,
    Shop(Uuid),
}

impl ProductScope {
    pub fn admits(&self, product: &Product) -> bool {
        match self {
            ProductScope::Unscoped => true,
            ProductScope::Shop(shop_id) => product.shop_id == *shop_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub items: Vec<Order>,
    pub total: i64,
}

/// Storage operations available inside one unit of work.
pub trait StoreTx {
    fn find_product(&mut self, scope: ProductScope, id: Uuid)
        -> Result<Option<Product>, DomainError>;

    /// Persists `product`'s stock and stamp only if the stored stamp still
    /// equals `expected_stamp`. Returns `false` when another writer got there
    /// first.
    fn save_stock(&mut self, product: &Product, expected_stamp: Uuid) -> Result<bool, DomainError>;

    fn find_active_cart(&mut self, customer_id: Uuid) -> Result<Option<Cart>, DomainError>;
    fn find_cart(&mut self, id: Uuid) -> Result<Option<Cart>, DomainError>;
    /// Returns `false`, writing nothing, when the customer already has an
    /// active cart.
    fn insert_cart(&mut self, cart: &Cart) -> Result<bool, DomainError>;
    fn save_cart(&mut self, cart: &Cart) -> Result<(), DomainError>;

    /// Next sequence value for `year`, starting at 1.
    fn next_order_sequence(&mut self, year: i32) -> Result<i64, DomainError>;

    fn insert_order(&mut self, order: &Order) -> Result<(), DomainError>;
    /// Writes status and fulfilment fields only; the snapshot stays as inserted.
    fn update_order(&mut self, order: &Order) -> Result<(), DomainError>;
    fn find_order(&mut self, id: Uuid) -> Result<Option<Order>, DomainError>;
    fn find_order_by_payment(&mut self, transaction_id: &str) -> Result<Option<Order>, DomainError>;
    fn list_orders_for_customer(
        &mut self,
        customer_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<OrderPage, DomainError>;
}

pub trait Store: Send + Sync + 'static {
    /// Runs `work` atomically: its writes are committed together when it
    /// returns `Ok` and discarded entirely when it returns `Err`.
    fn transaction<T, F>(&self, work: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, DomainError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentIntentStatus {
    pub is_succeeded: bool,
    /// Amount the intent captured, in major units.
    pub amount: BigDecimal,
    /// ISO 4217 code as reported by the gateway.
    pub currency: String,
    pub payment_method: Option<String>,
    pub card_last4: Option<String>,
    pub card_brand: Option<String>,
    pub error_message: Option<String>,
}

pub trait PaymentGateway: Send + Sync + 'static {
    fn payment_intent_status(&self, intent_id: &str) -> Result<PaymentIntentStatus, DomainError>;
}

pub trait EventPublisher: Send + Sync + 'static {
    fn publish(&self, event: &DomainEvent) -> Result<(), DomainError>;
}
