#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bigdecimal::BigDecimal;
use checkout_service::application::cart_service::CartService;
use checkout_service::application::checkout_service::{
    CheckoutService, CheckoutSettings, PlaceOrderError, PlaceOrderRequest, PlacedOrder,
};
use checkout_service::application::ledger::InventoryLedger;
use checkout_service::application::order_service::OrderService;
use checkout_service::domain::cart::Cart;
use checkout_service::domain::errors::DomainError;
use checkout_service::domain::events::DomainEvent;
use checkout_service::domain::inventory::Product;
use checkout_service::domain::order::{Address, Order};
use checkout_service::domain::ports::{
    EventPublisher, OrderPage, PaymentGateway, PaymentIntentStatus, ProductScope, Store, StoreTx,
};
use checkout_service::domain::pricing::{PricingPolicy, ShippingPolicy};
use checkout_service::infrastructure::memory_store::InMemoryStore;
use uuid::Uuid;

pub fn money(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).expect("valid decimal")
}

pub fn product(stock: i32, price: &str) -> Product {
    Product {
        id: Uuid::new_v4(),
        shop_id: Uuid::new_v4(),
        name: "Stoneware bowl".to_string(),
        sku: format!("BOWL-{}", &Uuid::new_v4().simple().to_string()[..6]),
        image_url: None,
        price: money(price),
        stock_quantity: stock,
        low_stock_threshold: 2,
        is_active: true,
        is_published: true,
        concurrency_stamp: Uuid::new_v4(),
    }
}

pub fn address() -> Address {
    Address {
        full_name: "Ada Lovelace".to_string(),
        line1: "12 St James's Square".to_string(),
        line2: None,
        city: "London".to_string(),
        region: None,
        postal_code: "SW1Y 4JH".to_string(),
        country_code: "GB".to_string(),
        phone: None,
    }
}

pub fn request(customer_id: Uuid, payment_intent_id: &str) -> PlaceOrderRequest {
    PlaceOrderRequest {
        customer_id,
        payment_intent_id: payment_intent_id.to_string(),
        shipping_address: address(),
        billing_address: None,
        customer_notes: None,
    }
}

pub fn settings() -> CheckoutSettings {
    CheckoutSettings {
        pricing: PricingPolicy {
            tax_rate: money("0.08"),
            shipping: ShippingPolicy {
                flat_rate: money("5.99"),
                free_threshold: None,
            },
        },
        currency: "USD".to_string(),
        stock_retry_attempts: 3,
    }
}

// ── Gateway fakes ────────────────────────────────────────────────────────────

/// Approving gateways report whatever was captured for an intent, or a zero
/// USD capture for intents nobody set up.
pub struct FakeGateway {
    succeeded: bool,
    captures: Mutex<HashMap<String, (BigDecimal, String)>>,
    calls: AtomicUsize,
}

impl FakeGateway {
    pub fn approving() -> Arc<Self> {
        Arc::new(Self {
            succeeded: true,
            captures: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn declining() -> Arc<Self> {
        Arc::new(Self {
            succeeded: false,
            captures: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn capture(&self, intent_id: &str, amount: &str, currency: &str) {
        self.captures
            .lock()
            .expect("lock")
            .insert(intent_id.to_string(), (money(amount), currency.to_string()));
    }

    fn capture_if_unset(&self, intent_id: &str, amount: BigDecimal) {
        self.captures
            .lock()
            .expect("lock")
            .entry(intent_id.to_string())
            .or_insert((amount, "USD".to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PaymentGateway for FakeGateway {
    fn payment_intent_status(&self, intent_id: &str) -> Result<PaymentIntentStatus, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.succeeded {
            return Ok(PaymentIntentStatus {
                error_message: Some("Your card was declined.".to_string()),
                ..Default::default()
            });
        }
        let (amount, currency) = self
            .captures
            .lock()
            .expect("lock")
            .get(intent_id)
            .cloned()
            .unwrap_or_else(|| (BigDecimal::from(0), "USD".to_string()));
        Ok(PaymentIntentStatus {
            is_succeeded: true,
            amount,
            currency,
            payment_method: Some("card".to_string()),
            card_last4: Some("4242".to_string()),
            card_brand: Some("visa".to_string()),
            error_message: None,
        })
    }
}

// ── Publisher fakes ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().expect("lock").clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: &DomainEvent) -> Result<(), DomainError> {
        self.events.lock().expect("lock").push(event.clone());
        Ok(())
    }
}

pub struct FailingPublisher;

impl EventPublisher for FailingPublisher {
    fn publish(&self, _event: &DomainEvent) -> Result<(), DomainError> {
        Err(DomainError::Internal("broker unreachable".to_string()))
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub struct Shop<S: Store + Clone> {
    pub store: S,
    pub carts: CartService<S>,
    pub checkout: CheckoutService<S>,
    pub orders: OrderService<S>,
    pub gateway: Arc<FakeGateway>,
    pub events: Arc<RecordingPublisher>,
}

impl<S: Store + Clone> Shop<S> {
    pub fn with(store: S, gateway: Arc<FakeGateway>) -> Self {
        let events = Arc::new(RecordingPublisher::default());
        Self {
            carts: CartService::new(store.clone()),
            checkout: CheckoutService::new(
                store.clone(),
                gateway.clone(),
                events.clone(),
                settings(),
            ),
            orders: OrderService::new(store.clone(), events.clone(), InventoryLedger::new(3)),
            store,
            gateway,
            events,
        }
    }
}

impl<S: Store + Clone> Shop<S> {
    /// Places the order the way a paying customer would: the intent captures
    /// the quoted total of the customer's cart unless a test captured
    /// something else for it first.
    pub fn place(&self, req: PlaceOrderRequest) -> Result<PlacedOrder, PlaceOrderError> {
        let cart = self
            .store
            .transaction(|tx| tx.find_active_cart(req.customer_id))
            .expect("read cart");
        if let Some(cart) = cart {
            let quote = settings()
                .pricing
                .quote(&cart.subtotal(), &BigDecimal::from(0));
            self.gateway
                .capture_if_unset(&req.payment_intent_id, quote.total);
        }
        self.checkout.place_order(req)
    }
}

pub fn shop() -> Shop<InMemoryStore> {
    Shop::with(InMemoryStore::new(), FakeGateway::approving())
}

pub fn stock_of(store: &InMemoryStore, id: Uuid) -> i32 {
    store
        .product(id)
        .expect("read")
        .expect("product exists")
        .stock_quantity
}

// ── Fault injection ──────────────────────────────────────────────────────────

/// Wraps [`InMemoryStore`] and sabotages stock writes: writes for
/// `broken_product` fail outright, and the first `conflicts` writes report a
/// lost compare-and-swap without touching anything.
#[derive(Clone)]
pub struct FaultyStore {
    pub inner: InMemoryStore,
    broken_product: Option<Uuid>,
    conflicts: Arc<AtomicU32>,
}

impl FaultyStore {
    pub fn failing_writes_for(inner: InMemoryStore, product_id: Uuid) -> Self {
        Self {
            inner,
            broken_product: Some(product_id),
            conflicts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn with_conflicts(inner: InMemoryStore, conflicts: u32) -> Self {
        Self {
            inner,
            broken_product: None,
            conflicts: Arc::new(AtomicU32::new(conflicts)),
        }
    }
}

impl Store for FaultyStore {
    fn transaction<T, F>(&self, work: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, DomainError>,
    {
        self.inner.transaction(|tx| {
            work(&mut FaultyTx {
                inner: tx,
                broken_product: self.broken_product,
                conflicts: &self.conflicts,
            })
        })
    }
}

struct FaultyTx<'a> {
    inner: &'a mut dyn StoreTx,
    broken_product: Option<Uuid>,
    conflicts: &'a AtomicU32,
}

impl StoreTx for FaultyTx<'_> {
    fn find_product(
        &mut self,
        scope: ProductScope,
        id: Uuid,
    ) -> Result<Option<Product>, DomainError> {
        self.inner.find_product(scope, id)
    }

    fn save_stock(&mut self, product: &Product, expected_stamp: Uuid) -> Result<bool, DomainError> {
        if self.broken_product == Some(product.id) {
            return Err(DomainError::Internal("disk full".to_string()));
        }
        let lost = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            return Ok(false);
        }
        self.inner.save_stock(product, expected_stamp)
    }

    fn find_active_cart(&mut self, customer_id: Uuid) -> Result<Option<Cart>, DomainError> {
        self.inner.find_active_cart(customer_id)
    }

    fn find_cart(&mut self, id: Uuid) -> Result<Option<Cart>, DomainError> {
        self.inner.find_cart(id)
    }

    fn insert_cart(&mut self, cart: &Cart) -> Result<bool, DomainError> {
        self.inner.insert_cart(cart)
    }

    fn save_cart(&mut self, cart: &Cart) -> Result<(), DomainError> {
        self.inner.save_cart(cart)
    }

    fn next_order_sequence(&mut self, year: i32) -> Result<i64, DomainError> {
        self.inner.next_order_sequence(year)
    }

    fn insert_order(&mut self, order: &Order) -> Result<(), DomainError> {
        self.inner.insert_order(order)
    }

    fn update_order(&mut self, order: &Order) -> Result<(), DomainError> {
        self.inner.update_order(order)
    }

    fn find_order(&mut self, id: Uuid) -> Result<Option<Order>, DomainError> {
        self.inner.find_order(id)
    }

    fn find_order_by_payment(&mut self, transaction_id: &str) -> Result<Option<Order>, DomainError> {
        self.inner.find_order_by_payment(transaction_id)
    }

    fn list_orders_for_customer(
        &mut self,
        customer_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<OrderPage, DomainError> {
        self.inner.list_orders_for_customer(customer_id, page, limit)
    }
}
