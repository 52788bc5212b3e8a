//! Order placement against the in-memory store.
//!
//!   cargo test --test checkout_test

mod common;

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{Datelike, Utc};
use checkout_service::application::cart_service::CartService;
use checkout_service::application::checkout_service::{CheckoutService, PlaceOrderErrorCode};
use checkout_service::domain::cart::CartStatus;
use checkout_service::domain::errors::DomainError;
use checkout_service::domain::events::{DomainEvent, StockChangeReason};
use checkout_service::domain::order::OrderStatus;
use checkout_service::domain::ports::{PaymentGateway, PaymentIntentStatus};
use checkout_service::infrastructure::memory_store::InMemoryStore;
use common::*;
use uuid::Uuid;

#[test]
fn places_order_and_deducts_stock() {
    let shop = shop();
    let p = product(5, "10.00");
    shop.store.upsert_product(p.clone()).expect("seed");
    let customer = Uuid::new_v4();
    shop.carts.add_item(customer, p.id, 3).expect("add to cart");

    let placed = shop.place(request(customer, "pi_happy")).expect("order placed");

    assert!(!placed.replayed);
    assert_eq!(placed.total, money("38.39"));
    assert_eq!(placed.currency, "USD");
    assert_eq!(placed.order_number.year(), Utc::now().year());
    assert_eq!(placed.order_number.sequence(), 1);
    assert_eq!(stock_of(&shop.store, p.id), 2);

    let order = shop
        .orders
        .get_order(placed.order_id)
        .expect("read")
        .expect("order stored");
    assert_eq!(order.status, OrderStatus::PaymentConfirmed);
    assert_eq!(order.totals.subtotal, money("30.00"));
    assert_eq!(order.totals.tax, money("2.40"));
    assert_eq!(order.totals.shipping, money("5.99"));
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 3);
    assert_eq!(order.payment.transaction_id, "pi_happy");
    assert_eq!(order.payment.amount, money("38.39"));
    assert_eq!(order.payment.currency, "USD");
    assert_eq!(order.payment.card_last4.as_deref(), Some("4242"));

    // The checked-out cart is retired; the customer starts over.
    let fresh = shop.carts.get_or_create(customer).expect("cart");
    assert!(fresh.is_empty());
    assert_eq!(fresh.status, CartStatus::Active);
}

#[test]
fn publishes_stock_and_order_events_after_commit() {
    let shop = shop();
    let p = product(3, "4.50");
    shop.store.upsert_product(p.clone()).expect("seed");
    let customer = Uuid::new_v4();
    shop.carts.add_item(customer, p.id, 2).expect("add to cart");

    let placed = shop.place(request(customer, "pi_events")).expect("order placed");

    let events = shop.events.events();
    assert_eq!(events.len(), 2);
    match &events[0] {
        DomainEvent::StockChanged(e) => {
            assert_eq!(e.product_id, p.id);
            assert_eq!((e.old_quantity, e.new_quantity), (3, 1));
            assert_eq!(e.reason, StockChangeReason::OrderPlaced);
            assert_eq!(e.reference_id, placed.order_id);
            assert!(e.is_low_stock);
        }
        other => panic!("expected StockChanged, got {:?}", other),
    }
    match &events[1] {
        DomainEvent::OrderPlaced(e) => {
            assert_eq!(e.order_id, placed.order_id);
            assert_eq!(e.shop_ids, vec![p.shop_id]);
            assert_eq!(e.order_number, placed.order_number.to_string());
        }
        other => panic!("expected OrderPlaced, got {:?}", other),
    }
}

#[test]
fn order_spanning_shops_lists_every_shop() {
    let shop = shop();
    let bowl = product(5, "12.00");
    let plate = product(5, "8.00");
    shop.store.upsert_product(bowl.clone()).expect("seed");
    shop.store.upsert_product(plate.clone()).expect("seed");
    let customer = Uuid::new_v4();
    shop.carts.add_item(customer, bowl.id, 1).expect("add");
    shop.carts.add_item(customer, plate.id, 2).expect("add");

    let placed = shop.place(request(customer, "pi_two_shops")).expect("order placed");

    let order = shop
        .orders
        .get_order(placed.order_id)
        .expect("read")
        .expect("order stored");
    assert_eq!(order.shop_ids().len(), 2);
    assert_eq!(order.totals.subtotal, money("28.00"));
    assert_eq!(stock_of(&shop.store, bowl.id), 4);
    assert_eq!(stock_of(&shop.store, plate.id), 3);
}

#[test]
fn insufficient_stock_leaves_everything_untouched() {
    let shop = shop();
    let p = product(5, "10.00");
    shop.store.upsert_product(p.clone()).expect("seed");
    let customer = Uuid::new_v4();
    shop.carts.add_item(customer, p.id, 3).expect("add to cart");
    // Someone else bought most of the stock in the meantime.
    shop.store
        .upsert_product(checkout_service::domain::inventory::Product {
            stock_quantity: 2,
            ..p.clone()
        })
        .expect("restock");

    let err = shop.place(request(customer, "pi_short")).expect_err("should fail");

    assert_eq!(err.code, PlaceOrderErrorCode::InsufficientStock);
    assert_eq!(stock_of(&shop.store, p.id), 2);
    assert_eq!(shop.store.order_count().expect("count"), 0);
    let cart = shop.carts.get_or_create(customer).expect("cart");
    assert_eq!(cart.total_items(), 3);
    assert!(shop.events.events().is_empty());
}

#[test]
fn unpaid_intent_is_rejected_before_stock_moves() {
    let shop = Shop::with(InMemoryStore::new(), FakeGateway::declining());
    let p = product(5, "10.00");
    shop.store.upsert_product(p.clone()).expect("seed");
    let customer = Uuid::new_v4();
    shop.carts.add_item(customer, p.id, 1).expect("add to cart");

    let err = shop.place(request(customer, "pi_declined")).expect_err("should fail");

    assert_eq!(err.code, PlaceOrderErrorCode::PaymentNotConfirmed);
    assert!(err.message.contains("declined"));
    assert_eq!(stock_of(&shop.store, p.id), 5);
    assert_eq!(shop.store.order_count().expect("count"), 0);
}

#[test]
fn empty_cart_never_reaches_the_gateway() {
    let shop = shop();
    let customer = Uuid::new_v4();
    shop.carts.get_or_create(customer).expect("cart");

    let err = shop.place(request(customer, "pi_empty")).expect_err("should fail");

    assert_eq!(err.code, PlaceOrderErrorCode::EmptyCart);
    assert_eq!(shop.gateway.calls(), 0);
}

#[test]
fn customer_without_cart_gets_empty_cart() {
    let shop = shop();
    let err = shop.place(request(Uuid::new_v4(), "pi_nobody")).expect_err("should fail");
    assert_eq!(err.code, PlaceOrderErrorCode::EmptyCart);
}

#[test]
fn invalid_shipping_address_is_rejected() {
    let shop = shop();
    let p = product(5, "10.00");
    shop.store.upsert_product(p.clone()).expect("seed");
    let customer = Uuid::new_v4();
    shop.carts.add_item(customer, p.id, 1).expect("add to cart");

    let mut req = request(customer, "pi_bad_address");
    req.shipping_address.country_code = "gbr".to_string();
    let err = shop.place(req).expect_err("should fail");

    assert_eq!(err.code, PlaceOrderErrorCode::InvalidAddress);
    assert_eq!(shop.gateway.calls(), 0);
}

#[test]
fn unpublished_product_blocks_checkout() {
    let shop = shop();
    let p = product(5, "10.00");
    shop.store.upsert_product(p.clone()).expect("seed");
    let customer = Uuid::new_v4();
    shop.carts.add_item(customer, p.id, 1).expect("add to cart");
    shop.store
        .upsert_product(checkout_service::domain::inventory::Product {
            is_published: false,
            ..p.clone()
        })
        .expect("unpublish");

    let err = shop.place(request(customer, "pi_unpublished")).expect_err("should fail");

    assert_eq!(err.code, PlaceOrderErrorCode::ProductNotAvailable);
    assert_eq!(stock_of(&shop.store, p.id), 5);
}

#[test]
fn same_payment_intent_returns_the_existing_order() {
    let shop = shop();
    let p = product(5, "10.00");
    shop.store.upsert_product(p.clone()).expect("seed");
    let customer = Uuid::new_v4();
    shop.carts.add_item(customer, p.id, 1).expect("add to cart");

    let first = shop.place(request(customer, "pi_retry")).expect("order placed");
    let second = shop.place(request(customer, "pi_retry")).expect("replay");

    assert!(second.replayed);
    assert_eq!(second.order_id, first.order_id);
    assert_eq!(second.order_number, first.order_number);
    assert_eq!(shop.store.order_count().expect("count"), 1);
    assert_eq!(stock_of(&shop.store, p.id), 4);
}

#[test]
fn order_numbers_increase_across_customers() {
    let shop = shop();
    let p = product(10, "1.00");
    shop.store.upsert_product(p.clone()).expect("seed");

    let mut numbers = Vec::new();
    for i in 0..3 {
        let customer = Uuid::new_v4();
        shop.carts.add_item(customer, p.id, 1).expect("add");
        let placed = shop.place(request(customer, &format!("pi_seq_{}", i))).expect("order placed");
        numbers.push(placed.order_number);
    }

    assert_eq!(
        numbers.iter().map(|n| n.sequence()).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(numbers.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(numbers[0].to_string(), format!("ORD-{:04}-000001", Utc::now().year()));
}

#[test]
fn publisher_outage_does_not_fail_the_order() {
    let store = InMemoryStore::new();
    let gateway = FakeGateway::approving();
    gateway.capture("pi_no_broker", "16.79", "USD");
    let checkout = CheckoutService::new(
        store.clone(),
        gateway,
        Arc::new(FailingPublisher),
        settings(),
    );
    let carts = CartService::new(store.clone());
    let p = product(2, "10.00");
    store.upsert_product(p.clone()).expect("seed");
    let customer = Uuid::new_v4();
    carts.add_item(customer, p.id, 1).expect("add");

    let placed = checkout
        .place_order(request(customer, "pi_no_broker"))
        .expect("order placed despite publisher failure");

    assert!(!placed.replayed);
    assert_eq!(stock_of(&store, p.id), 1);
    assert_eq!(store.order_count().expect("count"), 1);
}

#[test]
fn failure_on_a_later_line_rolls_back_earlier_deductions() {
    let inner = InMemoryStore::new();
    let first = product(5, "10.00");
    let second = product(5, "10.00");
    inner.upsert_product(first.clone()).expect("seed");
    inner.upsert_product(second.clone()).expect("seed");
    let shop = Shop::with(
        FaultyStore::failing_writes_for(inner.clone(), second.id),
        FakeGateway::approving(),
    );
    let customer = Uuid::new_v4();
    shop.carts.add_item(customer, first.id, 2).expect("add");
    shop.carts.add_item(customer, second.id, 1).expect("add");

    let err = shop.place(request(customer, "pi_disk_full")).expect_err("should fail");

    assert_eq!(err.code, PlaceOrderErrorCode::Unknown);
    assert!(!err.message.contains("disk full"));
    assert_eq!(stock_of(&inner, first.id), 5);
    assert_eq!(stock_of(&inner, second.id), 5);
    assert_eq!(inner.order_count().expect("count"), 0);
    let cart = shop.carts.get_or_create(customer).expect("cart");
    assert_eq!(cart.items.len(), 2);
}

#[test]
fn stock_conflicts_are_retried() {
    let inner = InMemoryStore::new();
    let p = product(5, "10.00");
    inner.upsert_product(p.clone()).expect("seed");
    let shop = Shop::with(
        FaultyStore::with_conflicts(inner.clone(), 2),
        FakeGateway::approving(),
    );
    let customer = Uuid::new_v4();
    shop.carts.add_item(customer, p.id, 1).expect("add");

    shop.place(request(customer, "pi_contended")).expect("order placed after retries");

    assert_eq!(stock_of(&inner, p.id), 4);
}

#[test]
fn persistent_conflicts_surface_as_concurrency_conflict() {
    let inner = InMemoryStore::new();
    let p = product(5, "10.00");
    inner.upsert_product(p.clone()).expect("seed");
    let shop = Shop::with(
        FaultyStore::with_conflicts(inner.clone(), 3),
        FakeGateway::approving(),
    );
    let customer = Uuid::new_v4();
    shop.carts.add_item(customer, p.id, 1).expect("add");

    let err = shop.place(request(customer, "pi_hot_product")).expect_err("should fail");

    assert_eq!(err.code, PlaceOrderErrorCode::ConcurrencyConflict);
    assert_eq!(stock_of(&inner, p.id), 5);
    assert_eq!(inner.order_count().expect("count"), 0);
}

#[test]
fn line_taxes_add_up_to_the_order_tax() {
    let shop = shop();
    let customer = Uuid::new_v4();
    for _ in 0..3 {
        let p = product(5, "5.05");
        shop.store.upsert_product(p.clone()).expect("seed");
        shop.carts.add_item(customer, p.id, 1).expect("add");
    }

    let placed = shop.place(request(customer, "pi_cents")).expect("order placed");

    let order = shop
        .orders
        .get_order(placed.order_id)
        .expect("read")
        .expect("order stored");
    assert_eq!(order.totals.tax, money("1.21"));
    let line_tax: BigDecimal = order.items.iter().map(|i| &i.tax_amount).sum();
    assert_eq!(line_tax, order.totals.tax);
}

#[test]
fn intent_paying_less_than_the_total_is_rejected() {
    let shop = shop();
    let p = product(5, "10.00");
    shop.store.upsert_product(p.clone()).expect("seed");
    let customer = Uuid::new_v4();
    shop.carts.add_item(customer, p.id, 1).expect("add");
    shop.gateway.capture("pi_one_dollar", "1.00", "USD");

    let err = shop.place(request(customer, "pi_one_dollar")).expect_err("should fail");

    assert_eq!(err.code, PlaceOrderErrorCode::PaymentFailed);
    assert_eq!(stock_of(&shop.store, p.id), 5);
    assert_eq!(shop.store.order_count().expect("count"), 0);
}

#[test]
fn intent_in_another_currency_is_rejected() {
    let shop = shop();
    let p = product(5, "10.00");
    shop.store.upsert_product(p.clone()).expect("seed");
    let customer = Uuid::new_v4();
    shop.carts.add_item(customer, p.id, 1).expect("add");
    shop.gateway.capture("pi_euros", "16.79", "EUR");

    let err = shop.place(request(customer, "pi_euros")).expect_err("should fail");

    assert_eq!(err.code, PlaceOrderErrorCode::PaymentFailed);
    assert_eq!(shop.store.order_count().expect("count"), 0);
}

/// Adds a line to the customer's cart while the payment is being looked up,
/// then reports a payment for the cart as it was before.
struct CartEditingGateway {
    carts: CartService<InMemoryStore>,
    customer: Uuid,
    extra_product: Uuid,
}

impl PaymentGateway for CartEditingGateway {
    fn payment_intent_status(&self, _intent_id: &str) -> Result<PaymentIntentStatus, DomainError> {
        self.carts.add_item(self.customer, self.extra_product, 2)?;
        Ok(PaymentIntentStatus {
            is_succeeded: true,
            amount: money("16.79"),
            currency: "USD".to_string(),
            ..Default::default()
        })
    }
}

#[test]
fn cart_edited_during_payment_check_is_not_checked_out() {
    let store = InMemoryStore::new();
    let ordered = product(5, "10.00");
    let added_late = product(5, "3.00");
    store.upsert_product(ordered.clone()).expect("seed");
    store.upsert_product(added_late.clone()).expect("seed");
    let customer = Uuid::new_v4();
    let carts = CartService::new(store.clone());
    carts.add_item(customer, ordered.id, 1).expect("add");

    let checkout = CheckoutService::new(
        store.clone(),
        Arc::new(CartEditingGateway {
            carts: CartService::new(store.clone()),
            customer,
            extra_product: added_late.id,
        }),
        Arc::new(RecordingPublisher::default()),
        settings(),
    );

    let err = checkout
        .place_order(request(customer, "pi_moving_cart"))
        .expect_err("should fail");

    assert_eq!(err.code, PlaceOrderErrorCode::ConcurrencyConflict);
    assert_eq!(store.order_count().expect("count"), 0);
    assert_eq!(stock_of(&store, ordered.id), 5);
    assert_eq!(stock_of(&store, added_late.id), 5);
    let cart = carts.get_or_create(customer).expect("cart");
    assert_eq!(cart.status, CartStatus::Active);
    assert_eq!(cart.items.len(), 2);
}
