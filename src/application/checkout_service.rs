//! Order placement.
//!
//! Validation (cart, payment, catalog) runs before anything is written. The
//! mutating part, which allocates the order number, deducts stock line by
//! line, inserts the order and checks the cart out, runs as a single
//! [`Store::transaction`], so a failure on any line leaves neither an order
//! nor partial deductions behind. Events go out after commit and may be lost.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{Datelike, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::ledger::InventoryLedger;
use crate::domain::errors::DomainError;
use crate::domain::events::{DomainEvent, OrderPlaced, StockChangeReason, StockChanged};
use crate::domain::order::{Address, NewOrder, Order, OrderNumber, PaymentSnapshot};
use crate::domain::ports::{EventPublisher, PaymentGateway, ProductScope, Store};
use crate::domain::pricing::PricingPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaceOrderErrorCode {
    Unknown,
    EmptyCart,
    PaymentFailed,
    PaymentNotConfirmed,
    InsufficientStock,
    ProductNotAvailable,
    ConcurrencyConflict,
    InvalidAddress,
}

#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct PlaceOrderError {
    pub code: PlaceOrderErrorCode,
    pub message: String,
}

const GENERIC_FAILURE: &str = "Something went wrong while placing your order. Please try again.";

impl PlaceOrderError {
    fn new(code: PlaceOrderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<DomainError> for PlaceOrderError {
    fn from(e: DomainError) -> Self {
        use PlaceOrderErrorCode as Code;
        let code = match &e {
            DomainError::EmptyCart | DomainError::CartNotActive => Code::EmptyCart,
            DomainError::PaymentFailed(_) => Code::PaymentFailed,
            DomainError::PaymentNotConfirmed(_) => Code::PaymentNotConfirmed,
            DomainError::InsufficientStock { .. } => Code::InsufficientStock,
            DomainError::ProductNotAvailable { .. } | DomainError::NotFound(_) => {
                Code::ProductNotAvailable
            }
            DomainError::ConcurrencyConflict { .. } | DomainError::CartChanged { .. } => {
                Code::ConcurrencyConflict
            }
            DomainError::InvalidAddress(_) => Code::InvalidAddress,
            DomainError::InvalidInput(_)
            | DomainError::DuplicatePayment(_)
            | DomainError::InvalidOrderStatusTransition { .. }
            | DomainError::OrderFrozen
            | DomainError::Internal(_) => return Self::new(Code::Unknown, GENERIC_FAILURE),
        };
        Self::new(code, e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub customer_id: Uuid,
    pub payment_intent_id: String,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub customer_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order_id: Uuid,
    pub order_number: OrderNumber,
    pub total: BigDecimal,
    pub currency: String,
    /// The payment intent had already produced this order; nothing was written.
    pub replayed: bool,
}

impl PlacedOrder {
    fn of(order: &Order, replayed: bool) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number.clone(),
            total: order.totals.total.clone(),
            currency: order.currency.clone(),
            replayed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub pricing: PricingPolicy,
    pub currency: String,
    pub stock_retry_attempts: u32,
}

pub struct CheckoutService<S> {
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    events: Arc<dyn EventPublisher>,
    settings: CheckoutSettings,
    ledger: InventoryLedger,
}

enum Placement {
    Placed(Order, Vec<StockChanged>),
    Existing(Order),
}

impl<S: Store> CheckoutService<S> {
    pub fn new(
        store: S,
        gateway: Arc<dyn PaymentGateway>,
        events: Arc<dyn EventPublisher>,
        settings: CheckoutSettings,
    ) -> Self {
        let ledger = InventoryLedger::new(settings.stock_retry_attempts);
        Self {
            store,
            gateway,
            events,
            settings,
            ledger,
        }
    }

    pub fn place_order(&self, req: PlaceOrderRequest) -> Result<PlacedOrder, PlaceOrderError> {
        let customer_id = req.customer_id;
        match self.try_place_order(req) {
            Ok(placed) => Ok(placed),
            Err(e @ DomainError::Internal(_)) | Err(e @ DomainError::InvalidInput(_)) => {
                log::error!("Order placement for customer {} failed: {}", customer_id, e);
                Err(e.into())
            }
            Err(e) => {
                log::info!("Order placement for customer {} rejected: {}", customer_id, e);
                Err(e.into())
            }
        }
    }

    fn try_place_order(&self, req: PlaceOrderRequest) -> Result<PlacedOrder, DomainError> {
        req.shipping_address.validate()?;
        if let Some(billing) = &req.billing_address {
            billing.validate()?;
        }

        if let Some(existing) = self
            .store
            .transaction(|tx| tx.find_order_by_payment(&req.payment_intent_id))?
        {
            log::info!(
                "Payment intent {} already produced order {}",
                req.payment_intent_id,
                existing.order_number
            );
            return Ok(PlacedOrder::of(&existing, true));
        }

        let cart = self
            .store
            .transaction(|tx| tx.find_active_cart(req.customer_id))?
            .filter(|c| !c.is_empty())
            .ok_or(DomainError::EmptyCart)?;

        let totals = self
            .settings
            .pricing
            .quote(&cart.subtotal(), &BigDecimal::from(0));
        let payment = self.confirmed_payment(&req.payment_intent_id, &totals.total)?;

        self.store.transaction(|tx| {
            for item in &cart.items {
                let product = tx
                    .find_product(ProductScope::Unscoped, item.product_id)?
                    .filter(|p| p.is_available())
                    .ok_or_else(|| DomainError::ProductNotAvailable {
                        product_id: item.product_id,
                        name: item.product_name.clone(),
                    })?;
                if !product.has_stock_for(item.quantity) {
                    return Err(DomainError::InsufficientStock {
                        product_id: product.id,
                        name: product.name,
                        available: product.stock_quantity,
                        requested: item.quantity,
                    });
                }
            }
            Ok(())
        })?;

        let line_totals: Vec<BigDecimal> = cart.items.iter().map(|i| i.line_total()).collect();
        let line_taxes = self.settings.pricing.allocate_tax(&totals.tax, &line_totals);
        let customer_notes = req.customer_notes.or_else(|| cart.notes.clone());

        let placed = self.store.transaction(|tx| {
            // Locked before the payment lookup so a concurrent placement of
            // this cart is either fully visible or not started.
            let mut current = tx
                .find_cart(cart.id)?
                .ok_or(DomainError::CartNotActive)?;
            if let Some(existing) = tx.find_order_by_payment(&req.payment_intent_id)? {
                return Ok(Placement::Existing(existing));
            }
            current.mark_checked_out()?;
            if current.items != cart.items {
                return Err(DomainError::CartChanged { cart_id: cart.id });
            }

            let year = Utc::now().year();
            let sequence = tx.next_order_sequence(year)?;
            let mut order = Order::create(NewOrder {
                order_number: OrderNumber::new(year, sequence)?,
                customer_id: req.customer_id,
                shipping_address: req.shipping_address,
                billing_address: req.billing_address,
                payment,
                totals,
                currency: self.settings.currency.clone(),
                customer_notes,
            });

            let mut stock_events = Vec::with_capacity(cart.items.len());
            for (item, tax) in cart.items.iter().zip(line_taxes) {
                let (product, movement) = self.ledger.deduct(tx, item.product_id, item.quantity)?;
                order.add_item(item, tax)?;
                stock_events.push(StockChanged {
                    product_id: product.id,
                    shop_id: product.shop_id,
                    product_name: product.name.clone(),
                    sku: product.sku.clone(),
                    old_quantity: movement.old_quantity,
                    new_quantity: movement.new_quantity,
                    reason: StockChangeReason::OrderPlaced,
                    reference_id: order.id,
                    updated_at: Utc::now(),
                    is_low_stock: product.is_low_stock(),
                });
            }

            order.confirm_payment()?;
            tx.insert_order(&order)?;
            tx.save_cart(&current)?;
            Ok(Placement::Placed(order, stock_events))
        });

        let placement = match placed {
            Err(DomainError::DuplicatePayment(intent)) => {
                // Another cart won the race for this payment intent.
                let existing = self
                    .store
                    .transaction(|tx| tx.find_order_by_payment(&intent))?
                    .ok_or(DomainError::DuplicatePayment(intent))?;
                Placement::Existing(existing)
            }
            other => other?,
        };

        let (order, stock_events) = match placement {
            Placement::Existing(order) => return Ok(PlacedOrder::of(&order, true)),
            Placement::Placed(order, stock_events) => (order, stock_events),
        };

        log::info!(
            "Placed order {} ({}) for customer {}: {} line(s), total {} {}",
            order.order_number,
            order.id,
            order.customer_id,
            order.items.len(),
            order.totals.total,
            order.currency
        );

        for event in stock_events {
            self.publish(DomainEvent::StockChanged(event));
        }
        self.publish(DomainEvent::OrderPlaced(OrderPlaced::from_order(&order)));

        Ok(PlacedOrder::of(&order, false))
    }

    /// Asks the gateway about the intent and accepts it only when it
    /// succeeded for exactly `expected` in the shop's currency.
    fn confirmed_payment(
        &self,
        intent_id: &str,
        expected: &BigDecimal,
    ) -> Result<PaymentSnapshot, DomainError> {
        let status = self
            .gateway
            .payment_intent_status(intent_id)
            .map_err(|e| match e {
                e @ DomainError::PaymentNotConfirmed(_) => e,
                other => DomainError::PaymentFailed(other.to_string()),
            })?;
        if !status.is_succeeded {
            return Err(DomainError::PaymentNotConfirmed(
                status
                    .error_message
                    .unwrap_or_else(|| "payment has not succeeded".to_string()),
            ));
        }
        let currency = status.currency.to_uppercase();
        if currency != self.settings.currency.to_uppercase() || &status.amount != expected {
            return Err(DomainError::PaymentFailed(format!(
                "payment intent {} captured {} {} but the order total is {} {}",
                intent_id, status.amount, currency, expected, self.settings.currency
            )));
        }
        Ok(PaymentSnapshot {
            method: status.payment_method.unwrap_or_else(|| "card".to_string()),
            transaction_id: intent_id.to_string(),
            amount: status.amount,
            currency,
            status: "succeeded".to_string(),
            processed_at: Utc::now(),
            card_brand: status.card_brand,
            card_last4: status.card_last4,
            failure_message: None,
        })
    }

    fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.events.publish(&event) {
            log::warn!(
                "Dropping {} event for {} {}: {}",
                event.event_type(),
                event.aggregate_type(),
                event.aggregate_id(),
                e
            );
        }
    }
}
