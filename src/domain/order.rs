use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cart::CartItem;
use super::errors::DomainError;

// ── Status machine ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    PaymentConfirmed,
    PaymentFailed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::PaymentConfirmed => "PAYMENT_CONFIRMED",
            OrderStatus::PaymentFailed => "PAYMENT_FAILED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }

    /// Cancellation stops at shipment; a shipped parcel goes through returns.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, PaymentConfirmed)
                | (Pending, PaymentFailed)
                | (PaymentConfirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (PaymentConfirmed, Cancelled)
                | (Processing, Cancelled)
                | (Cancelled, Refunded)
        )
    }

    /// Statuses in which the order's items are still held out of stock.
    pub fn holds_stock(self) -> bool {
        matches!(self, OrderStatus::PaymentConfirmed | OrderStatus::Processing)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "PENDING" => OrderStatus::Pending,
            "PAYMENT_CONFIRMED" => OrderStatus::PaymentConfirmed,
            "PAYMENT_FAILED" => OrderStatus::PaymentFailed,
            "PROCESSING" => OrderStatus::Processing,
            "SHIPPED" => OrderStatus::Shipped,
            "DELIVERED" => OrderStatus::Delivered,
            "CANCELLED" => OrderStatus::Cancelled,
            "REFUNDED" => OrderStatus::Refunded,
            other => {
                return Err(DomainError::Internal(format!(
                    "unknown order status '{}'",
                    other
                )))
            }
        })
    }
}

// ── Order number ─────────────────────────────────────────────────────────────

/// `ORD-<year>-<6-digit sequence>`, the sequence restarting every year.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderNumber {
    year: i32,
    sequence: i64,
}

impl OrderNumber {
    pub fn new(year: i32, sequence: i64) -> Result<Self, DomainError> {
        if !(1000..=9999).contains(&year) || !(1..=999_999).contains(&sequence) {
            return Err(DomainError::InvalidInput(format!(
                "order number out of range: year {} sequence {}",
                year, sequence
            )));
        }
        Ok(Self { year, sequence })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ORD-{:04}-{:06}", self.year, self.sequence)
    }
}

impl FromStr for OrderNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidInput(format!("malformed order number '{}'", s));
        let mut parts = s.splitn(3, '-');
        if parts.next() != Some("ORD") {
            return Err(invalid());
        }
        let year = parts.next().filter(|y| y.len() == 4).ok_or_else(invalid)?;
        let sequence = parts.next().filter(|q| q.len() == 6).ok_or_else(invalid)?;
        OrderNumber::new(
            year.parse().map_err(|_| invalid())?,
            sequence.parse().map_err(|_| invalid())?,
        )
    }
}

// ── Value objects ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country_code: String,
    pub phone: Option<String>,
}

impl Address {
    pub fn validate(&self) -> Result<(), DomainError> {
        let required = [
            ("full_name", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(DomainError::InvalidAddress(format!("{} is required", field)));
        }
        let cc = &self.country_code;
        if cc.len() != 2 || !cc.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::InvalidAddress(format!(
                "country_code must be a two-letter ISO code, got '{}'",
                cc
            )));
        }
        Ok(())
    }
}

/// Record of a confirmed gateway interaction. Replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    pub method: String,
    pub transaction_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub processed_at: DateTime<Utc>,
    pub card_brand: Option<String>,
    pub card_last4: Option<String>,
    pub failure_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: BigDecimal,
    pub tax: BigDecimal,
    pub shipping: BigDecimal,
    pub discount: BigDecimal,
    pub total: BigDecimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub shop_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub tax_amount: BigDecimal,
    pub line_total: BigDecimal,
}

// ── Aggregate ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_number: OrderNumber,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub payment: PaymentSnapshot,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub currency: String,
    pub customer_notes: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything fixed at creation time.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub customer_id: Uuid,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub payment: PaymentSnapshot,
    pub totals: OrderTotals,
    pub currency: String,
    pub customer_notes: Option<String>,
}

impl Order {
    pub fn create(new: NewOrder) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_number: new.order_number,
            customer_id: new.customer_id,
            status: OrderStatus::Pending,
            shipping_address: new.shipping_address,
            billing_address: new.billing_address,
            payment: new.payment,
            items: Vec::new(),
            totals: new.totals,
            currency: new.currency,
            customer_notes: new.customer_notes,
            tracking_number: None,
            carrier: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            placed_at: now,
            updated_at: now,
        }
    }

    /// Appends an immutable copy of a cart line. Only allowed before payment
    /// confirmation freezes the snapshot.
    pub fn add_item(&mut self, item: &CartItem, tax_amount: BigDecimal) -> Result<(), DomainError> {
        if self.status != OrderStatus::Pending {
            return Err(DomainError::OrderFrozen);
        }
        self.items.push(OrderItem {
            id: Uuid::new_v4(),
            product_id: item.product_id,
            shop_id: item.shop_id,
            product_name: item.product_name.clone(),
            sku: item.sku.clone(),
            image_url: item.image_url.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price.clone(),
            tax_amount,
            line_total: item.line_total(),
        });
        Ok(())
    }

    /// Distinct shops touched by this order, in first-seen order.
    pub fn shop_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::new();
        for item in &self.items {
            if !ids.contains(&item.shop_id) {
                ids.push(item.shop_id);
            }
        }
        ids
    }

    pub fn confirm_payment(&mut self) -> Result<(), DomainError> {
        self.transition(OrderStatus::PaymentConfirmed)
    }

    pub fn mark_payment_failed(&mut self, message: String) -> Result<(), DomainError> {
        self.transition(OrderStatus::PaymentFailed)?;
        self.payment = PaymentSnapshot {
            status: "failed".to_string(),
            failure_message: Some(message),
            processed_at: self.updated_at,
            ..self.payment.clone()
        };
        Ok(())
    }

    pub fn start_processing(&mut self) -> Result<(), DomainError> {
        self.transition(OrderStatus::Processing)
    }

    pub fn ship(&mut self, tracking_number: String, carrier: String) -> Result<(), DomainError> {
        self.transition(OrderStatus::Shipped)?;
        self.tracking_number = Some(tracking_number);
        self.carrier = Some(carrier);
        self.shipped_at = Some(self.updated_at);
        Ok(())
    }

    pub fn deliver(&mut self) -> Result<(), DomainError> {
        self.transition(OrderStatus::Delivered)?;
        self.delivered_at = Some(self.updated_at);
        Ok(())
    }

    /// Returns `true` when the caller must put the items back into stock.
    pub fn cancel(&mut self, reason: String) -> Result<bool, DomainError> {
        let restock = self.status.holds_stock();
        self.transition(OrderStatus::Cancelled)?;
        self.cancellation_reason = Some(reason);
        self.cancelled_at = Some(self.updated_at);
        Ok(restock)
    }

    pub fn refund(&mut self) -> Result<(), DomainError> {
        self.transition(OrderStatus::Refunded)
    }

    fn transition(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidOrderStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::inventory::tests::product;

    pub(crate) fn address() -> Address {
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

    pub(crate) fn order() -> Order {
        let zero = BigDecimal::from(0);
        Order::create(NewOrder {
            order_number: OrderNumber::new(2026, 1).expect("valid number"),
            customer_id: Uuid::new_v4(),
            shipping_address: address(),
            billing_address: None,
            payment: PaymentSnapshot {
                method: "card".to_string(),
                transaction_id: "pi_123".to_string(),
                amount: zero.clone(),
                currency: "USD".to_string(),
                status: "succeeded".to_string(),
                processed_at: Utc::now(),
                card_brand: Some("visa".to_string()),
                card_last4: Some("4242".to_string()),
                failure_message: None,
            },
            totals: OrderTotals {
                subtotal: zero.clone(),
                tax: zero.clone(),
                shipping: zero.clone(),
                discount: zero.clone(),
                total: zero,
            },
            currency: "USD".to_string(),
            customer_notes: None,
        })
    }

    #[test]
    fn order_number_formats_and_parses() {
        let n = OrderNumber::new(2026, 42).expect("valid number");
        assert_eq!(n.to_string(), "ORD-2026-000042");
        assert_eq!("ORD-2026-000042".parse::<OrderNumber>().expect("parse"), n);
        assert!("ORD-26-000042".parse::<OrderNumber>().is_err());
        assert!("INV-2026-000042".parse::<OrderNumber>().is_err());
        assert!(OrderNumber::new(2026, 1_000_000).is_err());
    }

    #[test]
    fn order_numbers_sort_by_year_then_sequence() {
        let a = OrderNumber::new(2025, 999).expect("valid");
        let b = OrderNumber::new(2026, 1).expect("valid");
        let c = OrderNumber::new(2026, 2).expect("valid");
        assert!(a < b && b < c);
    }

    #[test]
    fn address_requires_core_fields_and_iso_country() {
        assert!(address().validate().is_ok());

        let mut blank_city = address();
        blank_city.city = " ".to_string();
        assert!(matches!(blank_city.validate(), Err(DomainError::InvalidAddress(_))));

        let mut bad_country = address();
        bad_country.country_code = "gbr".to_string();
        assert!(matches!(bad_country.validate(), Err(DomainError::InvalidAddress(_))));
    }

    #[test]
    fn items_are_frozen_after_payment_confirmation() {
        let p = product(5);
        let line = CartItem::from_product(&p, 1);
        let mut o = order();

        o.add_item(&line, BigDecimal::from(0)).expect("add failed");
        o.confirm_payment().expect("confirm failed");

        assert_eq!(o.status, OrderStatus::PaymentConfirmed);
        assert!(matches!(
            o.add_item(&line, BigDecimal::from(0)),
            Err(DomainError::OrderFrozen)
        ));
        assert_eq!(o.items.len(), 1);
    }

    #[test]
    fn happy_path_lifecycle() {
        let mut o = order();
        o.confirm_payment().expect("confirm");
        o.start_processing().expect("process");
        o.ship("1Z999".to_string(), "UPS".to_string()).expect("ship");
        o.deliver().expect("deliver");

        assert_eq!(o.status, OrderStatus::Delivered);
        assert_eq!(o.tracking_number.as_deref(), Some("1Z999"));
        assert!(o.shipped_at.is_some());
        assert!(o.delivered_at.is_some());
    }

    #[test]
    fn cancel_reports_whether_stock_must_return() {
        let mut pending = order();
        assert!(!pending.cancel("changed mind".to_string()).expect("cancel"));

        let mut confirmed = order();
        confirmed.confirm_payment().expect("confirm");
        assert!(confirmed.cancel("changed mind".to_string()).expect("cancel"));
        assert_eq!(confirmed.cancellation_reason.as_deref(), Some("changed mind"));

        confirmed.refund().expect("refund");
        assert_eq!(confirmed.status, OrderStatus::Refunded);
    }

    #[test]
    fn shipped_orders_cannot_be_cancelled() {
        let mut o = order();
        o.confirm_payment().expect("confirm");
        o.start_processing().expect("process");
        o.ship("1Z999".to_string(), "UPS".to_string()).expect("ship");

        let err = o.cancel("too late".to_string()).expect_err("should reject");
        assert!(matches!(
            err,
            DomainError::InvalidOrderStatusTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Cancelled
            }
        ));
    }

    #[test]
    fn payment_failed_is_terminal_and_only_from_pending() {
        let mut o = order();
        o.mark_payment_failed("card declined".to_string()).expect("fail");
        assert_eq!(o.payment.failure_message.as_deref(), Some("card declined"));
        assert!(o.confirm_payment().is_err());
        assert!(o.cancel("x".to_string()).is_err());

        let mut confirmed = order();
        confirmed.confirm_payment().expect("confirm");
        assert!(confirmed.mark_payment_failed("late".to_string()).is_err());
    }

    #[test]
    fn status_round_trips_through_storage_text() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::PaymentConfirmed,
            OrderStatus::Refunded,
        ] {
            assert_eq!(s.as_str().parse::<OrderStatus>().expect("parse"), s);
        }
    }
}
