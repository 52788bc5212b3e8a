use thiserror::Error;
use uuid::Uuid;

use super::order::OrderStatus;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Cart is no longer active")]
    CartNotActive,
    #[error("Cart {cart_id} changed while checkout was in progress")]
    CartChanged { cart_id: Uuid },
    #[error("Payment gateway failure: {0}")]
    PaymentFailed(String),
    #[error("Payment not confirmed: {0}")]
    PaymentNotConfirmed(String),
    #[error("Payment {0} is already attached to an order")]
    DuplicatePayment(String),
    #[error("Product '{name}' ({product_id}) is not available")]
    ProductNotAvailable { product_id: Uuid, name: String },
    #[error("Insufficient stock for '{name}' ({product_id}): available {available}, requested {requested}")]
    InsufficientStock {
        product_id: Uuid,
        name: String,
        available: i32,
        requested: i32,
    },
    #[error("Concurrent update conflict on product {product_id}")]
    ConcurrencyConflict { product_id: Uuid },
    #[error("Invalid order status transition from {from} to {to}")]
    InvalidOrderStatusTransition { from: OrderStatus, to: OrderStatus },
    #[error("Order snapshot is frozen once payment is confirmed")]
    OrderFrozen,
    #[error("Internal error: {0}")]
    Internal(String),
}
