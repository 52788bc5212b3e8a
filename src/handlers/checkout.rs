use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::AppState;
use crate::application::checkout_service::{PlaceOrderRequest, PlacedOrder};
use crate::domain::order::Address;
use crate::errors::AppError;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddressBody {
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2, e.g. "US"
    pub country_code: String,
    pub phone: Option<String>,
}

impl From<AddressBody> for Address {
    fn from(a: AddressBody) -> Self {
        Address {
            full_name: a.full_name,
            line1: a.line1,
            line2: a.line2,
            city: a.city,
            region: a.region,
            postal_code: a.postal_code,
            country_code: a.country_code,
            phone: a.phone,
        }
    }
}

impl From<Address> for AddressBody {
    fn from(a: Address) -> Self {
        AddressBody {
            full_name: a.full_name,
            line1: a.line1,
            line2: a.line2,
            city: a.city,
            region: a.region,
            postal_code: a.postal_code,
            country_code: a.country_code,
            phone: a.phone,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOrderBody {
    pub customer_id: Uuid,
    /// Identifier of a payment intent that has already succeeded at the gateway.
    pub payment_intent_id: String,
    pub shipping_address: AddressBody,
    pub billing_address: Option<AddressBody>,
    pub customer_notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlaceOrderResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub total: String,
    pub currency: String,
}

impl From<PlacedOrder> for PlaceOrderResponse {
    fn from(p: PlacedOrder) -> Self {
        Self {
            order_id: p.order_id,
            order_number: p.order_number.to_string(),
            total: p.total.to_string(),
            currency: p.currency,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlaceOrderFailure {
    /// One of EmptyCart, PaymentFailed, PaymentNotConfirmed, InsufficientStock,
    /// ProductNotAvailable, ConcurrencyConflict, InvalidAddress, Unknown.
    pub code: String,
    pub message: String,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /checkout
///
/// Turns the customer's active cart into a paid order. Submitting the same
/// payment intent again returns the order it already produced with 200.
#[utoipa::path(
    post,
    path = "/checkout",
    request_body = PlaceOrderBody,
    responses(
        (status = 201, description = "Order placed", body = PlaceOrderResponse),
        (status = 200, description = "Order already placed for this payment intent", body = PlaceOrderResponse),
        (status = 422, description = "Checkout rejected", body = PlaceOrderFailure),
        (status = 504, description = "Checkout did not finish in time"),
    ),
    tag = "checkout"
)]
pub async fn place_order(
    state: web::Data<AppState>,
    body: web::Json<PlaceOrderBody>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let request = PlaceOrderRequest {
        customer_id: body.customer_id,
        payment_intent_id: body.payment_intent_id,
        shipping_address: body.shipping_address.into(),
        billing_address: body.billing_address.map(Address::from),
        customer_notes: body.customer_notes,
    };

    let timeout = state.checkout_timeout;
    let work = web::block(move || state.checkout.place_order(request));
    let placed = tokio::time::timeout(timeout, work)
        .await
        .map_err(|_| AppError::Timeout)?
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let replayed = placed.replayed;
    let response = PlaceOrderResponse::from(placed);
    if replayed {
        Ok(HttpResponse::Ok().json(response))
    } else {
        Ok(HttpResponse::Created().json(response))
    }
}
