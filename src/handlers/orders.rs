use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::checkout::AddressBody;
use super::AppState;
use crate::domain::errors::DomainError;
use crate::domain::order::Order;
use crate::errors::AppError;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub shop_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub quantity: i32,
    /// Decimal amounts are rendered as strings, e.g. "9.99"
    pub unit_price: String,
    pub tax_amount: String,
    pub line_total: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: String,
    pub shipping_address: AddressBody,
    pub billing_address: Option<AddressBody>,
    pub payment_method: String,
    pub payment_transaction_id: String,
    pub items: Vec<OrderItemResponse>,
    pub subtotal: String,
    pub tax: String,
    pub shipping: String,
    pub discount: String,
    pub total: String,
    pub currency: String,
    pub customer_notes: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub cancellation_reason: Option<String>,
    pub placed_at: String,
    pub updated_at: String,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            id: o.id,
            order_number: o.order_number.to_string(),
            customer_id: o.customer_id,
            status: o.status.to_string(),
            shipping_address: o.shipping_address.into(),
            billing_address: o.billing_address.map(AddressBody::from),
            payment_method: o.payment.method,
            payment_transaction_id: o.payment.transaction_id,
            items: o
                .items
                .into_iter()
                .map(|i| OrderItemResponse {
                    id: i.id,
                    product_id: i.product_id,
                    shop_id: i.shop_id,
                    product_name: i.product_name,
                    sku: i.sku,
                    quantity: i.quantity,
                    unit_price: i.unit_price.to_string(),
                    tax_amount: i.tax_amount.to_string(),
                    line_total: i.line_total.to_string(),
                })
                .collect(),
            subtotal: o.totals.subtotal.to_string(),
            tax: o.totals.tax.to_string(),
            shipping: o.totals.shipping.to_string(),
            discount: o.totals.discount.to_string(),
            total: o.totals.total.to_string(),
            currency: o.currency,
            customer_notes: o.customer_notes,
            tracking_number: o.tracking_number,
            carrier: o.carrier,
            cancellation_reason: o.cancellation_reason,
            placed_at: o.placed_at.to_rfc3339(),
            updated_at: o.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ShipOrderRequest {
    pub tracking_number: String,
    pub carrier: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: String,
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

async fn respond_with_order<F>(state: web::Data<AppState>, op: F) -> Result<HttpResponse, AppError>
where
    F: FnOnce(&AppState) -> Result<Order, DomainError> + Send + 'static,
{
    let order = web::block(move || op(state.get_ref()))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /orders/{id}
///
/// Returns the order together with its items.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let order = web::block(move || state.orders.get_order(order_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    match order {
        Some(order) => Ok(HttpResponse::Ok().json(OrderResponse::from(order))),
        None => Err(AppError::NotFound("Order")),
    }
}

/// GET /customers/{customer_id}/orders
///
/// Returns a page of the customer's orders, newest order number first.
/// Use `page` (1-based) and `limit` to control pagination.
#[utoipa::path(
    get,
    path = "/customers/{customer_id}/orders",
    params(
        ("customer_id" = Uuid, Path, description = "Customer UUID"),
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_customer_orders(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let customer_id = path.into_inner();
    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);

    let result = web::block(move || state.orders.list_orders(customer_id, page, limit))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: result.items.into_iter().map(OrderResponse::from).collect(),
        total: result.total,
        page,
        limit,
    }))
}

/// POST /orders/{id}/process
#[utoipa::path(
    post,
    path = "/orders/{id}/process",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order is being processed", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Transition not allowed from the current status"),
    ),
    tag = "orders"
)]
pub async fn start_processing(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    respond_with_order(state, move |s| s.orders.start_processing(order_id)).await
}

/// POST /orders/{id}/ship
#[utoipa::path(
    post,
    path = "/orders/{id}/ship",
    params(("id" = Uuid, Path, description = "Order UUID")),
    request_body = ShipOrderRequest,
    responses(
        (status = 200, description = "Order shipped", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Transition not allowed from the current status"),
    ),
    tag = "orders"
)]
pub async fn ship_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<ShipOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let body = body.into_inner();
    respond_with_order(state, move |s| {
        s.orders.ship(order_id, body.tracking_number, body.carrier)
    })
    .await
}

/// POST /orders/{id}/deliver
#[utoipa::path(
    post,
    path = "/orders/{id}/deliver",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order delivered", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Transition not allowed from the current status"),
    ),
    tag = "orders"
)]
pub async fn deliver_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    respond_with_order(state, move |s| s.orders.deliver(order_id)).await
}

/// POST /orders/{id}/cancel
///
/// Only orders that have not shipped can be cancelled. Reserved stock is
/// returned to the shops.
#[utoipa::path(
    post,
    path = "/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order UUID")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order can no longer be cancelled"),
    ),
    tag = "orders"
)]
pub async fn cancel_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<CancelOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let reason = body.into_inner().reason;
    respond_with_order(state, move |s| s.orders.cancel(order_id, reason)).await
}

/// POST /orders/{id}/refund
#[utoipa::path(
    post,
    path = "/orders/{id}/refund",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order refunded", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Transition not allowed from the current status"),
    ),
    tag = "orders"
)]
pub async fn refund_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    respond_with_order(state, move |s| s.orders.refund(order_id)).await
}
