use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::AppState;
use crate::domain::cart::{Cart, CartValidation};
use crate::domain::errors::DomainError;
use crate::errors::AppError;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    /// New quantity; 0 removes the line.
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CartNotesRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemResponse {
    pub product_id: Uuid,
    pub shop_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub image_url: Option<String>,
    pub quantity: i32,
    /// Decimal amounts are rendered as strings, e.g. "9.99"
    pub unit_price: String,
    pub line_total: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub notes: Option<String>,
    pub items: Vec<CartItemResponse>,
    pub subtotal: String,
    pub total_items: i32,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        let subtotal = cart.subtotal().to_string();
        let total_items = cart.total_items();
        Self {
            id: cart.id,
            customer_id: cart.customer_id,
            status: cart.status.to_string(),
            notes: cart.notes,
            items: cart
                .items
                .into_iter()
                .map(|i| CartItemResponse {
                    line_total: i.line_total().to_string(),
                    product_id: i.product_id,
                    shop_id: i.shop_id,
                    product_name: i.product_name,
                    sku: i.sku,
                    image_url: i.image_url,
                    quantity: i.quantity,
                    unit_price: i.unit_price.to_string(),
                })
                .collect(),
            subtotal,
            total_items,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartIssueResponse {
    pub product_id: Uuid,
    pub shop_id: Uuid,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartValidationResponse {
    pub is_valid: bool,
    pub issues: Vec<CartIssueResponse>,
}

impl From<CartValidation> for CartValidationResponse {
    fn from(v: CartValidation) -> Self {
        Self {
            is_valid: v.is_valid,
            issues: v
                .issues
                .into_iter()
                .map(|i| CartIssueResponse {
                    product_id: i.product_id,
                    shop_id: i.shop_id,
                    message: i.message,
                })
                .collect(),
        }
    }
}

async fn respond_with_cart<F>(state: web::Data<AppState>, op: F) -> Result<HttpResponse, AppError>
where
    F: FnOnce(&AppState) -> Result<Cart, DomainError> + Send + 'static,
{
    let cart = web::block(move || op(state.get_ref()))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(HttpResponse::Ok().json(CartResponse::from(cart)))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /customers/{customer_id}/cart
///
/// Returns the customer's active cart, creating an empty one on first access.
#[utoipa::path(
    get,
    path = "/customers/{customer_id}/cart",
    params(("customer_id" = Uuid, Path, description = "Customer UUID")),
    responses(
        (status = 200, description = "Active cart", body = CartResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "carts"
)]
pub async fn get_cart(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let customer_id = path.into_inner();
    respond_with_cart(state, move |s| s.carts.get_or_create(customer_id)).await
}

/// POST /customers/{customer_id}/cart/items
///
/// Adds a product, merging with an existing line for the same product.
#[utoipa::path(
    post,
    path = "/customers/{customer_id}/cart/items",
    params(("customer_id" = Uuid, Path, description = "Customer UUID")),
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 400, description = "Product unavailable or out of stock"),
        (status = 404, description = "Product not found"),
    ),
    tag = "carts"
)]
pub async fn add_item(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<AddCartItemRequest>,
) -> Result<HttpResponse, AppError> {
    let customer_id = path.into_inner();
    let body = body.into_inner();
    respond_with_cart(state, move |s| {
        s.carts.add_item(customer_id, body.product_id, body.quantity)
    })
    .await
}

/// PUT /customers/{customer_id}/cart/items/{shop_id}/{product_id}
#[utoipa::path(
    put,
    path = "/customers/{customer_id}/cart/items/{shop_id}/{product_id}",
    params(
        ("customer_id" = Uuid, Path, description = "Customer UUID"),
        ("shop_id" = Uuid, Path, description = "Shop UUID"),
        ("product_id" = Uuid, Path, description = "Product UUID"),
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 404, description = "Line not in cart"),
    ),
    tag = "carts"
)]
pub async fn update_item(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, Uuid, Uuid)>,
    body: web::Json<UpdateCartItemRequest>,
) -> Result<HttpResponse, AppError> {
    let (customer_id, shop_id, product_id) = path.into_inner();
    let quantity = body.into_inner().quantity;
    respond_with_cart(state, move |s| {
        s.carts
            .update_quantity(customer_id, shop_id, product_id, quantity)
    })
    .await
}

/// DELETE /customers/{customer_id}/cart/items/{shop_id}/{product_id}
#[utoipa::path(
    delete,
    path = "/customers/{customer_id}/cart/items/{shop_id}/{product_id}",
    params(
        ("customer_id" = Uuid, Path, description = "Customer UUID"),
        ("shop_id" = Uuid, Path, description = "Shop UUID"),
        ("product_id" = Uuid, Path, description = "Product UUID"),
    ),
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 404, description = "Line not in cart"),
    ),
    tag = "carts"
)]
pub async fn remove_item(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (customer_id, shop_id, product_id) = path.into_inner();
    respond_with_cart(state, move |s| {
        s.carts.remove_item(customer_id, shop_id, product_id)
    })
    .await
}

/// DELETE /customers/{customer_id}/cart
#[utoipa::path(
    delete,
    path = "/customers/{customer_id}/cart",
    params(("customer_id" = Uuid, Path, description = "Customer UUID")),
    responses((status = 200, description = "Emptied cart", body = CartResponse)),
    tag = "carts"
)]
pub async fn clear_cart(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let customer_id = path.into_inner();
    respond_with_cart(state, move |s| s.carts.clear(customer_id)).await
}

/// PUT /customers/{customer_id}/cart/notes
#[utoipa::path(
    put,
    path = "/customers/{customer_id}/cart/notes",
    params(("customer_id" = Uuid, Path, description = "Customer UUID")),
    request_body = CartNotesRequest,
    responses((status = 200, description = "Updated cart", body = CartResponse)),
    tag = "carts"
)]
pub async fn set_notes(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<CartNotesRequest>,
) -> Result<HttpResponse, AppError> {
    let customer_id = path.into_inner();
    let notes = body.into_inner().notes;
    respond_with_cart(state, move |s| s.carts.set_notes(customer_id, notes)).await
}

/// GET /customers/{customer_id}/cart/validation
///
/// Reports every line that would block checkout, not just the first.
#[utoipa::path(
    get,
    path = "/customers/{customer_id}/cart/validation",
    params(("customer_id" = Uuid, Path, description = "Customer UUID")),
    responses((status = 200, description = "Validation result", body = CartValidationResponse)),
    tag = "carts"
)]
pub async fn validate_cart(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let customer_id = path.into_inner();
    let result = web::block(move || state.carts.validate(customer_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(HttpResponse::Ok().json(CartValidationResponse::from(result)))
}
