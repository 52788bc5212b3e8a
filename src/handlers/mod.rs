use std::time::Duration;

use utoipa::OpenApi;

use crate::application::cart_service::CartService;
use crate::application::checkout_service::CheckoutService;
use crate::application::order_service::OrderService;
use crate::infrastructure::pg_store::PgStore;

pub mod carts;
pub mod checkout;
pub mod orders;

/// Services shared by every worker.
pub struct AppState {
    pub carts: CartService<PgStore>,
    pub checkout: CheckoutService<PgStore>,
    pub orders: OrderService<PgStore>,
    pub checkout_timeout: Duration,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        carts::get_cart,
        carts::add_item,
        carts::update_item,
        carts::remove_item,
        carts::clear_cart,
        carts::set_notes,
        carts::validate_cart,
        checkout::place_order,
        orders::get_order,
        orders::list_customer_orders,
        orders::start_processing,
        orders::ship_order,
        orders::deliver_order,
        orders::cancel_order,
        orders::refund_order,
    ),
    tags(
        (name = "carts", description = "Shopping carts"),
        (name = "checkout", description = "Order placement"),
        (name = "orders", description = "Placed orders and fulfilment"),
    )
)]
pub struct ApiDoc;
