use std::sync::Arc;

use checkout_service::application::cart_service::CartService;
use checkout_service::application::checkout_service::CheckoutService;
use checkout_service::application::ledger::InventoryLedger;
use checkout_service::application::order_service::OrderService;
use checkout_service::config::AppConfig;
use checkout_service::handlers::AppState;
use checkout_service::infrastructure::outbox::OutboxEventPublisher;
use checkout_service::infrastructure::payment_gateway::HttpPaymentGateway;
use checkout_service::infrastructure::pg_store::PgStore;
use checkout_service::{build_server, create_pool, run_migrations};
use dotenvy::dotenv;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;

    let pool = create_pool(&config.database_url).map_err(std::io::Error::other)?;
    run_migrations(&pool)?;

    let store = PgStore::new(pool.clone());
    let events = Arc::new(OutboxEventPublisher::new(pool));
    let gateway = Arc::new(HttpPaymentGateway::new(
        config.payment_gateway_url.clone(),
        config.payment_gateway_api_key.clone(),
        config.checkout_timeout,
    ));

    let state = AppState {
        carts: CartService::new(store.clone()),
        checkout: CheckoutService::new(
            store.clone(),
            gateway,
            events.clone(),
            config.checkout_settings(),
        ),
        orders: OrderService::new(
            store,
            events,
            InventoryLedger::new(config.stock_retry_attempts),
        ),
        checkout_timeout: config.checkout_timeout,
    };

    log::info!(
        "Starting server at http://{}:{} (currency {}, tax rate {})",
        config.host,
        config.port,
        config.currency,
        config.tax_rate
    );

    build_server(state, &config.host, config.port)?.await
}
