pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use db::{create_pool, DbPool};
use handlers::{carts, checkout, orders, ApiDoc, AppState};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> std::io::Result<()> {
    let mut conn = pool.get().map_err(std::io::Error::other)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(())
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    state: AppState,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let state = web::Data::new(state);
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/customers/{customer_id}")
            .route("/cart", web::get().to(carts::get_cart))
            .route("/cart", web::delete().to(carts::clear_cart))
            .route("/cart/items", web::post().to(carts::add_item))
            .route(
                "/cart/items/{shop_id}/{product_id}",
                web::put().to(carts::update_item),
            )
            .route(
                "/cart/items/{shop_id}/{product_id}",
                web::delete().to(carts::remove_item),
            )
            .route("/cart/notes", web::put().to(carts::set_notes))
            .route("/cart/validation", web::get().to(carts::validate_cart))
            .route("/orders", web::get().to(orders::list_customer_orders)),
    )
    .route("/checkout", web::post().to(checkout::place_order))
    .service(
        web::scope("/orders/{id}")
            .route("", web::get().to(orders::get_order))
            .route("/process", web::post().to(orders::start_processing))
            .route("/ship", web::post().to(orders::ship_order))
            .route("/deliver", web::post().to(orders::deliver_order))
            .route("/cancel", web::post().to(orders::cancel_order))
            .route("/refund", web::post().to(orders::refund_order)),
    );
}
