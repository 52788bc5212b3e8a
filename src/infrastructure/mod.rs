pub mod memory_store;
pub mod models;
pub mod outbox;
pub mod payment_gateway;
pub mod pg_store;
