pub mod cart;
pub mod errors;
pub mod events;
pub mod inventory;
pub mod order;
pub mod ports;
pub mod pricing;
