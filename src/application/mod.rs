pub mod cart_service;
pub mod checkout_service;
pub mod ledger;
pub mod order_service;
