use uuid::Uuid;

use crate::domain::cart::{Cart, CartItem, CartValidation};
use crate::domain::errors::DomainError;
use crate::domain::ports::{ProductScope, Store, StoreTx};

pub struct CartService<S> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the customer's active cart, creating an empty one on first use.
    pub fn get_or_create(&self, customer_id: Uuid) -> Result<Cart, DomainError> {
        self.store.transaction(|tx| active_cart(tx, customer_id))
    }

    pub fn add_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Cart, DomainError> {
        self.store.transaction(|tx| {
            let product = tx
                .find_product(ProductScope::Unscoped, product_id)?
                .ok_or(DomainError::NotFound("Product"))?;
            if !product.is_available() {
                return Err(DomainError::ProductNotAvailable {
                    product_id,
                    name: product.name,
                });
            }
            let mut cart = active_cart(tx, customer_id)?;
            let already = cart
                .items
                .iter()
                .find(|i| i.product_id == product_id && i.shop_id == product.shop_id)
                .map_or(0, |i| i.quantity);
            if !product.has_stock_for(already.saturating_add(quantity)) {
                return Err(DomainError::InsufficientStock {
                    product_id,
                    name: product.name,
                    available: product.stock_quantity,
                    requested: already.saturating_add(quantity),
                });
            }
            cart.add_item(CartItem::from_product(&product, quantity))?;
            tx.save_cart(&cart)?;
            Ok(cart)
        })
    }

    pub fn update_quantity(
        &self,
        customer_id: Uuid,
        shop_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Cart, DomainError> {
        self.modify(customer_id, |cart| {
            cart.update_quantity(shop_id, product_id, quantity)
        })
    }

    pub fn remove_item(
        &self,
        customer_id: Uuid,
        shop_id: Uuid,
        product_id: Uuid,
    ) -> Result<Cart, DomainError> {
        self.modify(customer_id, |cart| cart.remove_item(shop_id, product_id))
    }

    pub fn clear(&self, customer_id: Uuid) -> Result<Cart, DomainError> {
        self.modify(customer_id, Cart::clear)
    }

    pub fn set_notes(&self, customer_id: Uuid, notes: Option<String>) -> Result<Cart, DomainError> {
        self.modify(customer_id, |cart| cart.set_notes(notes))
    }

    /// Marks the active cart abandoned; the next access starts a fresh one.
    pub fn abandon(&self, customer_id: Uuid) -> Result<Cart, DomainError> {
        self.modify(customer_id, Cart::abandon)
    }

    pub fn validate(&self, customer_id: Uuid) -> Result<CartValidation, DomainError> {
        self.store.transaction(|tx| {
            let cart = active_cart(tx, customer_id)?;
            cart.validate_for_checkout(|id| tx.find_product(ProductScope::Unscoped, id))
        })
    }

    fn modify<F>(&self, customer_id: Uuid, change: F) -> Result<Cart, DomainError>
    where
        F: FnOnce(&mut Cart) -> Result<(), DomainError>,
    {
        self.store.transaction(|tx| {
            let mut cart = active_cart(tx, customer_id)?;
            change(&mut cart)?;
            tx.save_cart(&cart)?;
            Ok(cart)
        })
    }
}

fn active_cart(tx: &mut dyn StoreTx, customer_id: Uuid) -> Result<Cart, DomainError> {
    if let Some(cart) = tx.find_active_cart(customer_id)? {
        return Ok(cart);
    }
    let cart = Cart::new(customer_id);
    if tx.insert_cart(&cart)? {
        log::debug!("Created cart {} for customer {}", cart.id, customer_id);
        return Ok(cart);
    }
    // Lost the race to a concurrent request for the same customer.
    tx.find_active_cart(customer_id)?
        .ok_or_else(|| DomainError::Internal("active cart vanished during creation".to_string()))
}
