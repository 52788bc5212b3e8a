//! Stock bookkeeping for a single product.
//!
//! Every successful mutation regenerates `concurrency_stamp`. The store
//! compares the stamp it handed out with the one currently persisted and
//! refuses the write when they differ, so two writers working from the same
//! read can never both succeed.

use bigdecimal::BigDecimal;
use uuid::Uuid;

use super::errors::DomainError;

/// Authoritative catalog record, reduced to what order placement needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub sku: String,
    pub image_url: Option<String>,
    pub price: BigDecimal,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
    pub is_active: bool,
    pub is_published: bool,
    pub concurrency_stamp: Uuid,
}

/// Before/after view of one stock mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockMovement {
    pub product_id: Uuid,
    pub old_quantity: i32,
    pub new_quantity: i32,
}

impl Product {
    /// Visible to shoppers and allowed to be sold.
    pub fn is_available(&self) -> bool {
        self.is_active && self.is_published
    }

    pub fn has_stock_for(&self, quantity: i32) -> bool {
        self.stock_quantity >= quantity
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity > 0 && self.stock_quantity <= self.low_stock_threshold
    }

    pub fn deduct_atomic(&mut self, quantity: i32) -> Result<StockMovement, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::InvalidInput(format!(
                "deduction quantity must be positive, got {}",
                quantity
            )));
        }
        if !self.has_stock_for(quantity) {
            return Err(DomainError::InsufficientStock {
                product_id: self.id,
                name: self.name.clone(),
                available: self.stock_quantity,
                requested: quantity,
            });
        }
        Ok(self.apply(self.stock_quantity - quantity))
    }

    pub fn restore(&mut self, quantity: i32) -> Result<StockMovement, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::InvalidInput(format!(
                "restore quantity must be positive, got {}",
                quantity
            )));
        }
        let new_quantity = self.stock_quantity.checked_add(quantity).ok_or_else(|| {
            DomainError::InvalidInput(format!("restoring {} overflows stock", quantity))
        })?;
        Ok(self.apply(new_quantity))
    }

    fn apply(&mut self, new_quantity: i32) -> StockMovement {
        let movement = StockMovement {
            product_id: self.id,
            old_quantity: self.stock_quantity,
            new_quantity,
        };
        self.stock_quantity = new_quantity;
        self.concurrency_stamp = Uuid::new_v4();
        movement
    }
}
