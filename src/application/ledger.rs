use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::inventory::{Product, StockMovement};
use crate::domain::ports::{ProductScope, StoreTx};

/// Applies stock mutations through a [`StoreTx`], re-reading and retrying
/// when the compare-and-swap write loses to a concurrent writer.
#[derive(Debug, Clone, Copy)]
pub struct InventoryLedger {
    max_attempts: u32,
}

impl InventoryLedger {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Deducts `quantity` from the product. Insufficient stock is final;
    /// only stamp mismatches are retried.
    pub fn deduct(
        &self,
        tx: &mut dyn StoreTx,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(Product, StockMovement), DomainError> {
        self.mutate(tx, product_id, |p| {
            if !p.is_available() {
                return Err(DomainError::ProductNotAvailable {
                    product_id: p.id,
                    name: p.name.clone(),
                });
            }
            p.deduct_atomic(quantity)
        })
    }

    pub fn restore(
        &self,
        tx: &mut dyn StoreTx,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(Product, StockMovement), DomainError> {
        self.mutate(tx, product_id, |p| p.restore(quantity))
    }

    fn mutate<F>(
        &self,
        tx: &mut dyn StoreTx,
        product_id: Uuid,
        mut op: F,
    ) -> Result<(Product, StockMovement), DomainError>
    where
        F: FnMut(&mut Product) -> Result<StockMovement, DomainError>,
    {
        for attempt in 1..=self.max_attempts {
            let mut product = tx
                .find_product(ProductScope::Unscoped, product_id)?
                .ok_or(DomainError::NotFound("Product"))?;
            let expected = product.concurrency_stamp;
            let movement = op(&mut product)?;

            if tx.save_stock(&product, expected)? {
                return Ok((product, movement));
            }
            log::warn!(
                "Stock write conflict on product {} (attempt {}/{})",
                product_id,
                attempt,
                self.max_attempts
            );
        }
        Err(DomainError::ConcurrencyConflict { product_id })
    }
}
