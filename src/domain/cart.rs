use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::errors::DomainError;
use super::inventory::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CartStatus {
    Active,
    CheckedOut,
    Abandoned,
}

impl CartStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartStatus::Active => "ACTIVE",
            CartStatus::CheckedOut => "CHECKED_OUT",
            CartStatus::Abandoned => "ABANDONED",
        }
    }
}

impl fmt::Display for CartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CartStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(CartStatus::Active),
            "CHECKED_OUT" => Ok(CartStatus::CheckedOut),
            "ABANDONED" => Ok(CartStatus::Abandoned),
            other => Err(DomainError::Internal(format!("unknown cart status '{}'", other))),
        }
    }
}

/// One line of a cart. Price, name, SKU and image are captured when the
/// line is added so the cart renders without another catalog lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub product_id: Uuid,
    pub shop_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub product_name: String,
    pub sku: String,
    pub image_url: Option<String>,
}

impl CartItem {
    pub fn from_product(product: &Product, quantity: i32) -> Self {
        Self {
            product_id: product.id,
            shop_id: product.shop_id,
            quantity,
            unit_price: product.price.clone(),
            product_name: product.name.clone(),
            sku: product.sku.clone(),
            image_url: product.image_url.clone(),
        }
    }

    pub fn line_total(&self) -> BigDecimal {
        &self.unit_price * BigDecimal::from(self.quantity)
    }

    fn matches(&self, shop_id: Uuid, product_id: Uuid) -> bool {
        self.shop_id == shop_id && self.product_id == product_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: CartStatus,
    pub items: Vec<CartItem>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single reason a cart line cannot be checked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartIssue {
    pub product_id: Uuid,
    pub shop_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartValidation {
    pub is_valid: bool,
    pub issues: Vec<CartIssue>,
}

impl Cart {
    pub fn new(customer_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            status: CartStatus::Active,
            items: Vec::new(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn subtotal(&self) -> BigDecimal {
        self.items
            .iter()
            .fold(BigDecimal::from(0), |acc, item| acc + item.line_total())
    }

    pub fn total_items(&self) -> i32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Adds a line, merging quantities when the (shop, product) pair is
    /// already in the cart. The stored price snapshot is refreshed.
    pub fn add_item(&mut self, item: CartItem) -> Result<(), DomainError> {
        self.ensure_active()?;
        ensure_positive(item.quantity)?;

        match self
            .items
            .iter_mut()
            .find(|i| i.matches(item.shop_id, item.product_id))
        {
            Some(existing) => {
                existing.quantity = existing.quantity.checked_add(item.quantity).ok_or_else(|| {
                    DomainError::InvalidInput("quantity out of range".to_string())
                })?;
                existing.unit_price = item.unit_price;
                existing.product_name = item.product_name;
                existing.sku = item.sku;
                existing.image_url = item.image_url;
            }
            None => self.items.push(item),
        }
        self.touch();
        Ok(())
    }

    /// Sets the quantity of an existing line; zero removes it.
    pub fn update_quantity(
        &mut self,
        shop_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        if quantity < 0 {
            return Err(DomainError::InvalidInput(format!(
                "quantity must not be negative, got {}",
                quantity
            )));
        }
        if quantity == 0 {
            return self.remove_item(shop_id, product_id);
        }
        let line = self
            .items
            .iter_mut()
            .find(|i| i.matches(shop_id, product_id))
            .ok_or(DomainError::NotFound("Cart item"))?;
        line.quantity = quantity;
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, shop_id: Uuid, product_id: Uuid) -> Result<(), DomainError> {
        self.ensure_active()?;
        let before = self.items.len();
        self.items.retain(|i| !i.matches(shop_id, product_id));
        if self.items.len() == before {
            return Err(DomainError::NotFound("Cart item"));
        }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), DomainError> {
        self.ensure_active()?;
        self.items.clear();
        self.touch();
        Ok(())
    }

    pub fn set_notes(&mut self, notes: Option<String>) -> Result<(), DomainError> {
        self.ensure_active()?;
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self.touch();
        Ok(())
    }

    pub fn mark_checked_out(&mut self) -> Result<(), DomainError> {
        self.ensure_active()?;
        self.status = CartStatus::CheckedOut;
        self.touch();
        Ok(())
    }

    pub fn abandon(&mut self) -> Result<(), DomainError> {
        self.ensure_active()?;
        self.status = CartStatus::Abandoned;
        self.touch();
        Ok(())
    }

    /// Checks every line against the current catalog and reports all
    /// problems at once. `lookup` returns `None` for products that no
    /// longer exist.
    pub fn validate_for_checkout<F>(&self, mut lookup: F) -> Result<CartValidation, DomainError>
    where
        F: FnMut(Uuid) -> Result<Option<Product>, DomainError>,
    {
        let mut issues = Vec::new();
        for item in &self.items {
            let issue = |message: String| CartIssue {
                product_id: item.product_id,
                shop_id: item.shop_id,
                message,
            };
            match lookup(item.product_id)? {
                None => issues.push(issue(format!(
                    "'{}' no longer exists",
                    item.product_name
                ))),
                Some(p) if !p.is_available() => {
                    issues.push(issue(format!("'{}' is not available", p.name)))
                }
                Some(p) if !p.has_stock_for(item.quantity) => issues.push(issue(format!(
                    "only {} of '{}' left, {} requested",
                    p.stock_quantity, p.name, item.quantity
                ))),
                Some(_) => {}
            }
        }
        Ok(CartValidation {
            is_valid: issues.is_empty(),
            issues,
        })
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if self.status != CartStatus::Active {
            return Err(DomainError::CartNotActive);
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn ensure_positive(quantity: i32) -> Result<(), DomainError> {
    if quantity < 1 {
        return Err(DomainError::InvalidInput(format!(
            "quantity must be at least 1, got {}",
            quantity
        )));
    }
    Ok(())
}
