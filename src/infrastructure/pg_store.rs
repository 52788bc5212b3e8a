use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::cart::{Cart, CartItem, CartStatus};
use crate::domain::errors::DomainError;
use crate::domain::inventory::Product;
use crate::domain::order::{Order, OrderItem, OrderTotals};
use crate::domain::ports::{OrderPage, ProductScope, Store, StoreTx};
use crate::schema::{cart_items, carts, order_items, order_number_counters, orders, products};

use super::models::{
    CartItemRow, CartRow, NewCartRow, NewOrderRow, OrderItemRow, OrderProgressChangeset,
    OrderRow, ProductRow,
};

// ── Error conversions (infrastructure concern only) ──────────────────────────

const PAYMENT_UNIQUE_CONSTRAINT: &str = "orders_payment_transaction_id_key";

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, DomainError> {
    serde_json::to_value(value).map_err(|e| DomainError::Internal(e.to_string()))
}

fn from_json<T: DeserializeOwned>(value: Value) -> Result<T, DomainError> {
    serde_json::from_value(value).map_err(|e| DomainError::Internal(e.to_string()))
}

// ── Row mapping ──────────────────────────────────────────────────────────────

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Product {
            id: r.id,
            shop_id: r.shop_id,
            name: r.name,
            sku: r.sku,
            image_url: r.image_url,
            price: r.price,
            stock_quantity: r.stock_quantity,
            low_stock_threshold: r.low_stock_threshold,
            is_active: r.is_active,
            is_published: r.is_published,
            concurrency_stamp: r.concurrency_stamp,
        }
    }
}

fn cart_from_rows(row: CartRow, items: Vec<CartItemRow>) -> Result<Cart, DomainError> {
    Ok(Cart {
        id: row.id,
        customer_id: row.customer_id,
        status: row.status.parse()?,
        items: items
            .into_iter()
            .map(|i| CartItem {
                product_id: i.product_id,
                shop_id: i.shop_id,
                quantity: i.quantity,
                unit_price: i.unit_price,
                product_name: i.product_name,
                sku: i.sku,
                image_url: i.image_url,
            })
            .collect(),
        notes: row.notes,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn order_from_rows(row: OrderRow, items: Vec<OrderItemRow>) -> Result<Order, DomainError> {
    Ok(Order {
        id: row.id,
        order_number: row.order_number.parse()?,
        customer_id: row.customer_id,
        status: row.status.parse()?,
        shipping_address: from_json(row.shipping_address)?,
        billing_address: row.billing_address.map(from_json).transpose()?,
        payment: from_json(row.payment)?,
        items: items
            .into_iter()
            .map(|i| OrderItem {
                id: i.id,
                product_id: i.product_id,
                shop_id: i.shop_id,
                product_name: i.product_name,
                sku: i.sku,
                image_url: i.image_url,
                quantity: i.quantity,
                unit_price: i.unit_price,
                tax_amount: i.tax_amount,
                line_total: i.line_total,
            })
            .collect(),
        totals: OrderTotals {
            subtotal: row.subtotal,
            tax: row.tax,
            shipping: row.shipping,
            discount: row.discount,
            total: row.total,
        },
        currency: row.currency,
        customer_notes: row.customer_notes,
        tracking_number: row.tracking_number,
        carrier: row.carrier,
        shipped_at: row.shipped_at,
        delivered_at: row.delivered_at,
        cancelled_at: row.cancelled_at,
        cancellation_reason: row.cancellation_reason,
        placed_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn position(index: usize) -> Result<i32, DomainError> {
    i32::try_from(index).map_err(|_| DomainError::Internal("too many lines".to_string()))
}

// ── Store ────────────────────────────────────────────────────────────────────

/// PostgreSQL-backed store. Each unit of work is one database transaction at
/// the default READ COMMITTED level; stock writes are guarded by the
/// product's concurrency stamp.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl Store for PgStore {
    fn transaction<T, F>(&self, work: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, DomainError>,
    {
        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;
        conn.transaction::<_, DomainError, _>(|conn| work(&mut PgTx { conn }))
    }
}

struct PgTx<'a> {
    conn: &'a mut PgConnection,
}

impl PgTx<'_> {
    fn load_cart(&mut self, row: Option<CartRow>) -> Result<Option<Cart>, DomainError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let items = cart_items::table
            .filter(cart_items::cart_id.eq(row.id))
            .order(cart_items::position.asc())
            .select(CartItemRow::as_select())
            .load(self.conn)?;
        cart_from_rows(row, items).map(Some)
    }

    fn load_order(&mut self, row: Option<OrderRow>) -> Result<Option<Order>, DomainError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let items = OrderItemRow::belonging_to(&row)
            .order(order_items::position.asc())
            .select(OrderItemRow::as_select())
            .load(self.conn)?;
        order_from_rows(row, items).map(Some)
    }

    fn write_cart_items(&mut self, cart: &Cart) -> Result<(), DomainError> {
        diesel::delete(cart_items::table.filter(cart_items::cart_id.eq(cart.id)))
            .execute(self.conn)?;
        let rows = cart
            .items
            .iter()
            .enumerate()
            .map(|(idx, i)| {
                Ok(CartItemRow {
                    id: Uuid::new_v4(),
                    cart_id: cart.id,
                    product_id: i.product_id,
                    shop_id: i.shop_id,
                    quantity: i.quantity,
                    unit_price: i.unit_price.clone(),
                    product_name: i.product_name.clone(),
                    sku: i.sku.clone(),
                    image_url: i.image_url.clone(),
                    position: position(idx)?,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;
        if !rows.is_empty() {
            diesel::insert_into(cart_items::table)
                .values(&rows)
                .execute(self.conn)?;
        }
        Ok(())
    }
}

impl StoreTx for PgTx<'_> {
    fn find_product(
        &mut self,
        scope: ProductScope,
        id: Uuid,
    ) -> Result<Option<Product>, DomainError> {
        let mut query = products::table
            .select(ProductRow::as_select())
            .filter(products::id.eq(id))
            .into_boxed();
        if let ProductScope::Shop(shop_id) = scope {
            query = query.filter(products::shop_id.eq(shop_id));
        }
        Ok(query.first(self.conn).optional()?.map(Product::from))
    }

    fn save_stock(&mut self, product: &Product, expected_stamp: Uuid) -> Result<bool, DomainError> {
        let updated = diesel::update(
            products::table
                .filter(products::id.eq(product.id))
                .filter(products::concurrency_stamp.eq(expected_stamp)),
        )
        .set((
            products::stock_quantity.eq(product.stock_quantity),
            products::concurrency_stamp.eq(product.concurrency_stamp),
            products::updated_at.eq(Utc::now()),
        ))
        .execute(self.conn)?;
        Ok(updated == 1)
    }

    fn find_active_cart(&mut self, customer_id: Uuid) -> Result<Option<Cart>, DomainError> {
        let row = carts::table
            .filter(carts::customer_id.eq(customer_id))
            .filter(carts::status.eq(CartStatus::Active.as_str()))
            .select(CartRow::as_select())
            .first(self.conn)
            .optional()?;
        self.load_cart(row)
    }

    fn find_cart(&mut self, id: Uuid) -> Result<Option<Cart>, DomainError> {
        // Row lock until commit: a second checkout of the same cart waits
        // here and then sees the committed status.
        let row = carts::table
            .find(id)
            .select(CartRow::as_select())
            .for_update()
            .get_result(self.conn)
            .optional()?;
        self.load_cart(row)
    }

    fn insert_cart(&mut self, cart: &Cart) -> Result<bool, DomainError> {
        // The partial unique index on active carts turns a concurrent
        // creation into a no-op instead of an aborted transaction.
        let inserted = diesel::insert_into(carts::table)
            .values(&NewCartRow {
                id: cart.id,
                customer_id: cart.customer_id,
                status: cart.status.as_str().to_string(),
                notes: cart.notes.clone(),
                created_at: cart.created_at,
                updated_at: cart.updated_at,
            })
            .on_conflict_do_nothing()
            .execute(self.conn)?;
        if inserted == 0 {
            return Ok(false);
        }
        self.write_cart_items(cart)?;
        Ok(true)
    }

    fn save_cart(&mut self, cart: &Cart) -> Result<(), DomainError> {
        let updated = diesel::update(carts::table.find(cart.id))
            .set((
                carts::status.eq(cart.status.as_str()),
                carts::notes.eq(cart.notes.clone()),
                carts::updated_at.eq(cart.updated_at),
            ))
            .execute(self.conn)?;
        if updated == 0 {
            return Err(DomainError::NotFound("Cart"));
        }
        self.write_cart_items(cart)
    }

    fn next_order_sequence(&mut self, year: i32) -> Result<i64, DomainError> {
        // Upsert holds the counter row lock until commit, so concurrent
        // placements in the same year queue here and never share a number.
        let value = diesel::insert_into(order_number_counters::table)
            .values((
                order_number_counters::year.eq(year),
                order_number_counters::last_value.eq(1_i64),
            ))
            .on_conflict(order_number_counters::year)
            .do_update()
            .set(order_number_counters::last_value.eq(order_number_counters::last_value + 1_i64))
            .returning(order_number_counters::last_value)
            .get_result::<i64>(self.conn)?;
        Ok(value)
    }

    fn insert_order(&mut self, order: &Order) -> Result<(), DomainError> {
        diesel::insert_into(orders::table)
            .values(&NewOrderRow {
                id: order.id,
                order_number: order.order_number.to_string(),
                customer_id: order.customer_id,
                status: order.status.as_str().to_string(),
                shipping_address: to_json(&order.shipping_address)?,
                billing_address: order.billing_address.as_ref().map(to_json).transpose()?,
                payment: to_json(&order.payment)?,
                payment_transaction_id: order.payment.transaction_id.clone(),
                subtotal: order.totals.subtotal.clone(),
                tax: order.totals.tax.clone(),
                shipping: order.totals.shipping.clone(),
                discount: order.totals.discount.clone(),
                total: order.totals.total.clone(),
                currency: order.currency.clone(),
                customer_notes: order.customer_notes.clone(),
                created_at: order.placed_at,
                updated_at: order.updated_at,
            })
            .execute(self.conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                    if info.constraint_name() == Some(PAYMENT_UNIQUE_CONSTRAINT) =>
                {
                    DomainError::DuplicatePayment(order.payment.transaction_id.clone())
                }
                other => other.into(),
            })?;

        let lines = order
            .items
            .iter()
            .enumerate()
            .map(|(idx, i)| {
                Ok(OrderItemRow {
                    id: i.id,
                    order_id: order.id,
                    product_id: i.product_id,
                    shop_id: i.shop_id,
                    product_name: i.product_name.clone(),
                    sku: i.sku.clone(),
                    image_url: i.image_url.clone(),
                    quantity: i.quantity,
                    unit_price: i.unit_price.clone(),
                    tax_amount: i.tax_amount.clone(),
                    line_total: i.line_total.clone(),
                    position: position(idx)?,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;
        diesel::insert_into(order_items::table)
            .values(&lines)
            .execute(self.conn)?;
        Ok(())
    }

    fn update_order(&mut self, order: &Order) -> Result<(), DomainError> {
        let updated = diesel::update(orders::table.find(order.id))
            .set(&OrderProgressChangeset {
                status: order.status.as_str().to_string(),
                payment: to_json(&order.payment)?,
                tracking_number: order.tracking_number.clone(),
                carrier: order.carrier.clone(),
                shipped_at: order.shipped_at,
                delivered_at: order.delivered_at,
                cancelled_at: order.cancelled_at,
                cancellation_reason: order.cancellation_reason.clone(),
                updated_at: order.updated_at,
            })
            .execute(self.conn)?;
        if updated == 0 {
            return Err(DomainError::NotFound("Order"));
        }
        Ok(())
    }

    fn find_order(&mut self, id: Uuid) -> Result<Option<Order>, DomainError> {
        let row = orders::table
            .find(id)
            .select(OrderRow::as_select())
            .first(self.conn)
            .optional()?;
        self.load_order(row)
    }

    fn find_order_by_payment(&mut self, transaction_id: &str) -> Result<Option<Order>, DomainError> {
        let row = orders::table
            .filter(orders::payment_transaction_id.eq(transaction_id))
            .select(OrderRow::as_select())
            .first(self.conn)
            .optional()?;
        self.load_order(row)
    }

    fn list_orders_for_customer(
        &mut self,
        customer_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<OrderPage, DomainError> {
        let offset = (page - 1) * limit;
        let total: i64 = orders::table
            .filter(orders::customer_id.eq(customer_id))
            .count()
            .get_result(self.conn)?;

        let rows = orders::table
            .filter(orders::customer_id.eq(customer_id))
            .select(OrderRow::as_select())
            .order(orders::created_at.desc())
            .limit(limit)
            .offset(offset)
            .load(self.conn)?;

        let items = OrderItemRow::belonging_to(&rows)
            .order(order_items::position.asc())
            .select(OrderItemRow::as_select())
            .load(self.conn)?
            .grouped_by(&rows);

        let orders = rows
            .into_iter()
            .zip(items)
            .map(|(row, items)| order_from_rows(row, items))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OrderPage {
            items: orders,
            total,
        })
    }
}
