//! Shopping cart lines and the merge rules applied when adding to them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::product::Product;

/// One product in a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

/// All cart lines belonging to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    user_id: UserId,
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            lines: Vec::new(),
        }
    }

    /// Rebuilds a cart from persisted lines. Lines of other users are ignored.
    pub fn from_lines(user_id: UserId, lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut lines: Vec<CartLine> = lines
            .into_iter()
            .filter(|line| line.user_id == user_id)
            .collect();
        lines.sort_by_key(|line| line.added_at);
        Self { user_id, lines }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Adds `requested` units of `product`, merging with an existing line.
    ///
    /// A non-positive request counts as one unit. The request itself must fit
    /// in stock; the merged quantity is clamped to `stock_available`.
    pub fn add(&mut self, product: &Product, requested: i64) -> Result<&CartLine, DomainError> {
        let requested = u32::try_from(requested.max(1)).unwrap_or(u32::MAX);
        let available = product.stock_available;

        if available < requested {
            return Err(DomainError::InsufficientStock {
                product_name: product.name.clone(),
                available,
                requested,
            });
        }

        let index = match self.position(product.id) {
            Some(index) => {
                let line = &mut self.lines[index];
                line.quantity = line.quantity.saturating_add(requested).min(available);
                index
            }
            None => {
                self.lines.push(CartLine {
                    user_id: self.user_id,
                    product_id: product.id,
                    quantity: requested,
                    added_at: Utc::now(),
                });
                self.lines.len() - 1
            }
        };

        Ok(&self.lines[index])
    }

    /// Sets the quantity of an existing line.
    ///
    /// Returns `None` when a non-positive quantity removed the line.
    pub fn update_quantity(
        &mut self,
        product: &Product,
        quantity: i64,
    ) -> Result<Option<&CartLine>, DomainError> {
        let index = self
            .position(product.id)
            .ok_or(DomainError::CartLineNotFound {
                product_id: product.id,
            })?;

        if quantity <= 0 {
            self.lines.remove(index);
            return Ok(None);
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if quantity > product.stock_available {
            return Err(DomainError::InsufficientStock {
                product_name: product.name.clone(),
                available: product.stock_available,
                requested: quantity,
            });
        }

        self.lines[index].quantity = quantity;
        Ok(Some(&self.lines[index]))
    }

    /// Drops the line for `product_id`. Returns whether a line was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Prices the cart against the current catalog.
    ///
    /// Lines whose product no longer exists are left out of the items and the
    /// total, but still count towards `item_count`.
    pub fn summarize(
        &self,
        products: &HashMap<ProductId, Product>,
    ) -> Result<CartSummary, DomainError> {
        let mut items = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let Some(product) = products.get(&line.product_id) else {
                continue;
            };
            items.push(CartItem {
                product_id: product.id,
                product_name: product.name.clone(),
                image_url: product.image_url.clone(),
                unit_price: product.price,
                quantity: line.quantity,
                stock_available: product.stock_available,
                subtotal: product
                    .price
                    .multiply(line.quantity)
                    .ok_or_else(DomainError::total_too_large)?,
            });
        }

        let total = Money::checked_sum(items.iter().map(|item| item.subtotal))
            .ok_or_else(DomainError::total_too_large)?;
        Ok(CartSummary {
            total,
            item_count: self.item_count(),
            items,
        })
    }

    fn position(&self, product_id: ProductId) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.product_id == product_id)
    }
}

/// A cart line joined with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub image_url: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub stock_available: u32,
    pub subtotal: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub items: Vec<CartItem>,
    pub total: Money,
    pub item_count: u32,
}
