//! Catalog products and the stock they carry.

use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

const MAX_NAME_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 1000;
/// Highest accepted unit price, $1,000,000.00.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Price per unit.
    pub price: Money,
    /// Units that can still be sold.
    pub stock_available: u32,
    pub image_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Takes `quantity` units out of stock.
    ///
    /// Fails without touching the product when fewer units are available.
    pub fn withdraw(&mut self, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity: 0 });
        }
        if self.stock_available < quantity {
            return Err(DomainError::InsufficientStock {
                product_name: self.name.clone(),
                available: self.stock_available,
                requested: quantity,
            });
        }
        self.stock_available -= quantity;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Puts `quantity` units back into stock.
    pub fn restock(&mut self, quantity: u32) {
        self.stock_available = self.stock_available.saturating_add(quantity);
        self.updated_at = Utc::now();
    }

    /// Overwrites the stock level and returns the previous one.
    pub fn set_stock(&mut self, new_stock: u32) -> u32 {
        let previous = self.stock_available;
        self.stock_available = new_stock;
        self.updated_at = Utc::now();
        previous
    }
}

/// Editable product fields, as submitted by an administrator.
///
/// A missing `stock_available` means zero for a new product and "unchanged"
/// for an edit.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    #[serde(default)]
    pub stock_available: Option<u32>,
}

/// Stock level before and after an edit that changed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockEdit {
    pub previous: u32,
    pub new_stock: u32,
}

impl ProductDraft {
    pub fn validate(&self) -> Result<(), DomainError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("Product name is required"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::validation(format!(
                "Product name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(DomainError::validation(format!(
                "Description must be at most {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if self.price_cents <= 0 {
            return Err(DomainError::validation("Price must be greater than $0.00"));
        }
        if self.price_cents > MAX_PRICE_CENTS {
            return Err(DomainError::validation(format!(
                "Price must be at most {}",
                Money::from_cents(MAX_PRICE_CENTS)
            )));
        }
        Ok(())
    }

    /// Builds a new catalog product after validation.
    pub fn into_product(self) -> Result<Product, DomainError> {
        self.validate()?;
        Ok(Product {
            id: ProductId::new(),
            name: self.name.trim().to_string(),
            description: self.description,
            price: Money::from_cents(self.price_cents),
            stock_available: self.stock_available.unwrap_or(0),
            image_url: None,
            updated_at: Utc::now(),
        })
    }

    /// Copies the editable fields onto an existing product, keeping its image.
    ///
    /// Stock is only touched when the draft carries a level; the returned
    /// `StockEdit` is set when that level differs from the current one.
    pub fn apply_to(self, product: &mut Product) -> Result<Option<StockEdit>, DomainError> {
        self.validate()?;
        product.name = self.name.trim().to_string();
        product.description = self.description;
        product.price = Money::from_cents(self.price_cents);
        product.updated_at = Utc::now();

        let edit = match self.stock_available {
            Some(new_stock) if new_stock != product.stock_available => {
                let previous = product.set_stock(new_stock);
                Some(StockEdit {
                    previous,
                    new_stock,
                })
            }
            _ => None,
        };
        Ok(edit)
    }
}

/// Why a product's stock level changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "note", rename_all = "snake_case")]
pub enum StockReason {
    /// Units sold through checkout or an admin-placed order.
    Checkout,
    /// Units returned by a cancelled order.
    Cancellation,
    /// Manual correction with the operator's explanation.
    Adjustment(String),
}

impl StockReason {
    pub fn kind(&self) -> &'static str {
        match self {
            StockReason::Checkout => "checkout",
            StockReason::Cancellation => "cancellation",
            StockReason::Adjustment(_) => "adjustment",
        }
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            StockReason::Adjustment(note) => Some(note),
            _ => None,
        }
    }
}

/// One recorded change to a product's stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: ProductId,
    pub previous_stock: u32,
    pub new_stock: u32,
    pub reason: StockReason,
    pub updated_by: String,
    pub recorded_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn new(
        product_id: ProductId,
        previous_stock: u32,
        new_stock: u32,
        reason: StockReason,
        updated_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            previous_stock,
            new_stock,
            reason,
            updated_by: updated_by.into(),
            recorded_at: Utc::now(),
        }
    }

    /// Signed change in units (negative for sales).
    pub fn delta(&self) -> i64 {
        i64::from(self.new_stock) - i64::from(self.previous_stock)
    }
}
